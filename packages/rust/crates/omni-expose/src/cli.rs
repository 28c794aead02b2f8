use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "omni-expose")]
#[command(about = "Serve #[expose] functions over HTTP and MCP tools, or run them from the command line.")]
#[command(after_help = "Any other subcommand runs the exposed function of that name, e.g. `omni-expose greet --name Ada`.")]
pub(crate) struct Cli {
    /// Override config directory (user settings live in <conf>/omni-expose/expose.yaml).
    #[arg(long, global = true)]
    pub(crate) conf: Option<PathBuf>,

    /// Source tree scanned for #[expose] functions (default: from settings).
    #[arg(long, global = true)]
    pub(crate) root: Option<PathBuf>,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the HTTP server (API routes plus the MCP tool endpoint).
    Serve {
        /// Listen address (default: from settings, else 127.0.0.1:8080)
        #[arg(long)]
        bind: Option<String>,

        /// Do not mount the MCP tool endpoint
        #[arg(long)]
        no_tools: bool,
    },
    /// List registered functions and their interfaces.
    List,
    /// Print tool descriptors as JSON.
    Tools,
    /// Run an exposed function.
    #[command(external_subcommand)]
    Call(Vec<String>),
}
