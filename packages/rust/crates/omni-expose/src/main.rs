//! omni-expose CLI: serve, list, tools, or run a function.
//!
//! Settings from `packages/conf/expose.yaml` plus the user override. Override
//! the config directory with `--conf <dir>`.
//!
//! Logging: set `RUST_LOG=omni_expose=debug` (or `info`, `warn`) to see logs on stderr.

mod cli;
mod functions;

use std::io::Write;
use std::path::Path;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use omni_expose::server::run_http;
use omni_expose::{
    CliAdapter, InterfaceTag, Registry, ToolAdapter, autodiscover, load_settings, project_root,
    set_config_home_override,
};

use crate::cli::{Cli, Command};

const DEFAULT_SOURCE_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/src");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Some(conf_dir) = cli.conf.clone() {
        set_config_home_override(conf_dir);
    }
    let settings = load_settings();

    // RUST_LOG overrides; serve logs at info, one-shot commands only warn.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if matches!(cli.command, Command::Serve { .. }) {
            "omni_expose=info"
        } else {
            "omni_expose=warn"
        })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let root = cli.root.clone().unwrap_or_else(|| {
        settings.discovery_root(&project_root(), Path::new(DEFAULT_SOURCE_ROOT))
    });
    let mut registry = Registry::new();
    let report = autodiscover(&root, &mut registry)?;
    tracing::info!(
        root = %root.display(),
        functions = ?report.registered,
        "functions discovered"
    );
    let registry = registry.into_shared();

    match cli.command {
        Command::Serve { bind, no_tools } => {
            let bind = bind.unwrap_or_else(|| settings.bind());
            let tool_path = if no_tools { None } else { settings.tool_path() };
            run_http(registry, &bind, tool_path.as_deref()).await
        }
        Command::List => {
            let mut out = std::io::stdout().lock();
            for entry in registry.entries() {
                let interfaces: Vec<&str> = entry.interfaces.iter().map(|t| t.as_str()).collect();
                let methods: Vec<&str> = if entry.exposes(InterfaceTag::Api) {
                    entry.methods.iter().map(|m| m.as_str()).collect()
                } else {
                    Vec::new()
                };
                writeln!(
                    out,
                    "{:<20} {:<16} {:<12} {}",
                    entry.name,
                    interfaces.join(","),
                    methods.join(","),
                    entry.description
                )?;
            }
            Ok(())
        }
        Command::Tools => {
            let descriptors = ToolAdapter::new(registry).descriptors();
            println!("{}", serde_json::to_string_pretty(&descriptors)?);
            Ok(())
        }
        Command::Call(args) => {
            let code = CliAdapter::new(registry).run(
                std::iter::once("omni-expose".to_string()).chain(args),
                &mut std::io::stdout().lock(),
                &mut std::io::stderr().lock(),
            );
            std::process::exit(code);
        }
    }
}
