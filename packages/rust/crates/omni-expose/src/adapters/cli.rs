//! Command-line adapter: one subcommand per cli-tagged function.
//!
//! Each parameter becomes `--<param-name>`. Parsed values go through the
//! same query-shaped validation as `GET` requests, then the shared pipeline.
//!
//! Exit codes: 0 for success and for `--help`/`--version`; 1 for usage
//! errors, rejected input, and `success: false` envelopes.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::Write;
use std::sync::Arc;

use clap::builder::PossibleValuesParser;
use clap::{Arg, ArgMatches, Command};
use serde_json::Value;

use crate::contract::OutputEnvelope;
use crate::introspect::{ParamKind, ParameterSpec};
use crate::invoke::invoke;
use crate::registry::{FunctionEntry, InterfaceTag, Registry};
use crate::schema::{RawInput, choice_text};

/// Builds and runs the command tree for cli-tagged entries.
#[derive(Debug, Clone)]
pub struct CliAdapter {
    registry: Arc<Registry>,
    bin_name: String,
}

/// Subcommand name for a function: lower-case, non-alphanumerics as `-`.
#[must_use]
pub fn command_name(function: &str) -> String {
    function
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

/// Flag for a parameter, without the leading `--`. Leading and trailing
/// separators are dropped, so `_limit` becomes `limit`.
#[must_use]
pub fn flag_name(param: &str) -> String {
    command_name(param).trim_matches('-').to_string()
}

impl CliAdapter {
    /// Adapter over a frozen registry.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            bin_name: "omni-expose".to_string(),
        }
    }

    /// Program name shown in usage text.
    #[must_use]
    pub fn with_bin_name(mut self, name: impl Into<String>) -> Self {
        self.bin_name = name.into();
        self
    }

    /// Subcommand name to function name. When two names normalise to the
    /// same subcommand, the later one in name order wins.
    #[must_use]
    pub fn commands(&self) -> BTreeMap<String, String> {
        let mut commands = BTreeMap::new();
        for entry in self.registry.for_interface(InterfaceTag::Cli) {
            if let Some(shadowed) = commands.insert(command_name(&entry.name), entry.name.clone()) {
                tracing::warn!(
                    function = %entry.name,
                    shadowed = %shadowed,
                    "functions share a subcommand name; keeping the later one"
                );
            }
        }
        commands
    }

    /// Full command tree.
    #[must_use]
    pub fn command(&self) -> Command {
        self.commands()
            .values()
            .filter_map(|function| self.registry.get(function))
            .fold(
                Command::new(self.bin_name.clone())
                    .about("Run an exposed function")
                    .subcommand_required(true)
                    .arg_required_else_help(true),
                |root, entry| root.subcommand(subcommand(entry)),
            )
    }

    /// Parse `args` (program name first), run the selected function, and
    /// write its rendering. Returns the process exit code.
    pub fn run<I, T>(&self, args: I, out: &mut dyn Write, err: &mut dyn Write) -> i32
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = match self.command().try_get_matches_from(args) {
            Ok(matches) => matches,
            Err(error) => {
                let rendered = error.render();
                if error.use_stderr() {
                    let _ = write!(err, "{rendered}");
                    return 1;
                }
                let _ = write!(out, "{rendered}");
                return 0;
            }
        };
        let Some((command, sub_matches)) = matches.subcommand() else {
            let _ = writeln!(err, "error: no function given");
            return 1;
        };
        let commands = self.commands();
        let Some(entry) = commands
            .get(command)
            .and_then(|function| self.registry.get(function))
        else {
            let _ = writeln!(err, "error: unknown function `{command}`");
            return 1;
        };

        let input = RawInput::Query(collect_flags(entry, sub_matches));
        match invoke(entry, &input) {
            Ok(envelope) => render(&envelope, out, err),
            Err(validation) => {
                let _ = writeln!(err, "error: {validation}");
                let _ = writeln!(
                    err,
                    "\nFor more information, try '{} {command} --help'.",
                    self.bin_name
                );
                1
            }
        }
    }
}

fn subcommand(entry: &FunctionEntry) -> Command {
    let about = if entry.description.is_empty() {
        format!("Run `{}`", entry.name)
    } else {
        entry.description.clone()
    };
    entry
        .params
        .iter()
        .fold(Command::new(command_name(&entry.name)).about(about), |cmd, param| {
            cmd.arg(flag(param))
        })
}

fn flag(param: &ParameterSpec) -> Arg {
    let mut help = param.description.clone();
    if let Some(default) = param.default.as_ref().filter(|d| !d.is_null()) {
        help.push_str(&format!(" [default: {}]", choice_text(default)));
    }
    let arg = Arg::new(param.name.clone())
        .long(flag_name(&param.name))
        .help(help)
        .required(param.required);
    match &param.kind {
        ParamKind::Bool => arg
            .value_name("BOOL")
            .num_args(0..=1)
            .default_missing_value("true"),
        ParamKind::Choice(values) => arg.value_parser(PossibleValuesParser::new(
            values.iter().map(choice_text).collect::<Vec<_>>(),
        )),
        ParamKind::Complex(_) => arg.value_name("JSON"),
        other => arg.value_name(other.label().to_ascii_uppercase()),
    }
}

fn collect_flags(entry: &FunctionEntry, matches: &ArgMatches) -> Vec<(String, String)> {
    entry
        .params
        .iter()
        .filter_map(|param| {
            matches
                .get_one::<String>(&param.name)
                .map(|value| (param.name.clone(), value.clone()))
        })
        .collect()
}

fn render(envelope: &OutputEnvelope, out: &mut dyn Write, err: &mut dyn Write) -> i32 {
    if !envelope.success {
        let message = envelope
            .message
            .as_deref()
            .unwrap_or("function reported failure");
        let _ = writeln!(err, "error: {message}");
        return 1;
    }
    match &envelope.result {
        Value::Null => {}
        Value::String(text) => {
            let _ = writeln!(out, "{text}");
        }
        other => {
            let text = serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string());
            let _ = writeln!(out, "{text}");
        }
    }
    if let Some(message) = &envelope.message {
        let _ = writeln!(out, "{message}");
    }
    if !envelope.extra.is_empty() {
        let extra = Value::Object(envelope.extra.clone());
        let text = serde_json::to_string_pretty(&extra).unwrap_or_else(|_| extra.to_string());
        let _ = writeln!(out, "{text}");
    }
    0
}
