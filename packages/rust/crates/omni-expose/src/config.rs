//! Settings loader for omni-expose.
//!
//! Loads and merges:
//! - System defaults: `<PRJ_ROOT>/packages/conf/expose.yaml`
//! - User overrides:  `<PRJ_CONFIG_HOME>/omni-expose/expose.yaml`
//!
//! Merge precedence is user over system. Missing files are skipped;
//! unreadable or malformed files are logged and ignored.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::Deserialize;

const DEFAULT_SYSTEM_SETTINGS_RELATIVE_PATH: &str = "packages/conf/expose.yaml";
const DEFAULT_USER_SETTINGS_RELATIVE_PATH: &str = "omni-expose/expose.yaml";
const DEFAULT_CONFIG_HOME_RELATIVE_PATH: &str = ".config";
static CONFIG_HOME_OVERRIDE: OnceLock<PathBuf> = OnceLock::new();

/// Listen address when nothing is configured.
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
/// Tool endpoint path when nothing is configured.
pub const DEFAULT_TOOL_PATH: &str = "/mcp";

/// All settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExposeSettings {
    /// HTTP server.
    #[serde(default)]
    pub http: HttpSettings,
    /// Autodiscovery.
    #[serde(default)]
    pub discovery: DiscoverySettings,
    /// Tool-protocol endpoint.
    #[serde(default)]
    pub tool: ToolSettings,
}

/// `http:` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpSettings {
    /// Listen address, e.g. `127.0.0.1:8080`.
    pub bind: Option<String>,
}

/// `discovery:` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscoverySettings {
    /// Source tree to scan; relative paths resolve against the project root.
    pub root: Option<String>,
}

/// `tool:` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolSettings {
    /// Serve the tool endpoint.
    pub enabled: Option<bool>,
    /// Path the endpoint is nested at.
    pub path: Option<String>,
}

impl ExposeSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            http: HttpSettings {
                bind: overlay.http.bind.or(self.http.bind),
            },
            discovery: DiscoverySettings {
                root: overlay.discovery.root.or(self.discovery.root),
            },
            tool: ToolSettings {
                enabled: overlay.tool.enabled.or(self.tool.enabled),
                path: overlay.tool.path.or(self.tool.path),
            },
        }
    }

    /// Listen address.
    #[must_use]
    pub fn bind(&self) -> String {
        non_empty(self.http.bind.as_deref()).unwrap_or(DEFAULT_BIND).to_string()
    }

    /// Tool endpoint path, `None` when disabled.
    #[must_use]
    pub fn tool_path(&self) -> Option<String> {
        if self.tool.enabled == Some(false) {
            return None;
        }
        let path = non_empty(self.tool.path.as_deref()).unwrap_or(DEFAULT_TOOL_PATH);
        Some(if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        })
    }

    /// Discovery root, or `fallback` when unset.
    #[must_use]
    pub fn discovery_root(&self, project_root: &Path, fallback: &Path) -> PathBuf {
        non_empty(self.discovery.root.as_deref()).map_or_else(
            || fallback.to_path_buf(),
            |root| absolutize(project_root, PathBuf::from(root)),
        )
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Load merged settings from the default locations.
#[must_use]
pub fn load_settings() -> ExposeSettings {
    let (system_path, user_path) = settings_paths();
    load_settings_from_paths(&system_path, &user_path)
}

#[doc(hidden)]
#[must_use]
pub fn settings_paths() -> (PathBuf, PathBuf) {
    let root = project_root();
    let system_path = root.join(DEFAULT_SYSTEM_SETTINGS_RELATIVE_PATH);
    let user_path = resolve_config_home(&root).join(DEFAULT_USER_SETTINGS_RELATIVE_PATH);
    (system_path, user_path)
}

#[doc(hidden)]
#[must_use]
pub fn load_settings_from_paths(system: &Path, user: &Path) -> ExposeSettings {
    load_one(system).merge(load_one(user))
}

fn load_one(path: &Path) -> ExposeSettings {
    if !path.exists() {
        return ExposeSettings::default();
    }
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "failed to read settings file; ignoring"
            );
            return ExposeSettings::default();
        }
    };
    match serde_yaml::from_str::<ExposeSettings>(&raw) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "failed to parse settings yaml; ignoring file"
            );
            ExposeSettings::default()
        }
    }
}

/// `PRJ_ROOT`, or the current directory.
#[must_use]
pub fn project_root() -> PathBuf {
    std::env::var("PRJ_ROOT")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map_or_else(
            || std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            PathBuf::from,
        )
}

/// Set config-home override (used by CLI `--conf`).
///
/// The path can be absolute, or relative to `PRJ_ROOT`/cwd.
pub fn set_config_home_override(path: impl Into<PathBuf>) {
    let path = path.into();
    if path.as_os_str().is_empty() {
        return;
    }
    if CONFIG_HOME_OVERRIDE.set(path.clone()).is_err()
        && let Some(current) = CONFIG_HOME_OVERRIDE.get()
        && current != &path
    {
        tracing::warn!(
            current = %current.display(),
            ignored = %path.display(),
            "config home override already set; ignoring subsequent value"
        );
    }
}

fn resolve_config_home(project_root: &Path) -> PathBuf {
    if let Some(path) = CONFIG_HOME_OVERRIDE.get() {
        return absolutize(project_root, path.clone());
    }

    let configured = std::env::var("PRJ_CONFIG_HOME")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_HOME_RELATIVE_PATH.to_string());
    absolutize(project_root, PathBuf::from(configured))
}

fn absolutize(project_root: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        project_root.join(path)
    }
}
