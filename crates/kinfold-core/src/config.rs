use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::Path;
use std::time::Duration;

/// Directory holding the store and project config, relative to the tree root.
pub const PROJECT_DIR: &str = ".kinfold";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub people: PeopleConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Defaults for `kf person list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeopleConfig {
    #[serde(default = "default_sort")]
    pub sort: String,
    #[serde(default = "default_true")]
    pub ascending: bool,
}

impl Default for PeopleConfig {
    fn default() -> Self {
        Self {
            sort: default_sort(),
            ascending: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

/// Load `.kinfold/config.toml` under `project_root`, or defaults when absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(PROJECT_DIR).join("config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load `<config_dir>/kinfold/config.toml`, or defaults when absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("kinfold/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Merge project config, user config, CLI flags and the `FORMAT` env var.
///
/// # Errors
///
/// Returns an error if either config file is unreadable or malformed.
pub fn resolve_config(
    project_root: &Path,
    cli_format: Option<&str>,
    cli_json: bool,
) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(
        cli_format,
        cli_json,
        user.output.as_deref(),
        env_format.as_deref(),
    );

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

/// Canonical output mode name for a user-supplied value.
#[must_use]
pub fn normalize_output_mode(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pretty" | "human" => Some("pretty"),
        "text" | "table" | "plain" => Some("text"),
        "json" => Some("json"),
        _ => None,
    }
}

/// Pick the output mode: `--format`, then `--json`, then `FORMAT`, then the
/// user config, then pretty on a TTY and text otherwise. Unknown values at any
/// level fall through to the next.
#[must_use]
pub fn resolve_output(
    cli_format: Option<&str>,
    cli_json: bool,
    user_output: Option<&str>,
    env_format: Option<&str>,
) -> String {
    if let Some(mode) = cli_format.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

const fn default_true() -> bool {
    true
}

fn default_sort() -> String {
    "first_name".to_string()
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}
