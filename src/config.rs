//! User settings from `~/.polyagent/settings.json`.
//!
//! The file is optional. Every field has a default, so a partial file only
//! overrides what it names:
//!
//! ```json
//! {
//!   "default_provider": "codex",
//!   "claude": { "model": "opus", "permission_mode": "acceptEdits" },
//!   "codex": { "sandbox": "workspace-write", "extra_args": ["--full-auto"] }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the settings file location.
pub const SETTINGS_ENV: &str = "POLYAGENT_SETTINGS";

const DEFAULT_DIVIDER_WIDTH: usize = 60;

/// Per-vendor overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VendorSettings {
    /// Path or name of the vendor CLI binary.
    pub cli_path: Option<String>,
    /// Model (or alias) used when none is given on the command line.
    pub model: Option<String>,
    /// Claude only: value for `--permission-mode`.
    pub permission_mode: Option<String>,
    /// Codex only: value for `--sandbox`.
    pub sandbox: Option<String>,
    /// Extra arguments appended to every vendor invocation.
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub default_provider: Option<String>,
    /// Width of the iteration divider in loop mode.
    pub divider_width: usize,
    pub claude: VendorSettings,
    pub codex: VendorSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_provider: None,
            divider_width: DEFAULT_DIVIDER_WIDTH,
            claude: VendorSettings::default(),
            codex: VendorSettings::default(),
        }
    }
}

/// Get the path to the settings file
pub fn settings_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(SETTINGS_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".polyagent").join("settings.json"))
}

/// Load settings from the default location, falling back to defaults.
pub fn load_settings() -> Settings {
    match settings_path() {
        Some(path) => load_settings_from(&path),
        None => {
            log::debug!("No home directory, using default settings");
            Settings::default()
        }
    }
}

/// Load settings from `path`. A missing or unparseable file yields defaults.
pub fn load_settings_from(path: &Path) -> Settings {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("No settings file at {}", path.display());
            return Settings::default();
        }
        Err(err) => {
            log::warn!("Could not read {}: {}", path.display(), err);
            return Settings::default();
        }
    };

    match serde_json::from_str(&content) {
        Ok(settings) => settings,
        Err(err) => {
            log::warn!("Ignoring invalid settings file {}: {}", path.display(), err);
            Settings::default()
        }
    }
}
