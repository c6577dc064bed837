//! Configuration types for the Aura client.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AuraError, Result};

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuraConfig {
    /// Backend HTTP settings.
    pub backend: BackendConfig,
    /// Remote-vs-local dispatch settings.
    pub connectivity: ConnectivityConfig,
    /// Local profile cache settings.
    pub storage: StorageConfig,
    /// Defaults applied to profiles created without the backend.
    pub profile_defaults: ProfileDefaults,
    /// Speech recognition/synthesis settings.
    pub speech: SpeechConfig,
}

/// Backend HTTP configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the travel-agent backend (no trailing path).
    pub base_url: String,
    /// Whole-request timeout in seconds. A timeout counts as the backend
    /// being unavailable and triggers the local fallback.
    pub request_timeout_secs: u64,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_owned(),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

/// How the dispatcher chooses between the backend and the local cache.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityMode {
    /// Try the backend once, fall back to the local path on failure.
    #[default]
    Auto,
    /// Forced offline: never contact the backend.
    LocalOnly,
    /// Never fall back; backend failures reach the caller.
    RemoteOnly,
}

impl ConnectivityMode {
    /// Parse a mode name as written in config or the environment.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "auto" => Some(Self::Auto),
            "local_only" | "local" | "offline" => Some(Self::LocalOnly),
            "remote_only" | "remote" => Some(Self::RemoteOnly),
            _ => None,
        }
    }
}

/// Connectivity configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// Dispatch mode.
    pub mode: ConnectivityMode,
}

/// Which local profile store to use.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-process map, discarded with the process.
    #[default]
    Memory,
    /// One JSON file per key under `root_dir`.
    Fs,
}

/// Local profile store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Store implementation.
    pub backend: StorageBackend,
    /// Root directory for the filesystem store.
    pub root_dir: PathBuf,
    /// Namespace prepended to every user id to form the record key.
    pub key_prefix: String,
    /// Key of the scalar record holding the active user's id.
    pub active_user_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            root_dir: default_storage_root_dir(),
            key_prefix: "db_user_".to_owned(),
            active_user_key: "inclusive_travel_user_id".to_owned(),
        }
    }
}

fn default_storage_root_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".aura")
        .join("profiles")
}

/// Preference defaults for profiles synthesized locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileDefaults {
    /// Default entry of `language_preferences`.
    pub language: String,
    /// Default `currency_preference`.
    pub currency: String,
    /// Default `timezone`.
    pub timezone: String,
}

impl Default for ProfileDefaults {
    fn default() -> Self {
        Self {
            language: "en-US".to_owned(),
            currency: "USD".to_owned(),
            timezone: std::env::var("TZ")
                .ok()
                .filter(|tz| !tz.trim().is_empty())
                .unwrap_or_else(|| "UTC".to_owned()),
        }
    }
}

/// Speech I/O configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// BCP 47 language tag for recognition and synthesis.
    pub language: String,
    /// Read agent replies aloud as they arrive.
    pub auto_speak_replies: bool,
    /// Synthesis rate multiplier (1.0 = platform default).
    pub rate: f32,
    /// Synthesis pitch multiplier (1.0 = platform default).
    pub pitch: f32,
    /// Platform voice name (None = platform default).
    pub voice: Option<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_owned(),
            auto_speak_replies: true,
            rate: 1.0,
            pitch: 1.0,
            voice: None,
        }
    }
}

impl AuraConfig {
    /// Resolve the effective configuration.
    ///
    /// Reads `path` (or [`default_config_path`](Self::default_config_path)
    /// when `None`) if it exists, otherwise starts from defaults, then
    /// applies `AURA_API_BASE_URL` and `AURA_CONNECTIVITY_MODE` from the
    /// environment on top.
    ///
    /// # Errors
    ///
    /// Returns [`AuraError::Config`] if an existing file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    fn load_with(path: Option<&Path>, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let path = path.map_or_else(Self::default_config_path, Path::to_path_buf);
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            Self::default()
        };
        config.apply_overrides(lookup);
        Ok(config)
    }

    /// Parse one TOML file. Missing sections and fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AuraError::Config`] naming the file on read or parse failure.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AuraError::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| AuraError::Config(format!("invalid {}: {e}", path.display())))
    }

    /// `<config dir>/aura/config.toml`, e.g. `~/.config/aura/config.toml` on Linux.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("aura")
            .join("config.toml")
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("AURA_API_BASE_URL").filter(|u| !u.trim().is_empty()) {
            self.backend.base_url = url.trim().to_owned();
        }
        if let Some(raw) = lookup("AURA_CONNECTIVITY_MODE") {
            match ConnectivityMode::parse(&raw) {
                Some(mode) => self.connectivity.mode = mode,
                None => tracing::warn!(value = raw.as_str(), "ignoring unknown connectivity mode"),
            }
        }
    }
}
