use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{ContextError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Patient the workflow is currently documenting.  Needed by endpoints
    /// keyed on the patient (clinical flags, follow-up, summaries).
    /// Can be overridden with the `PHYSIO_PATIENT_ID` env var.
    #[serde(default)]
    pub patient_id: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub display: DisplayConfig,
}

// -- Server ------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the suggestion service (e.g. "http://127.0.0.1:5000").
    /// Can be overridden with the `PHYSIO_BASE_URL` env var.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Raw cookie string as the browser would hold it.  The CSRF token is
    /// read from its `csrf_token` entry.
    /// Can be overridden with the `PHYSIO_COOKIE` env var.
    #[serde(default)]
    pub cookie: String,

    /// Bare CSRF token.  Takes precedence over the cookie when non-empty.
    #[serde(default)]
    pub csrf_token: String,

    /// Request timeout in seconds (0 = no timeout).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            cookie: String::new(),
            csrf_token: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// -- Store -------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// Path of the SQLite file holding screen blobs.  Empty means
    /// `<data_dir>/context.db`.
    #[serde(default)]
    pub path: String,
}

// -- Display -----------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DisplayConfig {
    /// When true, a response is only rendered if no newer activation of the
    /// same target has been issued since.  Off by default: the last response
    /// to resolve wins.
    #[serde(default)]
    pub discard_superseded: bool,
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            patient_id: String::new(),
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

// -- Config impl ---------------------------------------------------------

impl Config {
    /// Load config from the given path, or the default XDG config location,
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path(),
        };

        let mut config = if config_path.exists() {
            info!("loading config from {}", config_path.display());
            let contents = std::fs::read_to_string(&config_path).map_err(ContextError::Io)?;
            toml::from_str(&contents)
                .map_err(|e| ContextError::Config(format!("parse error: {e}")))?
        } else {
            info!("no config file found, using defaults");
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overlay values from the environment.  `lookup` is `std::env::var` in
    /// production; tests pass a closure over a fixed map.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("PHYSIO_BASE_URL").filter(|v| !v.is_empty()) {
            self.server.base_url = v;
        }
        if let Some(v) = lookup("PHYSIO_COOKIE").filter(|v| !v.is_empty()) {
            self.server.cookie = v;
        }
        if let Some(v) = lookup("PHYSIO_PATIENT_ID").filter(|v| !v.is_empty()) {
            self.patient_id = v;
        }
    }

    /// Returns the default config file path: `$XDG_CONFIG_HOME/physio-context/config.toml`
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("physio-context")
            .join("config.toml")
    }

    /// Returns the data directory: `$XDG_DATA_HOME/physio-context/`
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join("physio-context")
    }

    /// Resolved location of the blob database.
    pub fn store_path(&self) -> PathBuf {
        if self.store.path.is_empty() {
            Self::data_dir().join("context.db")
        } else {
            PathBuf::from(&self.store.path)
        }
    }

    /// Patient id, if one is set.
    pub fn patient(&self) -> Option<&str> {
        if self.patient_id.is_empty() {
            None
        } else {
            Some(&self.patient_id)
        }
    }

    /// Generate the default config file contents.
    pub fn default_config_contents() -> &'static str {
        include_str!("../config.example.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_has_expected_values() {
        let c = Config::default();
        assert!(c.patient_id.is_empty());
        assert_eq!(c.server.base_url, "http://127.0.0.1:5000");
        assert_eq!(c.server.timeout_secs, 60);
        assert!(c.server.cookie.is_empty());
        assert!(c.server.csrf_token.is_empty());
        assert!(c.store.path.is_empty());
        assert!(!c.display.discard_superseded);
    }

    #[test]
    fn parse_minimal_toml() {
        let c: Config = toml::from_str(r#"patient_id = "PT-0042""#).unwrap();
        assert_eq!(c.patient_id, "PT-0042");
        assert_eq!(c.server.base_url, "http://127.0.0.1:5000");
    }

    #[test]
    fn parse_server_section() {
        let toml_str = r#"
        [server]
        base_url = "https://clinic.example.org"
        cookie = "session=abc; csrf_token=tok123"
        timeout_secs = 15

        [display]
        discard_superseded = true
        "#;
        let c: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(c.server.base_url, "https://clinic.example.org");
        assert_eq!(c.server.cookie, "session=abc; csrf_token=tok123");
        assert_eq!(c.server.timeout_secs, 15);
        assert!(c.display.discard_superseded);
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let env: HashMap<&str, &str> = [
            ("PHYSIO_BASE_URL", "http://10.0.0.5:8080"),
            ("PHYSIO_COOKIE", "csrf_token=fromenv"),
            ("PHYSIO_PATIENT_ID", "PT-7"),
        ]
        .into_iter()
        .collect();
        let mut c = Config::default();
        c.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(c.server.base_url, "http://10.0.0.5:8080");
        assert_eq!(c.server.cookie, "csrf_token=fromenv");
        assert_eq!(c.patient(), Some("PT-7"));
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut c = Config::default();
        c.apply_env(|_| Some(String::new()));
        assert_eq!(c.server.base_url, "http://127.0.0.1:5000");
        assert!(c.patient().is_none());
    }

    #[test]
    fn load_nonexistent_returns_defaults() {
        let c = Config::load(Some(Path::new("/tmp/nonexistent-physio-context-test.toml"))).unwrap();
        assert_eq!(c.server.timeout_secs, 60);
    }

    #[test]
    fn load_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid %%% toml").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn store_path_defaults_under_data_dir() {
        let c = Config::default();
        let path = c.store_path();
        assert!(path.to_string_lossy().contains("physio-context"));
        assert!(path.ends_with("context.db"));

        let mut c = Config::default();
        c.store.path = "/var/tmp/blobs.db".into();
        assert_eq!(c.store_path(), PathBuf::from("/var/tmp/blobs.db"));
    }

    #[test]
    fn default_config_contents_parses() {
        let c: Config = toml::from_str(Config::default_config_contents()).unwrap();
        assert_eq!(c.server.base_url, "http://127.0.0.1:5000");
    }
}
