//! Configuration management for dwc-bridge.
//!
//! Configuration is loaded from multiple sources in priority order:
//! 1. Environment variables (DWC_BUILD_DIR, DWC_EXEC_MODE, DWC_SIMULATOR)
//! 2. Project-local config file (`./dwc-bridge.toml`)
//! 3. User config file (`~/.config/dwc-bridge/config.toml`)
//! 4. Built-in defaults
//!
//! # Config File Format
//!
//! ```toml
//! # dwc-bridge.toml
//!
//! # Root of generated IP; nodes without code_gen_dir_ipgen look here
//! build_dir = "/home/user/build/ipgen"
//!
//! # Mode used when a node does not name one ("functional" or "cosim")
//! exec_mode = "cosim"
//!
//! # External RTL simulator; the in-process model is used when unset
//! simulator = "/usr/local/bin/dwc-sim"
//! ```

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::exec::ExecMode;

/// Global cached configuration.
static CONFIG: OnceLock<Config> = OnceLock::new();

/// dwc-bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Root directory of generated IP.
    pub build_dir: Option<String>,

    /// Default execution mode tag.
    pub exec_mode: Option<String>,

    /// External simulator executable.
    pub simulator: Option<String>,

    /// Report stream widths padded to whole bytes.
    pub axi_stream_padding: Option<bool>,
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. Project-local `dwc-bridge.toml`
    /// 3. User config `~/.config/dwc-bridge/config.toml`
    /// 4. Defaults
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(user_config) = Self::load_user_config() {
            config.merge(user_config);
        }

        if let Some(local_config) = Self::load_local_config() {
            config.merge(local_config);
        }

        config.apply_env_overrides();

        config
    }

    /// Get the cached global configuration.
    ///
    /// Loads configuration on first call and caches it.
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(|| {
            let config = Self::load();
            log::debug!("Loaded configuration: {:?}", config);
            config
        })
    }

    /// Build directory, with fallback to `./build`.
    pub fn build_dir(&self) -> PathBuf {
        self.build_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("build"))
    }

    /// Default execution mode, functional when unset.
    ///
    /// An unrecognised tag is a validation error, same as on a node.
    pub fn exec_mode(&self) -> Result<ExecMode> {
        match self.exec_mode.as_deref() {
            Some(tag) => tag.parse(),
            None => Ok(ExecMode::Functional),
        }
    }

    /// External simulator, if one is configured.
    pub fn simulator(&self) -> Option<&Path> {
        self.simulator.as_deref().map(Path::new)
    }

    /// Whether reported widths are padded to bytes.
    pub fn axi_stream_padding(&self) -> bool {
        self.axi_stream_padding.unwrap_or(false)
    }

    /// Load user configuration from ~/.config/dwc-bridge/config.toml
    fn load_user_config() -> Option<Self> {
        let config_path = Self::user_config_path()?;
        Self::load_from_file(&config_path)
    }

    /// Load project-local configuration from ./dwc-bridge.toml
    fn load_local_config() -> Option<Self> {
        let local_path = Path::new("dwc-bridge.toml");
        if let Some(config) = Self::load_from_file(local_path) {
            return Some(config);
        }

        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            let project_path = Path::new(&manifest_dir).join("dwc-bridge.toml");
            if let Some(config) = Self::load_from_file(&project_path) {
                return Some(config);
            }
        }

        None
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    Some(config)
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Merge another config into this one.
    /// Only overrides fields that are Some in the other config.
    fn merge(&mut self, other: Self) {
        if other.build_dir.is_some() {
            self.build_dir = other.build_dir;
        }
        if other.exec_mode.is_some() {
            self.exec_mode = other.exec_mode;
        }
        if other.simulator.is_some() {
            self.simulator = other.simulator;
        }
        if other.axi_stream_padding.is_some() {
            self.axi_stream_padding = other.axi_stream_padding;
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("DWC_BUILD_DIR") {
            log::info!("Using DWC_BUILD_DIR from environment: {}", dir);
            self.build_dir = Some(dir);
        }
        if let Some(mode) = lookup("DWC_EXEC_MODE") {
            log::info!("Using DWC_EXEC_MODE from environment: {}", mode);
            self.exec_mode = Some(mode);
        }
        if let Some(sim) = lookup("DWC_SIMULATOR") {
            log::info!("Using DWC_SIMULATOR from environment: {}", sim);
            self.simulator = Some(sim);
        }
    }

    /// Get the path to the user config file (for display/creation).
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("dwc-bridge").join("config.toml"))
    }

    /// Generate a sample config file content.
    pub fn sample_config() -> String {
        r#"# dwc-bridge configuration
# Place this file at ~/.config/dwc-bridge/config.toml or ./dwc-bridge.toml

# Root of generated IP (used when a node has no code_gen_dir_ipgen)
build_dir = "/home/user/build/ipgen"

# Execution mode when a node does not set exec_mode: "functional" or "cosim"
# exec_mode = "functional"

# External RTL simulator (optional, the in-process model is used otherwise)
# simulator = "/usr/local/bin/dwc-sim"

# Report stream widths padded to whole bytes
# axi_stream_padding = true
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.build_dir(), PathBuf::from("build"));
        assert_eq!(config.exec_mode().unwrap(), ExecMode::Functional);
        assert!(config.simulator().is_none());
        assert!(!config.axi_stream_padding());
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config {
            build_dir: Some("/base/build".to_string()),
            exec_mode: None,
            simulator: Some("/base/sim".to_string()),
            axi_stream_padding: Some(true),
        };

        let overlay = Config {
            build_dir: None,
            exec_mode: Some("rtlsim".to_string()),
            simulator: Some("/overlay/sim".to_string()),
            axi_stream_padding: None,
        };

        base.merge(overlay);

        // build_dir unchanged (overlay was None)
        assert_eq!(base.build_dir, Some("/base/build".to_string()));
        assert_eq!(base.exec_mode().unwrap(), ExecMode::Cosim);
        assert_eq!(base.simulator(), Some(Path::new("/overlay/sim")));
        assert!(base.axi_stream_padding());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [("DWC_EXEC_MODE", "cosim"), ("DWC_BUILD_DIR", "/env/build")]
            .into_iter()
            .collect();
        let mut config = Config::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.build_dir(), PathBuf::from("/env/build"));
        assert_eq!(config.exec_mode().unwrap(), ExecMode::Cosim);
        assert!(config.simulator.is_none());
    }

    #[test]
    fn test_bad_exec_mode() {
        let config = Config {
            exec_mode: Some("emulate".to_string()),
            ..Default::default()
        };
        assert!(config.exec_mode().unwrap_err().is_validation());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dwc-bridge.toml");
        std::fs::write(&path, "build_dir = \"/x\"\naxi_stream_padding = true\n").unwrap();
        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.build_dir.as_deref(), Some("/x"));
        assert!(config.axi_stream_padding());

        std::fs::write(&path, "build_dir = [").unwrap();
        assert!(Config::load_from_file(&path).is_none());
        assert!(Config::load_from_file(&dir.path().join("absent.toml")).is_none());
    }

    #[test]
    fn test_sample_config_parses() {
        let sample = Config::sample_config();
        let config: Config = toml::from_str(&sample).expect("Sample config should parse");
        assert_eq!(config.build_dir.as_deref(), Some("/home/user/build/ipgen"));
    }
}
