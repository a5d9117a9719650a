use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::schema::ValetConfig;

/// Loads the Valet configuration from disk with env-var overrides.
pub struct ConfigLoader {
    config: Arc<RwLock<ValetConfig>>,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > VALET_CONFIG env > ~/.valet/valet.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("VALET_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".valet")
            .join("valet.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> valet_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            toml::from_str::<ValetConfig>(&raw).map_err(|e| {
                valet_core::ValetError::Config(format!(
                    "failed to parse {}: {}",
                    config_path.display(),
                    e
                ))
            })?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            ValetConfig::default()
        };

        let config = Self::apply_env_overrides(config);

        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => {
                return Err(valet_core::ValetError::Config(e));
            }
        }

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path,
        })
    }

    /// Get a read snapshot of the current config.
    pub fn get(&self) -> ValetConfig {
        self.config.read().clone()
    }

    /// Path the config was loaded from (or would have been).
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides (VALET_LINK_URL, VALET_LOG_LEVEL, ...).
    fn apply_env_overrides(mut config: ValetConfig) -> ValetConfig {
        if let Ok(v) = std::env::var("VALET_LINK_URL") {
            config.link.base_url = v;
        }
        if let Ok(v) = std::env::var("VALET_LOG_LEVEL") {
            config.logging.level = v;
        }
        // Join token: config file takes priority, env is the fallback.
        if config.blades.join_token.is_none() {
            if let Ok(v) = std::env::var("VALET_BLADE_TOKEN") {
                config.blades.join_token = Some(v);
            }
        }
        config
    }
}
