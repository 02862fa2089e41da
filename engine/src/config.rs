//! Configuration types for the script runtime

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default property key holding an entity's script reference list
pub const DEFAULT_REFERENCE_KEY: &str = "scripts";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid asset name: {0}")]
    InvalidName(String),

    #[error("{kind} directory not found: {path:?}")]
    MissingDirectory { kind: &'static str, path: PathBuf },
}

/// Configuration for asset paths
#[derive(Debug, Clone)]
pub struct AssetConfig {
    /// Root directory for all assets
    pub asset_root: PathBuf,
    /// Directory name for scripts (relative to asset_root)
    pub scripts_dir: String,
    /// Directory name for scenes (relative to asset_root)
    pub scenes_dir: String,
}

impl AssetConfig {
    /// Create a new AssetConfig with custom paths
    pub fn new(asset_root: PathBuf, scripts_dir: String, scenes_dir: String) -> Self {
        debug!(
            asset_root = ?asset_root,
            scripts_dir = scripts_dir,
            scenes_dir = scenes_dir,
            "Creating new AssetConfig"
        );
        Self {
            asset_root,
            scripts_dir,
            scenes_dir,
        }
    }

    /// Asset config rooted at `asset_root` with the default sub-directories
    pub fn with_root(asset_root: impl Into<PathBuf>) -> Self {
        Self {
            asset_root: asset_root.into(),
            ..Self::default()
        }
    }

    pub fn scripts_path(&self) -> PathBuf {
        self.asset_root.join(&self.scripts_dir)
    }

    pub fn scenes_path(&self) -> PathBuf {
        self.asset_root.join(&self.scenes_dir)
    }

    /// Get the full path to an imperative script file
    pub fn script_path(&self, name: &str) -> Result<PathBuf, ConfigError> {
        check_name(name)?;
        let path = self.scripts_path().join(format!("{name}.rhai"));
        debug!(name = name, path = ?path, "Generated script path");
        Ok(path)
    }

    /// Get the full path to a scene file
    pub fn scene_path(&self, name: &str) -> Result<PathBuf, ConfigError> {
        check_name(name)?;
        let path = self.scenes_path().join(format!("{name}.json"));
        debug!(name = name, path = ?path, "Generated scene path");
        Ok(path)
    }

    /// Check if the asset directories exist
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dirs = [
            ("Asset root", self.asset_root.clone()),
            ("Scripts", self.scripts_path()),
            ("Scenes", self.scenes_path()),
        ];
        for (kind, path) in dirs {
            if !path.is_dir() {
                return Err(ConfigError::MissingDirectory { kind, path });
            }
        }
        Ok(())
    }
}

// Reject anything that could escape the asset directory
fn check_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() || name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(ConfigError::InvalidName(name.to_string()));
    }
    Ok(())
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("assets"),
            scripts_dir: "scripts".to_string(),
            scenes_dir: "scenes".to_string(),
        }
    }
}

/// Knobs for the script runtime itself
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Property key holding each entity's reference list
    pub reference_key: String,
    /// Declarative configurations run per frame
    pub declarative_budget_per_frame: usize,
    /// Watch the scripts directory for edits
    pub hot_reload: bool,
    /// Minimum time between two reloads of the same file
    pub watch_debounce: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            reference_key: DEFAULT_REFERENCE_KEY.to_string(),
            declarative_budget_per_frame: 8,
            hot_reload: false,
            watch_debounce: Duration::from_millis(100),
        }
    }
}

/// Everything the host app needs to start
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub assets: AssetConfig,
    pub runtime: RuntimeConfig,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            assets: AssetConfig::default(),
            runtime: RuntimeConfig::default(),
            log_filter: "info".to_string(),
        }
    }
}
