//! Engine configuration management for `sitegraph.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── build      # [build]
//! │   ├── cache      # [cache]
//! │   ├── paths      # [paths]
//! │   └── watch      # [watch]
//! ├── error          # ConfigError
//! ├── util           # Config file discovery
//! └── mod.rs         # EngineConfig (this file)
//! ```
//!
//! # Sections
//!
//! | Section    | Purpose                                        |
//! |------------|------------------------------------------------|
//! | `[build]`  | Output directory and build concurrency         |
//! | `[paths]`  | Source roots, URL prefixes, default layout     |
//! | `[cache]`  | Idle sweep and memory pressure thresholds      |
//! | `[watch]`  | Debounce window for change events              |

mod error;
pub mod section;
mod util;

pub use error::ConfigError;
pub use section::{BuildConfig, CacheConfig, PathsConfig, WatchConfig};
pub use util::find_config_file;

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::cache::CachePolicy;

/// Default config file name.
pub const CONFIG_FILE: &str = "sitegraph.toml";

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing sitegraph.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    root: PathBuf,

    pub build: BuildConfig,
    pub paths: PathsConfig,
    pub cache: CacheConfig,
    pub watch: WatchConfig,
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub output: Option<PathBuf>,
    pub max_parallel: Option<usize>,
}

impl EngineConfig {
    /// Load configuration for a project.
    ///
    /// Searches upward from cwd for `config_name`. A missing file yields the
    /// defaults rooted at cwd. The result is finalized and validated.
    pub fn load(config_name: &Path, overrides: &Overrides) -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().map_err(|err| ConfigError::Io(".".into(), err))?;

        let mut config = match find_config_file(config_name) {
            Some(path) => {
                let mut config = Self::from_path(&path)?;
                config.config_path = path;
                config
            }
            None => {
                crate::debug!("config"; "{} not found, using defaults", config_name.display());
                Self::default()
            }
        };

        let root = config
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or(cwd);

        config.apply_overrides(overrides);
        config.finalize(&root);
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Apply command-line values on top of the file.
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(output) = &overrides.output {
            self.build.output = output.clone();
        }
        if let Some(max_parallel) = overrides.max_parallel {
            self.build.max_parallel = max_parallel;
        }
    }

    /// Anchor every relative path at `root`.
    pub fn finalize(&mut self, root: &Path) {
        self.root = root.to_path_buf();

        let paths = &mut self.paths;
        for path in [
            &mut paths.theme_assets,
            &mut paths.assets,
            &mut paths.posts,
            &mut paths.pages,
            &mut paths.layouts,
            &mut self.build.output,
        ] {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.build.max_parallel == 0 {
            return Err(ConfigError::Validation(
                "[build] max_parallel must be at least 1".into(),
            ));
        }
        if self.cache.sweep_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "[cache] sweep_interval_ms must be greater than 0".into(),
            ));
        }
        if self.cache.grace_period_ms > self.cache.idle_timeout_ms {
            return Err(ConfigError::Validation(format!(
                "[cache] grace_period_ms ({}) exceeds idle_timeout_ms ({})",
                self.cache.grace_period_ms, self.cache.idle_timeout_ms
            )));
        }
        for (name, prefix) in [
            ("posts_url", &self.paths.posts_url),
            ("pages_url", &self.paths.pages_url),
        ] {
            if !prefix.starts_with('/') {
                return Err(ConfigError::Validation(format!(
                    "[paths] {name} must start with `/`, got `{prefix}`"
                )));
            }
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.cache.policy()
    }

    pub fn debounce(&self) -> Duration {
        self.watch.debounce()
    }
}

// ============================================================================

/// Parse a config snippet, panicking on invalid TOML.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> EngineConfig {
    EngineConfig::from_str(content).unwrap()
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_invalid_toml() {
        let result = EngineConfig::from_str("[build\nmax_parallel = 2");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_wrong_type_rejected() {
        let result = EngineConfig::from_str("[build]\nmax_parallel = \"many\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();

        assert_eq!(config.config_path, PathBuf::new());
        assert_eq!(config.root(), Path::new(""));
        assert_eq!(config.build.max_parallel, 10);
        assert_eq!(config.debounce(), Duration::from_millis(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_finalize_anchors_relative_paths() {
        let mut config = test_parse_config("[paths]\nassets = \"/abs/assets\"");
        config.finalize(Path::new("/site"));

        assert_eq!(config.root(), Path::new("/site"));
        assert_eq!(config.paths.assets, PathBuf::from("/abs/assets"));
        assert_eq!(config.paths.posts, PathBuf::from("/site/content/posts"));
        assert_eq!(config.build.output, PathBuf::from("/site/dist"));
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut config = test_parse_config("[build]\noutput = \"public\"\nmax_parallel = 3");
        config.apply_overrides(&Overrides {
            output: Some("out".into()),
            max_parallel: None,
        });

        assert_eq!(config.build.output, PathBuf::from("out"));
        assert_eq!(config.build.max_parallel, 3);
    }

    #[test]
    fn test_validate_rejects_zero_parallel() {
        let config = test_parse_config("[build]\nmax_parallel = 0");
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("max_parallel"));
    }

    #[test]
    fn test_validate_rejects_zero_sweep_interval() {
        let config = test_parse_config("[cache]\nsweep_interval_ms = 0");
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_grace_beyond_timeout() {
        let config = test_parse_config("[cache]\ngrace_period_ms = 5000\nidle_timeout_ms = 1000");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("grace_period_ms (5000)"));
    }

    #[test]
    fn test_validate_rejects_relative_prefix() {
        let config = test_parse_config("[paths]\nposts_url = \"blog/\"");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_path_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nope.toml");
        let err = EngineConfig::from_path(&path).unwrap_err();

        assert!(matches!(err, ConfigError::Io(ref p, _) if p == &path));
    }

    #[test]
    fn test_from_path_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[watch]\ndebounce_ms = 25\n").unwrap();

        let config = EngineConfig::from_path(&path).unwrap();
        assert_eq!(config.debounce(), Duration::from_millis(25));
    }
}
