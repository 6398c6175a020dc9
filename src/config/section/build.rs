//! `[build]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [build]
//! output = "dist"       # Output directory
//! max_parallel = 10     # Producers built concurrently per phase
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Build output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Output directory, relative to the project root.
    pub output: PathBuf,

    /// Upper bound on in-flight producers within one phase.
    pub max_parallel: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            output: "dist".into(),
            max_parallel: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::config::test_parse_config;

    #[test]
    fn test_build_config() {
        let config = test_parse_config("[build]\noutput = \"public\"\nmax_parallel = 4");

        assert_eq!(config.build.output, PathBuf::from("public"));
        assert_eq!(config.build.max_parallel, 4);
    }

    #[test]
    fn test_build_config_defaults() {
        let config = test_parse_config("");

        assert_eq!(config.build.output, PathBuf::from("dist"));
        assert_eq!(config.build.max_parallel, 10);
    }
}
