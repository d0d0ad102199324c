//! CLI utilities for binaries
//!
//! Handles configuration path resolution for binary executables.

use std::path::PathBuf;

/// Type of configuration to load
#[derive(Debug, Clone)]
pub enum ConfigType {
    /// Listener configuration (config/adonis.yaml)
    Listen,
    /// Custom path
    Custom(String),
}

impl ConfigType {
    /// Get the default path for this config type
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::Listen => "config/adonis.yaml",
            ConfigType::Custom(path) => path,
        }
    }

    /// Get the environment variable name for this config type
    pub fn env_var_name(&self) -> &str {
        "ADONIS_CONFIG_PATH"
    }
}

/// Load configuration path from environment or use default
///
/// A path given on the command line wins over both.
///
/// # Examples
/// ```
/// use adonis_client::bin_common::{load_config_from_env, ConfigType};
///
/// let path = load_config_from_env(ConfigType::Listen);
/// ```
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    if let ConfigType::Custom(path) = &config_type {
        return path.into();
    }

    std::env::var(config_type.env_var_name())
        .unwrap_or_else(|_| config_type.default_path().to_string())
        .into()
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_type_paths() {
        assert_eq!(ConfigType::Listen.default_path(), "config/adonis.yaml");

        let custom = ConfigType::Custom("custom/path.yaml".to_string());
        assert_eq!(custom.default_path(), "custom/path.yaml");
    }

    #[test]
    fn test_custom_path_ignores_env() {
        let custom = ConfigType::Custom("explicit.yaml".to_string());
        assert_eq!(load_config_from_env(custom), PathBuf::from("explicit.yaml"));
    }
}
