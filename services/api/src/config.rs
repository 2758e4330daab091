use std::net::SocketAddr;
use tracing::Level;

/// Upstream used when `AVATAR_BASE_API_URL` is not set.
pub const DEFAULT_BASE_API_URL: &str = "https://api.heygen.com";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub avatar_api_key: String,
    pub avatar_base_api_url: String,
    pub log_level: Level,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("avatar_api_key", &"<redacted>")
            .field("avatar_base_api_url", &self.avatar_base_api_url)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let avatar_api_key = std::env::var("AVATAR_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("AVATAR_API_KEY".to_string()))?;

        let avatar_base_api_url = std::env::var("AVATAR_BASE_API_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        if !avatar_base_api_url.starts_with("http://")
            && !avatar_base_api_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidValue(
                "AVATAR_BASE_API_URL".to_string(),
                format!("'{}' is not an http(s) URL", avatar_base_api_url),
            ));
        }

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            avatar_api_key,
            avatar_base_api_url,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tracing::Level;

    fn clear_env_vars() {
        unsafe {
            env::remove_var("BIND_ADDRESS");
            env::remove_var("AVATAR_API_KEY");
            env::remove_var("AVATAR_BASE_API_URL");
            env::remove_var("RUST_LOG");
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_from_env_minimal() {
        clear_env_vars();
        unsafe {
            env::set_var("AVATAR_API_KEY", "test-key");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.avatar_api_key, "test-key");
        assert_eq!(config.avatar_base_api_url, "https://api.heygen.com");
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("BIND_ADDRESS", "127.0.0.1:8080");
            env::set_var("AVATAR_API_KEY", "custom-key");
            env::set_var("AVATAR_BASE_API_URL", "http://localhost:9000/");
            env::set_var("RUST_LOG", "debug");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:8080");
        assert_eq!(config.avatar_api_key, "custom-key");
        assert_eq!(config.avatar_base_api_url, "http://localhost:9000");
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    #[serial]
    fn test_config_missing_api_key() {
        clear_env_vars();
        unsafe {
            env::set_var("AVATAR_API_KEY", "   ");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(var) => assert_eq!(var, "AVATAR_API_KEY"),
            _ => panic!("Expected MissingVar for AVATAR_API_KEY"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_bind_address() {
        clear_env_vars();
        unsafe {
            env::set_var("BIND_ADDRESS", "not-a-valid-address");
            env::set_var("AVATAR_API_KEY", "test-key");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "BIND_ADDRESS"),
            _ => panic!("Expected InvalidValue for BIND_ADDRESS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_base_url() {
        clear_env_vars();
        unsafe {
            env::set_var("AVATAR_API_KEY", "test-key");
            env::set_var("AVATAR_BASE_API_URL", "api.heygen.com");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "AVATAR_BASE_API_URL"),
            _ => panic!("Expected InvalidValue for AVATAR_BASE_API_URL"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        unsafe {
            env::set_var("AVATAR_API_KEY", "test-key");
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = Config {
            bind_address: "127.0.0.1:3000".parse().unwrap(),
            avatar_api_key: "super-secret".to_string(),
            avatar_base_api_url: DEFAULT_BASE_API_URL.to_string(),
            log_level: Level::INFO,
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
