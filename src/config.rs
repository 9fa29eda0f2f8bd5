//! Runtime configuration.
//!
//! All configuration comes from environment variables; nothing is persisted.
//! Defaults match what the backend expects when the variables are unset.

/// Default backend base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:5000";

/// Model used when the user has not picked one.
pub const DEFAULT_MODEL: &str = "us.amazon.nova-lite-v1:0";

/// Maximum length of a query accepted by the input field.
pub const MAX_QUERY_LEN: usize = 500;

/// Runtime configuration resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Backend base URL (`SIFT_API_URL`)
    pub api_url: String,
    /// User id sent with every request (`SIFT_USER`, falling back to `$USER`)
    pub user: String,
    /// Default model id for new queries (`SIFT_MODEL`)
    pub default_model: String,
}

impl Config {
    /// Resolve configuration from the environment.
    pub fn from_env() -> Self {
        let api_url = std::env::var("SIFT_API_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let user = std::env::var("SIFT_USER")
            .or_else(|_| std::env::var("USER"))
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "analyst".to_string());
        let default_model = std::env::var("SIFT_MODEL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            user,
            default_model,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            user: "analyst".to_string(),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.default_model, DEFAULT_MODEL);
        assert!(!config.user.is_empty());
    }
}
