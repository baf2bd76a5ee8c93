//! Process configuration read from the environment at startup.

use std::time::Duration;

use govbot_rag::ChatMode;
use thiserror::Error;

use crate::telemetry::LogFormat;

/// A missing or unparseable setting.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed to call the API with credentials.
    pub allowed_origins: Vec<String>,
    pub chat_mode: ChatMode,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub pinecone_api_key: String,
    pub pinecone_environment: String,
    /// Overrides the controller URL derived from `pinecone_environment`.
    pub pinecone_controller_url: Option<String>,
    /// Upper bound on each call to an external service.
    pub request_timeout: Duration,
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let port = match get("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: "PORT",
                message: e.to_string(),
            })?,
            None => 8080,
        };

        let chat_mode = match get("CHAT_MODE") {
            Some(raw) => raw.parse::<ChatMode>().map_err(|e| ConfigError::Invalid {
                name: "CHAT_MODE",
                message: e.to_string(),
            })?,
            None => ChatMode::default(),
        };

        let request_timeout = match get("REQUEST_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "REQUEST_TIMEOUT_SECS",
                        message: format!("'{raw}' is not a positive number of seconds"),
                    });
                }
            },
            None => Duration::from_secs(60),
        };

        let log_format = match get("LOG_FORMAT") {
            Some(raw) => raw.parse::<LogFormat>().map_err(|message| ConfigError::Invalid {
                name: "LOG_FORMAT",
                message,
            })?,
            None => LogFormat::default(),
        };

        let allowed_origins: Vec<String> = get("ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:4200".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();
        if allowed_origins.iter().any(|origin| origin == "*") {
            return Err(ConfigError::Invalid {
                name: "ALLOWED_ORIGINS",
                message: "'*' cannot be combined with credentialed requests; list each origin".into(),
            });
        }

        Ok(Self {
            host: get("GOVBOT_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            allowed_origins,
            chat_mode,
            openai_api_key: required("OPENAI_API_KEY")?,
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| govbot_rag::openai::DEFAULT_BASE_URL.to_string()),
            pinecone_api_key: required("PINECONE_API_KEY")?,
            pinecone_environment: required("PINECONE_ENVIRONMENT")?,
            pinecone_controller_url: get("PINECONE_CONTROLLER_URL"),
            request_timeout,
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name: &str| vars.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("OPENAI_API_KEY", "sk-test"),
        ("PINECONE_API_KEY", "pc-test"),
        ("PINECONE_ENVIRONMENT", "us-west1-gcp"),
    ];

    #[test]
    fn defaults_apply() {
        let config = ServerConfig::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.allowed_origins, vec!["http://localhost:4200"]);
        assert_eq!(config.chat_mode, ChatMode::Buffered);
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.openai_base_url, "https://api.openai.com/v1");
        assert!(config.pinecone_controller_url.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("PORT", "3000"),
            ("CHAT_MODE", "relay"),
            ("ALLOWED_ORIGINS", "https://a.nm.gov, https://b.nm.gov,"),
            ("REQUEST_TIMEOUT_SECS", "15"),
            ("LOG_FORMAT", "json"),
        ]);

        let config = ServerConfig::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.chat_mode, ChatMode::Relay);
        assert_eq!(config.allowed_origins, vec!["https://a.nm.gov", "https://b.nm.gov"]);
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn missing_keys_are_reported_by_name() {
        let err = ServerConfig::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("PINECONE_ENVIRONMENT")));
    }

    #[test]
    fn bad_values_are_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("REQUEST_TIMEOUT_SECS", "0"));
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { name: "REQUEST_TIMEOUT_SECS", .. })
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("ALLOWED_ORIGINS", "http://localhost:4200, *"));
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { name: "ALLOWED_ORIGINS", .. })
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PORT", "eighty"));
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { name: "PORT", .. })
        ));
    }
}
