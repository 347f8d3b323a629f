use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://taskrouter.twilio.com";

/// Configuration errors
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Environment variable {field} is required but not set")]
    MissingRequired { field: String },

    #[error("Invalid value for field '{field}': {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub account_sid: String,
    pub auth_token: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Public base URL the provider reaches this service on, without a trailing slash.
    pub host_url: String,
    pub api_base: String,
    /// `None` only when running against the in-memory backend.
    pub credentials: Option<Credentials>,
    pub request_timeout: Option<Duration>,
    pub validate_signatures: bool,
    pub offline: bool,
    pub skip_provisioning: bool,
}

/// Settings that come from the command line rather than the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerArgs {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: Option<u64>,
    pub offline: bool,
    pub skip_provisioning: bool,
}

impl Default for ServerArgs {
    fn default() -> Self {
        ServerArgs {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: None,
            offline: false,
            skip_provisioning: false,
        }
    }
}

impl AppConfig {
    pub fn from_env(args: ServerArgs) -> ConfigResult<Self> {
        Self::from_lookup(args, |key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(args: ServerArgs, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> ConfigResult<String> {
            match lookup(key) {
                Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
                _ => Err(ConfigError::MissingRequired {
                    field: key.to_string(),
                }),
            }
        };

        let host_url = normalize_host_url(&required("HOST_URL")?)?;
        let credentials = if args.offline {
            None
        } else {
            Some(Credentials {
                account_sid: required("TWILIO_ACCOUNT_SID")?,
                auth_token: required("TWILIO_AUTH_TOKEN")?,
            })
        };
        let api_base = lookup("TASKROUTER_API_BASE")
            .filter(|v| !v.trim().is_empty())
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let validate_signatures = match lookup("TWILIO_VALIDATE_SIGNATURES") {
            Some(value) => parse_flag("TWILIO_VALIDATE_SIGNATURES", &value)?,
            None => false,
        };
        if validate_signatures && credentials.is_none() {
            return Err(ConfigError::InvalidValue {
                field: "TWILIO_VALIDATE_SIGNATURES".to_string(),
                value: "true".to_string(),
                reason: "signature validation needs TWILIO_AUTH_TOKEN, unavailable in offline mode"
                    .to_string(),
            });
        }

        Ok(AppConfig {
            host: args.host,
            port: args.port,
            host_url,
            api_base,
            credentials,
            request_timeout: args.request_timeout_secs.map(Duration::from_secs),
            validate_signatures,
            offline: args.offline,
            skip_provisioning: args.skip_provisioning,
        })
    }

    /// Absolute URL for one of this service's routes.
    pub fn route_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.host_url, path)
        } else {
            format!("{}/{}", self.host_url, path)
        }
    }
}

fn normalize_host_url(raw: &str) -> ConfigResult<String> {
    if !(raw.starts_with("http://") || raw.starts_with("https://")) {
        return Err(ConfigError::InvalidValue {
            field: "HOST_URL".to_string(),
            value: raw.to_string(),
            reason: "must start with http:// or https://".to_string(),
        });
    }
    Ok(raw.trim_end_matches('/').to_string())
}

fn parse_flag(field: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: other.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const FULL: &[(&str, &str)] = &[
        ("TWILIO_ACCOUNT_SID", "AC123"),
        ("TWILIO_AUTH_TOKEN", "secret"),
        ("HOST_URL", "https://calls.example.com/"),
    ];

    #[test]
    fn loads_required_settings() {
        let config = AppConfig::from_lookup(ServerArgs::default(), env(FULL)).unwrap();
        assert_eq!(config.host_url, "https://calls.example.com");
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(
            config.credentials,
            Some(Credentials {
                account_sid: "AC123".to_string(),
                auth_token: "secret".to_string(),
            })
        );
        assert_eq!(config.request_timeout, None);
        assert!(!config.validate_signatures);
        assert_eq!(config.route_url("/voicemail"), "https://calls.example.com/voicemail");
        assert_eq!(config.route_url("enqueue"), "https://calls.example.com/enqueue");
    }

    #[test]
    fn missing_variable_is_reported_by_name() {
        let err = AppConfig::from_lookup(
            ServerArgs::default(),
            env(&[("HOST_URL", "https://x.example"), ("TWILIO_ACCOUNT_SID", "AC1")]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingRequired {
                field: "TWILIO_AUTH_TOKEN".to_string()
            }
        );
    }

    #[test]
    fn empty_variable_counts_as_missing() {
        let err = AppConfig::from_lookup(
            ServerArgs::default(),
            env(&[
                ("HOST_URL", "  "),
                ("TWILIO_ACCOUNT_SID", "AC1"),
                ("TWILIO_AUTH_TOKEN", "t"),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { field } if field == "HOST_URL"));
    }

    #[test]
    fn host_url_needs_scheme() {
        let err = AppConfig::from_lookup(
            ServerArgs::default(),
            env(&[
                ("HOST_URL", "calls.example.com"),
                ("TWILIO_ACCOUNT_SID", "AC1"),
                ("TWILIO_AUTH_TOKEN", "t"),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field, .. } if field == "HOST_URL"));
    }

    #[test]
    fn offline_mode_needs_only_host_url() {
        let args = ServerArgs {
            offline: true,
            ..ServerArgs::default()
        };
        let config = AppConfig::from_lookup(args, env(&[("HOST_URL", "http://localhost:8080")]))
            .unwrap();
        assert!(config.offline);
        assert!(config.credentials.is_none());
    }

    #[test]
    fn optional_settings() {
        let mut pairs = FULL.to_vec();
        pairs.push(("TASKROUTER_API_BASE", "http://127.0.0.1:9000/"));
        pairs.push(("TWILIO_VALIDATE_SIGNATURES", "TRUE"));
        let args = ServerArgs {
            request_timeout_secs: Some(30),
            ..ServerArgs::default()
        };
        let config = AppConfig::from_lookup(args, env(&pairs)).unwrap();
        assert_eq!(config.api_base, "http://127.0.0.1:9000");
        assert!(config.validate_signatures);
        assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn bad_flag_is_rejected() {
        let mut pairs = FULL.to_vec();
        pairs.push(("TWILIO_VALIDATE_SIGNATURES", "maybe"));
        let err = AppConfig::from_lookup(ServerArgs::default(), env(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
