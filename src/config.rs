//! Configuration types.
//!
//! Everything is read from `MAILGUARD_*` environment variables. Each config
//! has a `from_lookup` constructor taking a key → value closure so parsing is
//! testable without touching the process environment.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Name reported in run metadata.
pub const RUNTIME_NAME: &str = "mailguard";

/// Triage coordinator configuration.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    /// Default per-analyzer timeout (an analyzer may declare its own).
    pub analyzer_timeout: Duration,
    /// Deadline for the whole fan-out; unsettled analyzers are cancelled.
    pub run_timeout: Duration,
    /// Confidence reported when every invoked analyzer completed.
    pub base_confidence: u8,
    /// Engine version stamped into every verdict.
    pub engine_version: String,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            analyzer_timeout: Duration::from_secs(5),
            run_timeout: Duration::from_secs(30),
            base_confidence: 85,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl TriageConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let analyzer_timeout = parse_millis(&lookup, "MAILGUARD_ANALYZER_TIMEOUT_MS")?
            .unwrap_or(defaults.analyzer_timeout);
        let run_timeout =
            parse_millis(&lookup, "MAILGUARD_RUN_TIMEOUT_MS")?.unwrap_or(defaults.run_timeout);

        let base_confidence = match lookup("MAILGUARD_BASE_CONFIDENCE") {
            Some(raw) => {
                let value: u8 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: "MAILGUARD_BASE_CONFIDENCE".into(),
                    message: format!("expected an integer 0-100, got {raw:?}"),
                })?;
                if value > 100 {
                    return Err(ConfigError::InvalidValue {
                        key: "MAILGUARD_BASE_CONFIDENCE".into(),
                        message: format!("{value} exceeds 100"),
                    });
                }
                value
            }
            None => defaults.base_confidence,
        };

        Ok(Self {
            analyzer_timeout,
            run_timeout,
            base_confidence,
            engine_version: defaults.engine_version,
        })
    }
}

/// Where each analyzer lives. An unset endpoint means the built-in heuristic
/// analyzer is used for that signal.
#[derive(Debug, Clone, Default)]
pub struct AnalyzerConfig {
    pub url_endpoint: Option<String>,
    pub domain_endpoint: Option<String>,
    pub attachment_endpoint: Option<String>,
    pub social_endpoint: Option<String>,
    /// Bearer token sent to remote analyzers.
    pub api_key: Option<SecretString>,
    /// Timeout for remote analyzers, overriding the coordinator default.
    pub remote_timeout: Option<Duration>,
    /// Sender domains that always score maximum domain risk.
    pub domain_blocklist: Vec<String>,
}

impl AnalyzerConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = |key: &str| {
            lookup(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let domain_blocklist = lookup("MAILGUARD_DOMAIN_BLOCKLIST")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            url_endpoint: endpoint("MAILGUARD_URL_ANALYZER"),
            domain_endpoint: endpoint("MAILGUARD_DOMAIN_ANALYZER"),
            attachment_endpoint: endpoint("MAILGUARD_ATTACHMENT_ANALYZER"),
            social_endpoint: endpoint("MAILGUARD_SOCIAL_ANALYZER"),
            api_key: endpoint("MAILGUARD_ANALYZER_API_KEY").map(SecretString::from),
            remote_timeout: parse_millis(&lookup, "MAILGUARD_REMOTE_ANALYZER_TIMEOUT_MS")?,
            domain_blocklist,
        })
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

impl ServerConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("MAILGUARD_PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "MAILGUARD_PORT".into(),
                message: format!("expected a port number, got {raw:?}"),
            })?,
            None => Self::default().port,
        };
        Ok(Self { port })
    }
}

fn parse_millis<F>(lookup: &F, key: &str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let millis: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected milliseconds, got {raw:?}"),
    })?;
    if millis == 0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be greater than zero".into(),
        });
    }
    Ok(Some(Duration::from_millis(millis)))
}
