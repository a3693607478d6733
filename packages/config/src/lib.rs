// ABOUTME: Environment-derived settings for programs built on the Thiri SDK
// ABOUTME: The SDK itself never reads the environment; entry points load settings here and pass them on

pub mod constants;

use std::env;
use std::num::ParseIntError;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(&'static str),

    #[error("Invalid value for {name}: {source}")]
    InvalidNumber {
        name: &'static str,
        #[source]
        source: ParseIntError,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings read from the environment
#[derive(Clone, PartialEq, Eq)]
pub struct EnvSettings {
    pub api_key: String,
    /// `None` means the SDK default endpoint
    pub api_base: Option<String>,
    /// `None` means the SDK default; `Some(ZERO)` disables the wait
    pub ready_delay: Option<Duration>,
}

impl EnvSettings {
    /// Load settings from the process environment, after reading `.env` if present
    pub fn from_env() -> ConfigResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(constants::THIRI_API_KEY)
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingVariable(constants::THIRI_API_KEY))?;

        let api_base = lookup(constants::THIRI_API_BASE).filter(|v| !v.is_empty());

        let ready_delay = match lookup(constants::THIRI_READY_DELAY_MS) {
            Some(raw) if !raw.is_empty() => {
                let millis = raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|source| ConfigError::InvalidNumber {
                        name: constants::THIRI_READY_DELAY_MS,
                        source,
                    })?;
                Some(Duration::from_millis(millis))
            }
            _ => None,
        };

        Ok(Self {
            api_key,
            api_base,
            ready_delay,
        })
    }
}

impl std::fmt::Debug for EnvSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvSettings")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("ready_delay", &self.ready_delay)
            .finish()
    }
}

/// Install a `tracing` subscriber honouring `RUST_LOG`, defaulting to `info`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env(constants::RUST_LOG)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_requires_api_key() {
        let err = EnvSettings::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVariable("THIRI_API_KEY")));

        let err = EnvSettings::from_lookup(lookup(&[("THIRI_API_KEY", "")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVariable(_)));
    }

    #[test]
    fn test_defaults_when_optional_vars_missing() {
        let settings = EnvSettings::from_lookup(lookup(&[("THIRI_API_KEY", "k")])).unwrap();
        assert_eq!(
            settings,
            EnvSettings {
                api_key: "k".to_string(),
                api_base: None,
                ready_delay: None,
            }
        );
    }

    #[test]
    fn test_reads_all_vars() {
        let settings = EnvSettings::from_lookup(lookup(&[
            ("THIRI_API_KEY", "k"),
            ("THIRI_API_BASE", "http://localhost:9000/api"),
            ("THIRI_READY_DELAY_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(settings.api_base.as_deref(), Some("http://localhost:9000/api"));
        assert_eq!(settings.ready_delay, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_rejects_bad_delay() {
        let err = EnvSettings::from_lookup(lookup(&[
            ("THIRI_API_KEY", "k"),
            ("THIRI_READY_DELAY_MS", "soon"),
        ]))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid value for THIRI_READY_DELAY_MS: invalid digit found in string"
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let settings = EnvSettings::from_lookup(lookup(&[("THIRI_API_KEY", "secret")])).unwrap();
        assert!(!format!("{:?}", settings).contains("secret"));
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        assert_eq!(constants::RUST_LOG, "RUST_LOG");
        init_tracing();
        init_tracing();
    }
}
