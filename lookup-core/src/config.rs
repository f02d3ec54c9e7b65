//! Engine configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::entities::DEFAULT_PAGE_SIZE;
use crate::error::ConfigError;
use crate::identifier::MAX_LOOKUP_KEY_LEN;

/// Limits applied to lookup requests and batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Largest page size a request may ask for.
    pub max_page_size: u32,
    /// Most lookups allowed in one batch.
    pub max_batch_size: usize,
    /// Longest lookup key accepted.
    pub max_lookup_key_len: usize,
    /// Upper bound on a whole batch; `None` waits indefinitely.
    pub batch_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_page_size: 100,
            max_batch_size: 10,
            max_lookup_key_len: MAX_LOOKUP_KEY_LEN,
            batch_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl EngineConfig {
    /// Load from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `LOOKUP_MAX_PAGE_SIZE` (default: 100)
    /// - `LOOKUP_MAX_BATCH_SIZE` (default: 10)
    /// - `LOOKUP_MAX_KEY_LEN` (default: 50)
    /// - `LOOKUP_BATCH_TIMEOUT_MS` (default: 30000, `0` disables)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let batch_timeout_ms = env_parse("LOOKUP_BATCH_TIMEOUT_MS")?
            .unwrap_or_else(|| defaults.batch_timeout.map_or(0, |d| d.as_millis() as u64));

        let config = Self {
            max_page_size: env_parse("LOOKUP_MAX_PAGE_SIZE")?.unwrap_or(defaults.max_page_size),
            max_batch_size: env_parse("LOOKUP_MAX_BATCH_SIZE")?.unwrap_or(defaults.max_batch_size),
            max_lookup_key_len: env_parse("LOOKUP_MAX_KEY_LEN")?
                .unwrap_or(defaults.max_lookup_key_len),
            batch_timeout: (batch_timeout_ms > 0).then(|| Duration::from_millis(batch_timeout_ms)),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_page_size == 0 {
            return Err(invalid("max_page_size", self.max_page_size, "must be positive"));
        }
        if u64::from(self.max_page_size) < DEFAULT_PAGE_SIZE as u64 {
            return Err(invalid(
                "max_page_size",
                self.max_page_size,
                "must not be below the default page size",
            ));
        }
        if self.max_batch_size == 0 {
            return Err(invalid("max_batch_size", self.max_batch_size, "must be positive"));
        }
        if self.max_lookup_key_len == 0 {
            return Err(invalid(
                "max_lookup_key_len",
                self.max_lookup_key_len,
                "must be positive",
            ));
        }
        Ok(())
    }

    /// Set the batch timeout.
    pub fn with_batch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.batch_timeout = timeout;
        self
    }

    /// Set the max batch size.
    pub fn with_max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = max;
        self
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(name, &raw, "could not be parsed")),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_page_size, 100);
        assert_eq!(config.max_batch_size, 10);
        assert_eq!(config.max_lookup_key_len, 50);
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let config = EngineConfig {
            max_page_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig::default().with_max_batch_size(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_max_below_default_page_size() {
        let config = EngineConfig {
            max_page_size: 10,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(format!("{}", err).contains("max_page_size"));
    }
}
