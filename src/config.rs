use std::time::Duration;

use crate::error::SettleError;
use crate::retry::RetryPolicy;

pub const CONSISTENCY_CHECKS_ENV: &str = "TFSETTLE_CONSISTENCY_CHECKS";
pub const READ_TIMEOUT_ENV: &str = "TFSETTLE_READ_TIMEOUT_SECS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckerConfig {
    /// When false, every check passes and no snapshots are retained.
    pub consistency_checks: bool,
    pub retry: RetryPolicy,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            consistency_checks: true,
            retry: RetryPolicy::default(),
        }
    }
}

impl CheckerConfig {
    pub fn from_env() -> Result<Self, SettleError> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var(CONSISTENCY_CHECKS_ENV) {
            config.consistency_checks = parse_bool(&raw).ok_or_else(|| {
                SettleError::Config(format!(
                    "{} must be true or false, got '{}'",
                    CONSISTENCY_CHECKS_ENV, raw
                ))
            })?;
        }

        if let Ok(raw) = std::env::var(READ_TIMEOUT_ENV) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                SettleError::Config(format!(
                    "{} must be a whole number of seconds, got '{}'",
                    READ_TIMEOUT_ENV, raw
                ))
            })?;
            config.retry.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
