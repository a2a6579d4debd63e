use std::time::Duration;

use orchestrator::RecoveryPolicy;
use tracing::warn;

/// Server configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub database_url: String,
    pub stage_timeout: Duration,
    pub recovery: RecoveryPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            database_url: "sqlite:research.db".to_string(),
            stage_timeout: Duration::from_secs(120),
            recovery: RecoveryPolicy::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(value = %raw, "Invalid PORT, using default");
                defaults.port
            }),
            Err(_) => defaults.port,
        };

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| defaults.database_url.clone());

        let stage_timeout = match std::env::var("STAGE_TIMEOUT_SECS") {
            Ok(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    warn!(value = %raw, "Invalid STAGE_TIMEOUT_SECS, using default");
                    defaults.stage_timeout
                }
            },
            Err(_) => defaults.stage_timeout,
        };

        let recovery = match std::env::var("RECOVERY_POLICY") {
            Ok(raw) => RecoveryPolicy::parse(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "Invalid RECOVERY_POLICY, using default");
                defaults.recovery
            }),
            Err(_) => defaults.recovery,
        };

        Self {
            port,
            database_url,
            stage_timeout,
            recovery,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.stage_timeout, Duration::from_secs(120));
        assert_eq!(config.recovery, RecoveryPolicy::MarkStopped);
    }
}
