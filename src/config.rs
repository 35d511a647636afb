//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables, plus the
//! Kubernetes duration parser used for `spec.syncPeriod`.

use anyhow::Result;
use regex::Regex;
use std::time::Duration;

/// Default steady-state sync period when `spec.syncPeriod` is not set.
pub const DEFAULT_SYNC_PERIOD_SECS: u64 = 600;

/// Floor interval used while a resource is in a failing streak.
pub const DEFAULT_MINIMUM_SYNC_PERIOD_SECS: u64 = 30;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment
/// variables. Environment variables are populated from a ConfigMap using
/// `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Steady-state reconcile interval when a resource is healthy and its
    /// spec does not set `syncPeriod`
    pub default_sync_period_secs: u64,
    /// Minimum reconcile interval; also the retry floor for failing resources
    pub minimum_sync_period_secs: u64,
    /// Namespace where the controller is deployed
    pub controller_namespace: String,
    /// Port for the metrics/probes HTTP server
    pub metrics_port: u16,
    /// Maximum concurrent reconciliations across resources
    pub max_concurrent_reconciliations: usize,
    /// Shared fetch cache directory (invalidated per resource on delete)
    pub fetch_cache_dir: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            default_sync_period_secs: DEFAULT_SYNC_PERIOD_SECS,
            minimum_sync_period_secs: DEFAULT_MINIMUM_SYNC_PERIOD_SECS,
            controller_namespace: "app-deploy-system".to_string(),
            metrics_port: 8080,
            max_concurrent_reconciliations: 10,
            fetch_cache_dir: "/var/cache/app-deploy-controller/fetch".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            default_sync_period_secs: env_var_or_default(
                "DEFAULT_SYNC_PERIOD_SECS",
                DEFAULT_SYNC_PERIOD_SECS,
            ),
            minimum_sync_period_secs: env_var_or_default(
                "MINIMUM_SYNC_PERIOD_SECS",
                DEFAULT_MINIMUM_SYNC_PERIOD_SECS,
            ),
            controller_namespace: env_var_or_default_str("POD_NAMESPACE", "app-deploy-system"),
            metrics_port: env_var_or_default("METRICS_PORT", 8080),
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                10,
            ),
            fetch_cache_dir: env_var_or_default_str(
                "FETCH_CACHE_DIR",
                "/var/cache/app-deploy-controller/fetch",
            ),
        }
    }

    /// Get default sync period duration
    pub fn default_sync_period(&self) -> Duration {
        Duration::from_secs(self.default_sync_period_secs)
    }

    /// Get minimum sync period duration
    pub fn minimum_sync_period(&self) -> Duration {
        Duration::from_secs(self.minimum_sync_period_secs)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a Kubernetes duration string into `std::time::Duration`
///
/// Supports formats: "30s", "1m", "5m", "1h", "2h", "1d".
pub fn parse_kubernetes_duration(duration_str: &str) -> Result<Duration> {
    let duration_trimmed = duration_str.trim();

    if duration_trimmed.is_empty() {
        return Err(anyhow::anyhow!("Duration string cannot be empty"));
    }

    let duration_regex = Regex::new(r"^(?P<number>\d+)(?P<unit>[smhd])$")
        .map_err(|e| anyhow::anyhow!("Failed to compile regex: {e}"))?;

    let interval_lower = duration_trimmed.to_lowercase();

    let captures = duration_regex.captures(&interval_lower).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid duration format '{}'. Expected format: <number><unit> (e.g., '30s', '5m', '1h')",
            duration_trimmed
        )
    })?;

    let number: u64 = captures["number"].parse().map_err(|e| {
        anyhow::anyhow!("Invalid duration number in '{}': {}", duration_trimmed, e)
    })?;

    if number == 0 {
        return Err(anyhow::anyhow!(
            "Duration number must be greater than 0, got '{}'",
            duration_trimmed
        ));
    }

    let seconds = match &captures["unit"] {
        "s" => number,
        "m" => number * 60,
        "h" => number * 3600,
        "d" => number * 86400,
        unit => {
            return Err(anyhow::anyhow!(
                "Invalid unit '{}' in duration '{}'. Expected: s, m, h, or d",
                unit,
                duration_trimmed
            ));
        }
    };

    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seconds() {
        assert_eq!(
            parse_kubernetes_duration("30s").unwrap(),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_parse_minutes() {
        assert_eq!(
            parse_kubernetes_duration("5m").unwrap(),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn test_parse_hours_and_days() {
        assert_eq!(
            parse_kubernetes_duration("2h").unwrap(),
            Duration::from_secs(7200)
        );
        assert_eq!(
            parse_kubernetes_duration("1d").unwrap(),
            Duration::from_secs(86400)
        );
    }

    #[test]
    fn test_parse_trims_and_lowercases() {
        assert_eq!(
            parse_kubernetes_duration(" 10M ").unwrap(),
            Duration::from_secs(600)
        );
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!(parse_kubernetes_duration("").is_err());
        assert!(parse_kubernetes_duration("abc").is_err());
        assert!(parse_kubernetes_duration("5x").is_err());
        assert!(parse_kubernetes_duration("0m").is_err());
        assert!(parse_kubernetes_duration("1m30s").is_err());
    }
}
