use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::orchestrator::OrchestratorConfig;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PlatformConfig {
    pub api: Option<ApiConfig>,
    pub scans: Option<ScansConfig>,
    pub notifications: Option<NotificationsConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: Some("http://localhost:8000".to_string()),
            request_timeout_secs: Some(30),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ScansConfig {
    pub max_concurrent: Option<usize>,
    pub poll_interval_ms: Option<u64>,
    pub retry_backoff_ms: Option<u64>,
    pub history_limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NotificationsConfig {
    pub default_duration_ms: Option<u64>,
}

impl PlatformConfig {
    pub fn base_url(&self) -> String {
        self.api
            .as_ref()
            .and_then(|a| a.base_url.clone())
            .unwrap_or_else(|| "http://localhost:8000".to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        let secs = self
            .api
            .as_ref()
            .and_then(|a| a.request_timeout_secs)
            .unwrap_or(30);
        Duration::from_secs(secs)
    }

    /// Resolve orchestrator limits, falling back to platform defaults.
    pub fn orchestrator(&self) -> OrchestratorConfig {
        let defaults = OrchestratorConfig::default();
        let scans = self.scans.clone().unwrap_or_default();
        OrchestratorConfig {
            max_concurrent_scans: scans.max_concurrent.unwrap_or(defaults.max_concurrent_scans),
            poll_interval: scans
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            retry_backoff: scans
                .retry_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_backoff),
            history_limit: scans.history_limit.unwrap_or(defaults.history_limit),
        }
    }

    pub fn notification_duration(&self) -> Duration {
        let ms = self
            .notifications
            .as_ref()
            .and_then(|n| n.default_duration_ms)
            .unwrap_or(4000);
        Duration::from_millis(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = PlatformConfig::default();
        assert_eq!(config.base_url(), "http://localhost:8000");
        let orch = config.orchestrator();
        assert_eq!(orch.max_concurrent_scans, 10);
        assert_eq!(orch.poll_interval, Duration::from_secs(2));
        assert_eq!(orch.retry_backoff, Duration::from_secs(5));
        assert_eq!(config.notification_duration(), Duration::from_millis(4000));
    }

    #[test]
    fn test_overrides_apply() {
        let config = PlatformConfig {
            scans: Some(ScansConfig {
                max_concurrent: Some(3),
                poll_interval_ms: Some(500),
                retry_backoff_ms: None,
                history_limit: Some(5),
            }),
            ..Default::default()
        };
        let orch = config.orchestrator();
        assert_eq!(orch.max_concurrent_scans, 3);
        assert_eq!(orch.poll_interval, Duration::from_millis(500));
        assert_eq!(orch.retry_backoff, Duration::from_secs(5));
        assert_eq!(orch.history_limit, 5);
    }

    #[test]
    fn test_config_deserializes_from_yaml() {
        let yaml = "api:\n  base_url: https://intel.example\nscans:\n  max_concurrent: 2\n";
        let config: PlatformConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.base_url(), "https://intel.example");
        assert_eq!(config.orchestrator().max_concurrent_scans, 2);
    }
}
