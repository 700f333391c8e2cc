use std::path::Path;
use tracing::warn;

use super::types::PlatformConfig;
use crate::errors::SightlineError;

pub async fn parse_config(path: &Path) -> Result<PlatformConfig, SightlineError> {
    if !path.exists() {
        return Err(SightlineError::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > 1_048_576 {
        return Err(SightlineError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let config: PlatformConfig = serde_yaml::from_str(&content)?;

    validate_limits(&config)?;

    Ok(config)
}

/// Reject limits that would stall or disable the pipeline.
fn validate_limits(config: &PlatformConfig) -> Result<(), SightlineError> {
    if let Some(scans) = &config.scans {
        if scans.max_concurrent == Some(0) {
            return Err(SightlineError::Config(
                "scans.max_concurrent must be at least 1".into(),
            ));
        }
        if scans.poll_interval_ms == Some(0) {
            return Err(SightlineError::Config(
                "scans.poll_interval_ms must be greater than zero".into(),
            ));
        }
        if scans.history_limit == Some(0) {
            warn!("scans.history_limit is 0; completed scans will not be retained");
        }
    }

    if let Some(api) = &config.api {
        if let Some(url) = &api.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(SightlineError::Config(format!(
                    "api.base_url must be an http(s) URL, got '{}'",
                    url
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::ScansConfig;
    use std::io::Write;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_parse_valid_config() {
        let file = write_temp("api:\n  base_url: http://localhost:9000\nscans:\n  max_concurrent: 4\n");
        let config = parse_config(file.path()).await.unwrap();
        assert_eq!(config.base_url(), "http://localhost:9000");
        assert_eq!(config.orchestrator().max_concurrent_scans, 4);
    }

    #[tokio::test]
    async fn test_missing_file_is_config_error() {
        let err = parse_config(Path::new("/nonexistent/sightline.yaml"))
            .await
            .unwrap_err();
        assert!(matches!(err, SightlineError::Config(_)));
    }

    #[tokio::test]
    async fn test_zero_max_concurrent_rejected() {
        let file = write_temp("scans:\n  max_concurrent: 0\n");
        let err = parse_config(file.path()).await.unwrap_err();
        assert!(err.to_string().contains("max_concurrent"));
    }

    #[tokio::test]
    async fn test_non_http_base_url_rejected() {
        let file = write_temp("api:\n  base_url: ftp://example.com\n");
        let err = parse_config(file.path()).await.unwrap_err();
        assert!(err.to_string().contains("http(s)"));
    }

    #[test]
    fn test_validate_limits_zero_poll_interval() {
        let config = PlatformConfig {
            scans: Some(ScansConfig {
                poll_interval_ms: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(validate_limits(&config).is_err());
    }
}
