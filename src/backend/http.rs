use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{ScanBackend, StatusSnapshot, StatusSource};
use crate::errors::SightlineError;
use crate::models::{ScanPlan, SearchResult};

/// Backend client over the platform's `/api/v1` surface.
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SightlineError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SightlineError::Config(format!("HTTP client build failed: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json(&self, path: &str) -> Result<Value, SightlineError> {
        self.get_json_query(path, &[]).await
    }

    async fn get_json_query(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, SightlineError> {
        let resp = self
            .client
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(|e| SightlineError::Transport(format!("GET {} failed: {}", path, e)))?;

        let status = resp.status();
        if status == 404 {
            return Err(SightlineError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            return Err(SightlineError::Backend(format!(
                "GET {} returned {}",
                path, status
            )));
        }

        resp.json()
            .await
            .map_err(|e| SightlineError::Backend(format!("invalid JSON from {}: {}", path, e)))
    }
}

#[async_trait]
impl StatusSource for HttpBackend {
    async fn fetch_status(&self, scan_id: &str) -> Result<StatusSnapshot, SightlineError> {
        let path = format!("/api/v1/scan/{}", scan_id);
        let data = self.get_json(&path).await?;
        let snapshot: StatusSnapshot = serde_json::from_value(data)
            .map_err(|e| SightlineError::Backend(format!("invalid status payload: {}", e)))?;
        debug!(scan_id, progress = snapshot.progress, "status fetched");
        Ok(snapshot)
    }
}

#[async_trait]
impl ScanBackend for HttpBackend {
    async fn submit_scan(&self, plan: &ScanPlan) -> Result<String, SightlineError> {
        let resp = self
            .client
            .post(self.url("/api/v1/scan"))
            .json(plan)
            .send()
            .await
            .map_err(|e| SightlineError::Transport(format!("scan submission failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SightlineError::Backend(format!(
                "scan submission returned {}",
                status
            )));
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| SightlineError::Backend(format!("invalid submission response: {}", e)))?;

        let scan_id = data["scan_id"]
            .as_str()
            .ok_or_else(|| SightlineError::Backend("no scan_id in submission response".into()))?
            .to_string();

        debug!(scan_id = %scan_id, target = %plan.target, "scan submitted");
        Ok(scan_id)
    }

    async fn dashboard_metrics(&self) -> Result<Value, SightlineError> {
        self.get_json("/api/v1/dashboard/metrics").await
    }

    async fn performance_metrics(&self) -> Result<Value, SightlineError> {
        self.get_json("/api/v1/performance/metrics").await
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SightlineError> {
        // reqwest percent-encodes the query pair.
        let data = self
            .get_json_query("/api/v1/search/advanced", &[("q", query)])
            .await?;
        let items = data["data"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let result: SearchResult = serde_json::from_value(item)
                .map_err(|e| SightlineError::Backend(format!("invalid search item: {}", e)))?;
            results.push(result);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_normalized() {
        let backend = HttpBackend::new("http://localhost:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(backend.url("/api/v1/scan"), "http://localhost:8000/api/v1/scan");
    }
}
