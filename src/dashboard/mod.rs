use serde_json::Value;
use std::sync::Arc;

use crate::backend::ScanBackend;
use crate::errors::SightlineError;
use crate::models::SearchResult;

/// Display-only view over the backend's metric and search endpoints. The
/// payloads are passed through untouched for the UI layer to render.
pub struct DashboardService {
    backend: Arc<dyn ScanBackend>,
}

impl DashboardService {
    pub fn new(backend: Arc<dyn ScanBackend>) -> Self {
        Self { backend }
    }

    /// Dashboard and performance metrics, fetched concurrently.
    pub async fn overview(&self) -> Result<(Value, Value), SightlineError> {
        futures::future::try_join(
            self.backend.dashboard_metrics(),
            self.backend.performance_metrics(),
        )
        .await
    }

    pub async fn metrics(&self) -> Result<Value, SightlineError> {
        self.backend.dashboard_metrics().await
    }

    pub async fn performance(&self) -> Result<Value, SightlineError> {
        self.backend.performance_metrics().await
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SightlineError> {
        self.backend.search(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::models::{ScanPlan, ScanType};
    use std::collections::{BTreeSet, HashMap};

    #[tokio::test]
    async fn test_search_passes_through_backend_results() {
        let backend = Arc::new(MemoryBackend::new());
        let plan = ScanPlan {
            target: "a@b.com".to_string(),
            scan_type: ScanType::EmailLookup,
            modules: BTreeSet::new(),
            options: HashMap::new(),
            timeout_secs: 300,
            retries: 0,
        };
        backend.submit_scan(&plan).await.unwrap();

        let dashboard = DashboardService::new(backend);
        let results = dashboard.search("a@b.com").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "a@b.com");
    }

    #[tokio::test]
    async fn test_overview_returns_both_payloads() {
        let dashboard = DashboardService::new(Arc::new(MemoryBackend::new()));
        let (metrics, performance) = dashboard.overview().await.unwrap();
        assert!(metrics.is_object());
        assert!(performance.is_object());
    }
}
