pub mod http;
pub mod memory;

pub use http::HttpBackend;
pub use memory::MemoryBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::SightlineError;
use crate::models::{ScanPlan, SearchResult};

/// Status as reported by the backend for one scan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl RemoteStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One response from `GET /api/v1/scan/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub status: RemoteStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub results: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StatusSnapshot {
    pub fn running(progress: u8, message: &str) -> Self {
        Self {
            status: RemoteStatus::Running,
            progress,
            status_message: Some(message.to_string()),
            results: None,
            error: None,
        }
    }

    pub fn completed(results: Value) -> Self {
        Self {
            status: RemoteStatus::Completed,
            progress: 100,
            status_message: None,
            results: Some(results),
            error: None,
        }
    }

    pub fn failed(error: &str) -> Self {
        Self {
            status: RemoteStatus::Failed,
            progress: 0,
            status_message: None,
            results: None,
            error: Some(error.to_string()),
        }
    }
}

/// The narrow seam the status poller depends on.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self, scan_id: &str) -> Result<StatusSnapshot, SightlineError>;
}

/// Full consumed backend surface. Scan execution itself lives behind this
/// trait; the orchestration logic never carries mock data of its own.
#[async_trait]
pub trait ScanBackend: StatusSource {
    /// `POST /api/v1/scan` — returns the backend-assigned scan id.
    async fn submit_scan(&self, plan: &ScanPlan) -> Result<String, SightlineError>;

    /// `GET /api/v1/dashboard/metrics` — display-only payload.
    async fn dashboard_metrics(&self) -> Result<Value, SightlineError>;

    /// `GET /api/v1/performance/metrics` — display-only payload.
    async fn performance_metrics(&self) -> Result<Value, SightlineError>;

    /// `GET /api/v1/search/advanced?q=` — free-text search.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SightlineError>;
}
