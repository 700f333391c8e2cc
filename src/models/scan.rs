use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::request::ScanPlan;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Created,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ScanStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scan instance, tracked from creation to a terminal state.
///
/// Mutated only by the orchestrator that owns it; everything handed out
/// through accessors is a snapshot clone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scan {
    pub id: String,
    pub plan: ScanPlan,
    pub status: ScanStatus,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub results: Option<Value>,
    pub error: Option<String>,
}

impl Scan {
    pub fn new(id: String, plan: ScanPlan) -> Self {
        Self {
            id,
            plan,
            status: ScanStatus::Created,
            progress: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            results: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = ScanStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Record reported progress. Monotonic non-decreasing while running;
    /// stale lower values from out-of-order snapshots are ignored.
    pub fn record_progress(&mut self, progress: u8) {
        if self.status == ScanStatus::Running {
            self.progress = self.progress.max(progress.min(100));
        }
    }

    pub fn mark_completed(&mut self, results: Value) {
        self.status = ScanStatus::Completed;
        self.progress = 100;
        self.completed_at = Some(Utc::now());
        self.results = Some(results);
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = ScanStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error);
    }

    pub fn mark_cancelled(&mut self) {
        self.status = ScanStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }
}

/// Immutable snapshot appended to the bounded history list on completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanHistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub plan: ScanPlan,
    pub results: Value,
    pub report: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::request::{ScanPlan, ScanType};
    use std::collections::{BTreeSet, HashMap};

    fn plan() -> ScanPlan {
        ScanPlan {
            target: "a@b.com".to_string(),
            scan_type: ScanType::EmailLookup,
            modules: BTreeSet::new(),
            options: HashMap::new(),
            timeout_secs: 300,
            retries: 3,
        }
    }

    #[test]
    fn test_progress_is_monotonic_while_running() {
        let mut scan = Scan::new("s-1".to_string(), plan());
        scan.mark_running();
        scan.record_progress(40);
        scan.record_progress(10);
        assert_eq!(scan.progress, 40);
        scan.record_progress(90);
        assert_eq!(scan.progress, 90);
    }

    #[test]
    fn test_progress_ignored_outside_running() {
        let mut scan = Scan::new("s-1".to_string(), plan());
        scan.record_progress(50);
        assert_eq!(scan.progress, 0);
        scan.mark_running();
        scan.mark_completed(serde_json::json!({}));
        scan.record_progress(10);
        assert_eq!(scan.progress, 100);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!ScanStatus::Created.is_terminal());
        assert!(!ScanStatus::Running.is_terminal());
        assert!(ScanStatus::Completed.is_terminal());
        assert!(ScanStatus::Failed.is_terminal());
        assert!(ScanStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_completed_scan_carries_results_only() {
        let mut scan = Scan::new("s-1".to_string(), plan());
        scan.mark_running();
        scan.mark_completed(serde_json::json!({"findings": []}));
        assert!(scan.results.is_some());
        assert!(scan.error.is_none());
        assert!(scan.completed_at.is_some());
    }
}
