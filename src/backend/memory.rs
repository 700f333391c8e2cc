use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{ScanBackend, StatusSnapshot, StatusSource};
use crate::errors::SightlineError;
use crate::models::{ScanPlan, SearchResult};

/// In-memory scan executor for tests and offline development.
///
/// Each submission consumes the next queued script (a sequence of status
/// snapshots); `fetch_status` replays the script one snapshot per call and
/// keeps returning the final snapshot once exhausted. No mock data lives in
/// the orchestration logic itself.
pub struct MemoryBackend {
    scripts: Mutex<VecDeque<Vec<StatusSnapshot>>>,
    default_script: Mutex<Vec<StatusSnapshot>>,
    states: DashMap<String, VecDeque<StatusSnapshot>>,
    submissions: Mutex<Vec<ScanPlan>>,
    fail_submissions: AtomicBool,
    fail_fetches: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            default_script: Mutex::new(vec![
                StatusSnapshot::running(50, "collecting"),
                StatusSnapshot::completed(json!({ "findings": [] })),
            ]),
            states: DashMap::new(),
            submissions: Mutex::new(Vec::new()),
            fail_submissions: AtomicBool::new(false),
            fail_fetches: AtomicBool::new(false),
        }
    }

    /// Queue a script for the next submission. Scripts are consumed in
    /// submission order; later submissions fall back to the default script.
    pub fn queue_script(&self, script: Vec<StatusSnapshot>) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn set_default_script(&self, script: Vec<StatusSnapshot>) {
        *self.default_script.lock().unwrap() = script;
    }

    /// Make every subsequent submission fail at the transport layer.
    pub fn fail_submissions(&self, fail: bool) {
        self.fail_submissions.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent status fetch fail at the transport layer.
    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    pub fn submissions(&self) -> Vec<ScanPlan> {
        self.submissions.lock().unwrap().clone()
    }

    /// A script stepping progress 0, step, 2*step, ... then completing.
    pub fn progress_script(step: u8, results: Value) -> Vec<StatusSnapshot> {
        let mut script = Vec::new();
        let mut progress = 0u16;
        while progress < 100 {
            script.push(StatusSnapshot::running(progress as u8, "scanning"));
            progress += step.max(1) as u16;
        }
        script.push(StatusSnapshot::completed(results));
        script
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatusSource for MemoryBackend {
    async fn fetch_status(&self, scan_id: &str) -> Result<StatusSnapshot, SightlineError> {
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(SightlineError::Transport("status endpoint unreachable".into()));
        }
        let mut entry = self
            .states
            .get_mut(scan_id)
            .ok_or_else(|| SightlineError::NotFound(scan_id.to_string()))?;
        // Replay one snapshot per call; hold the last one forever.
        if entry.len() > 1 {
            Ok(entry.pop_front().expect("non-empty script"))
        } else {
            entry
                .front()
                .cloned()
                .ok_or_else(|| SightlineError::Backend("empty status script".into()))
        }
    }
}

#[async_trait]
impl ScanBackend for MemoryBackend {
    async fn submit_scan(&self, plan: &ScanPlan) -> Result<String, SightlineError> {
        if self.fail_submissions.load(Ordering::SeqCst) {
            return Err(SightlineError::Transport("scan endpoint unreachable".into()));
        }
        self.submissions.lock().unwrap().push(plan.clone());

        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_script.lock().unwrap().clone());

        let scan_id = uuid::Uuid::new_v4().to_string();
        self.states.insert(scan_id.clone(), script.into());
        Ok(scan_id)
    }

    async fn dashboard_metrics(&self) -> Result<Value, SightlineError> {
        Ok(json!({
            "active_scans": self.states.len(),
            "total_submissions": self.submission_count(),
        }))
    }

    async fn performance_metrics(&self) -> Result<Value, SightlineError> {
        Ok(json!({ "latency_ms": 0, "uptime_secs": 0 }))
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SightlineError> {
        let plans = self.submissions.lock().unwrap();
        let results = plans
            .iter()
            .filter(|p| p.target.contains(query))
            .map(|p| SearchResult {
                title: p.target.clone(),
                description: Some(format!("{} scan", p.scan_type)),
                url: None,
                kind: Some("scan".to_string()),
                category: Some(p.scan_type.as_str().to_string()),
                icon: None,
                date: None,
            })
            .collect();
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScanType;
    use std::collections::{BTreeSet, HashMap};

    fn plan() -> ScanPlan {
        ScanPlan {
            target: "example.com".to_string(),
            scan_type: ScanType::DomainScan,
            modules: BTreeSet::new(),
            options: HashMap::new(),
            timeout_secs: 300,
            retries: 0,
        }
    }

    #[tokio::test]
    async fn test_script_replays_then_holds_last() {
        let backend = MemoryBackend::new();
        backend.queue_script(vec![
            StatusSnapshot::running(10, "a"),
            StatusSnapshot::completed(json!({})),
        ]);
        let id = backend.submit_scan(&plan()).await.unwrap();

        assert_eq!(backend.fetch_status(&id).await.unwrap().progress, 10);
        assert!(backend.fetch_status(&id).await.unwrap().status.is_terminal());
        // Exhausted scripts keep returning the terminal snapshot.
        assert!(backend.fetch_status(&id).await.unwrap().status.is_terminal());
    }

    #[tokio::test]
    async fn test_unknown_scan_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend.fetch_status("nope").await.unwrap_err();
        assert!(matches!(err, SightlineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_failed_submission_records_nothing() {
        let backend = MemoryBackend::new();
        backend.fail_submissions(true);
        assert!(backend.submit_scan(&plan()).await.is_err());
        assert_eq!(backend.submission_count(), 0);
    }

    #[test]
    fn test_progress_script_shape() {
        let script = MemoryBackend::progress_script(25, json!({}));
        assert_eq!(script.len(), 5);
        assert_eq!(script[0].progress, 0);
        assert!(script.last().unwrap().status.is_terminal());
    }
}
