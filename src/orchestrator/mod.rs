pub mod validate;

pub use validate::validate_request;

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::backend::{ScanBackend, StatusSnapshot, StatusSource};
use crate::errors::SightlineError;
use crate::events::{topics, EventBus};
use crate::models::{Scan, ScanHistoryEntry, ScanPlan, ScanRequest};
use crate::notify::{NotificationSystem, Severity};
use crate::poller::{PollObserver, PollOutcome, ScanStatusPoller};
use crate::reporting::format_scan_report;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Admission-control gate: submissions beyond this many non-terminal
    /// scans are rejected, not queued.
    pub max_concurrent_scans: usize,
    pub poll_interval: Duration,
    /// Flat delay before an automatic re-submission. Constant per attempt.
    pub retry_backoff: Duration,
    pub history_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_scans: 10,
            poll_interval: Duration::from_secs(2),
            retry_backoff: Duration::from_secs(5),
            history_limit: 50,
        }
    }
}

struct ActiveScan {
    scan: Scan,
    poller: Arc<ScanStatusPoller>,
    /// Cancelling the lineage suppresses the bound poller's successors and
    /// any retry scheduled for this scan's chain of attempts.
    lineage: CancellationToken,
}

/// Narrows the full backend to the poller's status seam.
struct SourceAdapter(Arc<dyn ScanBackend>);

#[async_trait]
impl StatusSource for SourceAdapter {
    async fn fetch_status(&self, scan_id: &str) -> Result<StatusSnapshot, SightlineError> {
        self.0.fetch_status(scan_id).await
    }
}

/// Routes poller callbacks for one scan back into the orchestrator.
struct PollerBridge {
    inner: Weak<Inner>,
    scan_id: String,
}

#[async_trait]
impl PollObserver for PollerBridge {
    async fn on_progress(&self, progress: u8, message: Option<&str>) {
        if let Some(inner) = self.inner.upgrade() {
            inner.record_progress(&self.scan_id, progress, message);
        }
    }

    async fn on_terminal(&self, outcome: PollOutcome) {
        if let Some(inner) = self.inner.upgrade() {
            Inner::handle_terminal(inner, self.scan_id.clone(), outcome).await;
        }
    }
}

struct Inner {
    config: OrchestratorConfig,
    backend: Arc<dyn ScanBackend>,
    bus: Arc<EventBus>,
    notifier: Arc<NotificationSystem>,
    // Exactly the non-terminal scans; single-writer (orchestrator only),
    // shared read-only through accessors.
    active: DashMap<String, ActiveScan>,
    // Failed scan id -> lineage token of its scheduled re-submission.
    pending_retries: DashMap<String, CancellationToken>,
    // Submissions past the capacity check but not yet in `active`. The
    // admission gate counts these so concurrent submits cannot overshoot
    // while awaiting the backend.
    in_flight: AtomicUsize,
    history: Mutex<VecDeque<ScanHistoryEntry>>,
}

impl Inner {
    fn record_progress(&self, scan_id: &str, progress: u8, message: Option<&str>) {
        if let Some(mut entry) = self.active.get_mut(scan_id) {
            entry.scan.record_progress(progress);
            let clamped = entry.scan.progress;
            drop(entry);
            self.bus.emit(
                topics::SCAN_PROGRESS,
                json!({
                    "scan_id": scan_id,
                    "progress": clamped,
                    "status_message": message,
                }),
            );
        }
    }

    async fn handle_terminal(inner: Arc<Inner>, scan_id: String, outcome: PollOutcome) {
        // A cancelled scan has already left the active set; its late
        // terminal is dropped here.
        let Some((_, mut entry)) = inner.active.remove(&scan_id) else {
            return;
        };

        match outcome {
            PollOutcome::Completed(results) => {
                entry.scan.mark_completed(results.clone());
                inner.append_history(&entry.scan, results);
                info!(scan_id = %scan_id, target = %entry.scan.plan.target, "scan completed");
                inner.bus.emit(
                    topics::SCAN_COMPLETED,
                    json!({
                        "scan_id": scan_id,
                        "target": entry.scan.plan.target,
                        "results": entry.scan.results.clone(),
                    }),
                );
                inner.notifier.show(
                    &format!("Scan of {} completed", entry.scan.plan.target),
                    Severity::Success,
                );
            }
            PollOutcome::Failed(message) | PollOutcome::Transport(message) => {
                entry.scan.mark_failed(message.clone());
                warn!(scan_id = %scan_id, error = %message, "scan failed");
                inner.bus.emit(
                    topics::SCAN_ERROR,
                    json!({
                        "scan_id": scan_id,
                        "target": entry.scan.plan.target,
                        "error": message,
                    }),
                );

                let retries_left = entry.scan.plan.retries;
                if retries_left > 0 {
                    inner.notifier.show(
                        &format!(
                            "Scan of {} failed, retrying ({} attempt{} left)",
                            entry.scan.plan.target,
                            retries_left,
                            if retries_left == 1 { "" } else { "s" },
                        ),
                        Severity::Warning,
                    );
                    let mut retry_plan = entry.scan.plan.clone();
                    retry_plan.retries = retries_left - 1;
                    Inner::schedule_retry(inner.clone(), scan_id, retry_plan, entry.lineage);
                } else {
                    // Retries exhausted: terminal for the whole lineage.
                    inner.notifier.show(
                        &format!("Scan of {} failed: {}", entry.scan.plan.target, message),
                        Severity::Error,
                    );
                }
            }
        }
    }

    fn schedule_retry(
        inner: Arc<Inner>,
        failed_id: String,
        plan: ScanPlan,
        lineage: CancellationToken,
    ) {
        inner
            .pending_retries
            .insert(failed_id.clone(), lineage.clone());
        inner.bus.emit(
            topics::SCAN_RETRY,
            json!({
                "scan_id": failed_id,
                "target": plan.target,
                "retries_left": plan.retries,
                "backoff_ms": inner.config.retry_backoff.as_millis() as u64,
            }),
        );

        let backoff = inner.config.retry_backoff;
        tokio::spawn(async move {
            tokio::select! {
                _ = lineage.cancelled() => {
                    inner.pending_retries.remove(&failed_id);
                    return;
                }
                _ = tokio::time::sleep(backoff) => {}
            }
            inner.pending_retries.remove(&failed_id);
            // The lineage may have been cancelled in the same instant the
            // backoff elapsed; a cancelled scan must never resurrect itself.
            if lineage.is_cancelled() {
                return;
            }

            info!(target = %plan.target, retries_left = plan.retries, "resubmitting failed scan");
            if let Err(e) = Inner::submit_plan(inner.clone(), plan.clone(), lineage).await {
                warn!(target = %plan.target, error = %e, "retry submission rejected");
                inner.bus.emit(
                    topics::SCAN_ERROR,
                    json!({ "target": plan.target, "error": e.to_string() }),
                );
                inner.notifier.show(
                    &format!("Retry for {} rejected: {}", plan.target, e),
                    Severity::Error,
                );
            }
        });
    }

    async fn submit_plan(
        inner: Arc<Inner>,
        plan: ScanPlan,
        lineage: CancellationToken,
    ) -> Result<Scan, SightlineError> {
        // Reserve a slot before the submission await so two racing submits
        // cannot both pass the gate.
        let reserved = inner.in_flight.fetch_add(1, Ordering::SeqCst);
        let active = inner.active.len();
        if active + reserved >= inner.config.max_concurrent_scans {
            inner.in_flight.fetch_sub(1, Ordering::SeqCst);
            return Err(SightlineError::Capacity {
                active,
                max: inner.config.max_concurrent_scans,
            });
        }

        let scan_id = match inner.backend.submit_scan(&plan).await {
            Ok(id) => id,
            Err(e) => {
                inner.in_flight.fetch_sub(1, Ordering::SeqCst);
                // Submission transport failures reach the caller and both
                // async channels.
                inner.bus.emit(
                    topics::SCAN_ERROR,
                    json!({ "target": plan.target, "error": e.to_string() }),
                );
                inner.notifier.show(
                    &format!("Could not submit scan for {}: {}", plan.target, e),
                    Severity::Error,
                );
                return Err(e);
            }
        };

        let mut scan = Scan::new(scan_id.clone(), plan);
        scan.mark_running();

        let poller = Arc::new(
            ScanStatusPoller::new(Arc::new(SourceAdapter(inner.backend.clone())))
                .with_interval(inner.config.poll_interval),
        );

        // Register before polling starts so an immediate terminal snapshot
        // finds its entry.
        inner.active.insert(
            scan_id.clone(),
            ActiveScan {
                scan: scan.clone(),
                poller: poller.clone(),
                lineage,
            },
        );
        // The entry now counts through `active`; release the reservation.
        inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        poller.start(
            scan_id.clone(),
            Arc::new(PollerBridge {
                inner: Arc::downgrade(&inner),
                scan_id: scan_id.clone(),
            }),
        );

        info!(scan_id = %scan_id, target = %scan.plan.target, scan_type = %scan.plan.scan_type, "scan started");
        inner.bus.emit(
            topics::SCAN_STARTED,
            json!({
                "scan_id": scan_id,
                "target": scan.plan.target,
                "scan_type": scan.plan.scan_type.as_str(),
            }),
        );
        inner.notifier.show(
            &format!("Scan started for {}", scan.plan.target),
            Severity::Info,
        );

        Ok(scan)
    }

    fn append_history(&self, scan: &Scan, results: serde_json::Value) {
        let entry = ScanHistoryEntry {
            id: scan.id.clone(),
            timestamp: scan.completed_at.unwrap_or_else(chrono::Utc::now),
            plan: scan.plan.clone(),
            report: format_scan_report(&scan.plan, &results),
            results,
        };
        let mut history = self.history.lock().expect("history poisoned");
        while history.len() >= self.config.history_limit {
            history.pop_front();
        }
        history.push_back(entry);
    }
}

/// Owns the scan lifecycle: validation, admission control, poller binding,
/// event/notification fan-out, bounded automatic retries, cancellation.
pub struct ScanOrchestrator {
    inner: Arc<Inner>,
}

impl ScanOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        backend: Arc<dyn ScanBackend>,
        bus: Arc<EventBus>,
        notifier: Arc<NotificationSystem>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                backend,
                bus,
                notifier,
                active: DashMap::new(),
                pending_retries: DashMap::new(),
                in_flight: AtomicUsize::new(0),
                history: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// Submit a scan request. Returns the running scan, or rejects with
    /// `Validation` (every offending field listed) or `Capacity`. Never
    /// silently drops a request.
    pub async fn submit(&self, request: &ScanRequest) -> Result<Scan, SightlineError> {
        let plan = validate_request(request)?;
        Inner::submit_plan(self.inner.clone(), plan, CancellationToken::new()).await
    }

    /// Cancel a running scan, or a pending retry in its lineage.
    pub fn cancel_scan(&self, scan_id: &str) -> Result<(), SightlineError> {
        if let Some((_, mut entry)) = self.inner.active.remove(scan_id) {
            entry.poller.stop();
            entry.lineage.cancel();
            entry.scan.mark_cancelled();
            info!(scan_id = %scan_id, "scan cancelled");
            self.inner.bus.emit(
                topics::SCAN_CANCELLED,
                json!({ "scan_id": scan_id, "target": entry.scan.plan.target }),
            );
            self.inner.notifier.show(
                &format!("Scan of {} cancelled", entry.scan.plan.target),
                Severity::Warning,
            );
            return Ok(());
        }
        if let Some((_, token)) = self.inner.pending_retries.remove(scan_id) {
            token.cancel();
            info!(scan_id = %scan_id, "pending retry cancelled");
            self.inner
                .bus
                .emit(topics::SCAN_CANCELLED, json!({ "scan_id": scan_id }));
            self.inner
                .notifier
                .show("Scheduled retry cancelled", Severity::Warning);
            return Ok(());
        }
        Err(SightlineError::NotFound(scan_id.to_string()))
    }

    /// Stop every active scan and suppress every pending retry.
    pub fn shutdown(&self) {
        let active_ids: Vec<String> =
            self.inner.active.iter().map(|e| e.key().clone()).collect();
        for id in active_ids {
            let _ = self.cancel_scan(&id);
        }
        let retry_ids: Vec<String> = self
            .inner
            .pending_retries
            .iter()
            .map(|e| e.key().clone())
            .collect();
        for id in retry_ids {
            let _ = self.cancel_scan(&id);
        }
    }

    pub fn get_scan(&self, scan_id: &str) -> Option<Scan> {
        self.inner.active.get(scan_id).map(|e| e.scan.clone())
    }

    pub fn active_scans(&self) -> Vec<Scan> {
        self.inner.active.iter().map(|e| e.scan.clone()).collect()
    }

    pub fn active_count(&self) -> usize {
        self.inner.active.len()
    }

    pub fn pending_retry_count(&self) -> usize {
        self.inner.pending_retries.len()
    }

    pub fn history(&self) -> Vec<ScanHistoryEntry> {
        self.inner
            .history
            .lock()
            .expect("history poisoned")
            .iter()
            .cloned()
            .collect()
    }
}
