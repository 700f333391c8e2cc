use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::{RemoteStatus, StatusSource};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

/// Observable poller lifecycle. The three stopped states are absorbing for a
/// given cycle; `start` begins a fresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Polling,
    StoppedTerminal,
    StoppedError,
    StoppedManual,
}

/// Terminal outcome of one polling cycle, delivered exactly once.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// Backend reported `completed`.
    Completed(Value),
    /// Backend reported `failed` with its message.
    Failed(String),
    /// A fetch failed in transit; polling halts rather than spinning
    /// against a dead scan.
    Transport(String),
}

#[async_trait]
pub trait PollObserver: Send + Sync {
    async fn on_progress(&self, progress: u8, message: Option<&str>);
    async fn on_terminal(&self, outcome: PollOutcome);
}

struct Control {
    token: CancellationToken,
    state: PollerState,
}

/// Polls a scan's status until a terminal state.
///
/// One fetch in flight at a time: the tick loop awaits the fetch before the
/// next tick is taken, and missed ticks are skipped. Each `start` bumps a
/// generation counter; responses belonging to a superseded cycle are
/// discarded, so overlapping start/stop calls can never double-deliver a
/// terminal callback.
pub struct ScanStatusPoller {
    source: Arc<dyn StatusSource>,
    interval: Duration,
    generation: Arc<AtomicU64>,
    control: Arc<Mutex<Control>>,
}

impl ScanStatusPoller {
    pub fn new(source: Arc<dyn StatusSource>) -> Self {
        Self {
            source,
            interval: DEFAULT_INTERVAL,
            generation: Arc::new(AtomicU64::new(0)),
            control: Arc::new(Mutex::new(Control {
                token: CancellationToken::new(),
                state: PollerState::Idle,
            })),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn state(&self) -> PollerState {
        self.control.lock().expect("poller control poisoned").state
    }

    /// Begin polling `scan_id`. Any previous cycle is superseded: its task is
    /// cancelled and a late-arriving response from it is discarded.
    pub fn start(&self, scan_id: String, observer: Arc<dyn PollObserver>) {
        let token = {
            let mut control = self.control.lock().expect("poller control poisoned");
            control.token.cancel();
            control.token = CancellationToken::new();
            control.state = PollerState::Polling;
            control.token.clone()
        };
        let my_gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let source = self.source.clone();
        let generation = self.generation.clone();
        let control = self.control.clone();
        let interval = self.interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = ticker.tick() => {}
                }

                let result = tokio::select! {
                    _ = token.cancelled() => return,
                    res = source.fetch_status(&scan_id) => res,
                };

                // Stale-cycle guard: a newer start or a stop superseded us
                // while the fetch was in flight.
                if generation.load(Ordering::SeqCst) != my_gen {
                    debug!(scan_id = %scan_id, "discarding response from superseded poll cycle");
                    return;
                }

                match result {
                    Err(e) => {
                        warn!(scan_id = %scan_id, error = %e, "status fetch failed, polling stopped");
                        Self::settle(&control, &generation, my_gen, PollerState::StoppedError);
                        observer.on_terminal(PollOutcome::Transport(e.to_string())).await;
                        return;
                    }
                    Ok(snapshot) => match snapshot.status {
                        RemoteStatus::Completed => {
                            Self::settle(&control, &generation, my_gen, PollerState::StoppedTerminal);
                            let results = snapshot.results.unwrap_or(Value::Null);
                            observer.on_terminal(PollOutcome::Completed(results)).await;
                            return;
                        }
                        RemoteStatus::Failed => {
                            Self::settle(&control, &generation, my_gen, PollerState::StoppedTerminal);
                            let message = snapshot
                                .error
                                .unwrap_or_else(|| "scan failed".to_string());
                            observer.on_terminal(PollOutcome::Failed(message)).await;
                            return;
                        }
                        RemoteStatus::Queued | RemoteStatus::Running => {
                            observer
                                .on_progress(snapshot.progress, snapshot.status_message.as_deref())
                                .await;
                        }
                    },
                }
            }
        });
    }

    /// Stop polling. Idempotent; safe before any start and after any stop.
    pub fn stop(&self) {
        let mut control = self.control.lock().expect("poller control poisoned");
        if control.state == PollerState::Polling {
            control.state = PollerState::StoppedManual;
        }
        control.token.cancel();
        // Invalidate any in-flight response from this cycle.
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn settle(
        control: &Arc<Mutex<Control>>,
        generation: &Arc<AtomicU64>,
        my_gen: u64,
        state: PollerState,
    ) {
        let mut control = control.lock().expect("poller control poisoned");
        if generation.load(Ordering::SeqCst) == my_gen {
            control.state = state;
        }
    }
}
