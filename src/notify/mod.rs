pub mod sink;

pub use sink::{LogSink, NotificationSink};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_DURATION: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transient user-facing message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub id: u64,
    pub message: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
    pub duration_ms: u64,
}

struct ActiveNotification {
    event: NotificationEvent,
    // Claimed by a dismissal whose exit transition is underway.
    exiting: bool,
}

struct Inner {
    sink: Arc<dyn NotificationSink>,
    default_duration: Duration,
    // Insertion-ordered: most recent appended last.
    active: Mutex<Vec<ActiveNotification>>,
    next_id: AtomicU64,
}

impl Inner {
    /// Run the sink's exit transition while the notification is still
    /// visible, then remove it. Idempotent: the first caller claims the
    /// entry under the lock, so the expiry timer and a manual dismissal
    /// cannot double-fire.
    fn dismiss(&self, id: u64) -> bool {
        let event = {
            let mut active = self.active.lock().expect("notification list poisoned");
            match active.iter_mut().find(|n| n.event.id == id && !n.exiting) {
                Some(entry) => {
                    entry.exiting = true;
                    entry.event.clone()
                }
                None => return false,
            }
        };

        self.sink.exit(&event);

        let mut active = self.active.lock().expect("notification list poisoned");
        active.retain(|n| n.event.id != id);
        debug!(id, "notification dismissed");
        true
    }
}

/// Queues and renders transient messages with independent auto-dismiss
/// timers. Dismissing one notification never touches another's timer.
pub struct NotificationSystem {
    inner: Arc<Inner>,
}

impl NotificationSystem {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_default_duration(sink, DEFAULT_DURATION)
    }

    pub fn with_default_duration(sink: Arc<dyn NotificationSink>, duration: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                sink,
                default_duration: duration,
                active: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Show a notification with the configured default duration (4 seconds
    /// unless overridden).
    pub fn show(&self, message: &str, severity: Severity) -> NotificationHandle {
        self.show_for(message, severity, self.inner.default_duration)
    }

    pub fn show_for(
        &self,
        message: &str,
        severity: Severity,
        duration: Duration,
    ) -> NotificationHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let event = NotificationEvent {
            id,
            message: message.to_string(),
            severity,
            created_at: Utc::now(),
            duration_ms: duration.as_millis() as u64,
        };

        {
            let mut active = self.inner.active.lock().expect("notification list poisoned");
            active.push(ActiveNotification {
                event: event.clone(),
                exiting: false,
            });
        }
        self.inner.sink.render(&event);

        // One timer per notification; expiry is fire-and-forget.
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Some(inner) = weak.upgrade() {
                inner.dismiss(id);
            }
        });

        NotificationHandle {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Dismiss every active notification.
    pub fn clear(&self) {
        let ids: Vec<u64> = {
            let active = self.inner.active.lock().expect("notification list poisoned");
            active.iter().map(|n| n.event.id).collect()
        };
        for id in ids {
            self.inner.dismiss(id);
        }
    }

    /// Snapshot of currently visible notifications, oldest first. A
    /// notification mid-exit is still visible.
    pub fn active(&self) -> Vec<NotificationEvent> {
        self.inner
            .active
            .lock()
            .expect("notification list poisoned")
            .iter()
            .map(|n| n.event.clone())
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.inner
            .active
            .lock()
            .expect("notification list poisoned")
            .len()
    }
}

/// Handle for manual dismissal ahead of the expiry timer.
pub struct NotificationHandle {
    id: u64,
    inner: Weak<Inner>,
}

impl NotificationHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Dismiss now. Returns false if the notification already expired.
    pub fn dismiss(&self) -> bool {
        match self.inner.upgrade() {
            Some(inner) => inner.dismiss(self.id),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sink::RecordingSink;

    fn system() -> (NotificationSystem, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (NotificationSystem::new(sink.clone()), sink)
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_dismiss_after_duration() {
        let (system, sink) = system();
        system.show_for("scan started", Severity::Info, Duration::from_secs(2));
        assert_eq!(system.active_count(), 1);

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(system.active_count(), 0);
        assert_eq!(sink.rendered(), vec!["scan started"]);
        assert_eq!(sink.exited(), vec!["scan started"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismissing_one_does_not_reset_other_timers() {
        let (system, _sink) = system();
        let a = system.show_for("a", Severity::Info, Duration::from_secs(1));
        system.show_for("b", Severity::Info, Duration::from_secs(2));

        assert!(a.dismiss());
        assert_eq!(system.active_count(), 1);

        // B's timer keeps its original deadline.
        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert_eq!(system.active_count(), 1);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(system.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_dismiss_is_idempotent_with_timer() {
        let (system, sink) = system();
        let handle = system.show_for("once", Severity::Success, Duration::from_secs(1));
        assert!(handle.dismiss());
        assert!(!handle.dismiss());

        tokio::time::sleep(Duration::from_secs(2)).await;
        // The timer found nothing to remove; exit ran exactly once.
        assert_eq!(sink.exited(), vec!["once"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_notifications_stack_in_insertion_order() {
        let (system, _sink) = system();
        system.show("first", Severity::Info);
        system.show("second", Severity::Warning);
        system.show("third", Severity::Error);
        let messages: Vec<String> = system.active().iter().map(|n| n.message.clone()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
    }

    /// Sink that checks, from inside the exit transition, whether the
    /// notification it is exiting is still in the visible set.
    #[derive(Default)]
    struct ExitVisibilitySink {
        system: Mutex<Option<Arc<NotificationSystem>>>,
        visible_at_exit: Mutex<Vec<bool>>,
    }

    impl NotificationSink for ExitVisibilitySink {
        fn render(&self, _event: &NotificationEvent) {}

        fn exit(&self, event: &NotificationEvent) {
            if let Some(system) = self.system.lock().unwrap().as_ref() {
                let visible = system.active().iter().any(|n| n.id == event.id);
                self.visible_at_exit.lock().unwrap().push(visible);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_transition_runs_before_removal() {
        let sink = Arc::new(ExitVisibilitySink::default());
        let system = Arc::new(NotificationSystem::new(sink.clone()));
        *sink.system.lock().unwrap() = Some(system.clone());

        let handle = system.show("closing soon", Severity::Info);
        assert!(handle.dismiss());

        // The exit callback observed the notification still on screen,
        // and removal happened right after it returned.
        assert_eq!(*sink.visible_at_exit.lock().unwrap(), vec![true]);
        assert_eq!(system.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_dismisses_everything() {
        let (system, sink) = system();
        system.show("a", Severity::Info);
        system.show("b", Severity::Info);
        system.clear();
        assert_eq!(system.active_count(), 0);
        assert_eq!(sink.exited().len(), 2);
    }
}
