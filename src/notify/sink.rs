use super::{NotificationEvent, Severity};
use tracing::{error, info, warn};

/// Render target for notifications. The UI layer supplies its own; the
/// default routes through the log stream.
pub trait NotificationSink: Send + Sync {
    /// A notification became visible.
    fn render(&self, event: &NotificationEvent);

    /// Exit transition, invoked before the notification leaves the visible
    /// set (manual or timed dismissal).
    fn exit(&self, event: &NotificationEvent);
}

/// Default sink: notifications land in the tracing stream.
pub struct LogSink;

impl NotificationSink for LogSink {
    fn render(&self, event: &NotificationEvent) {
        match event.severity {
            Severity::Error => error!(id = event.id, "{}", event.message),
            Severity::Warning => warn!(id = event.id, "{}", event.message),
            Severity::Info | Severity::Success => info!(id = event.id, "{}", event.message),
        }
    }

    fn exit(&self, _event: &NotificationEvent) {}
}

/// Test sink recording every render/exit in order.
#[derive(Default)]
pub struct RecordingSink {
    rendered: std::sync::Mutex<Vec<String>>,
    exited: std::sync::Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn rendered(&self) -> Vec<String> {
        self.rendered.lock().unwrap().clone()
    }

    pub fn exited(&self) -> Vec<String> {
        self.exited.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn render(&self, event: &NotificationEvent) {
        self.rendered.lock().unwrap().push(event.message.clone());
    }

    fn exit(&self, event: &NotificationEvent) {
        self.exited.lock().unwrap().push(event.message.clone());
    }
}
