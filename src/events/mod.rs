use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

/// Well-known bus topics published by the pipeline.
pub mod topics {
    pub const SCAN_STARTED: &str = "scan:started";
    pub const SCAN_PROGRESS: &str = "scan:progress";
    pub const SCAN_COMPLETED: &str = "scan:completed";
    pub const SCAN_ERROR: &str = "scan:error";
    pub const SCAN_CANCELLED: &str = "scan:cancelled";
    pub const SCAN_RETRY: &str = "scan:retry";
    pub const NOTIFICATION_SHOWN: &str = "notification:shown";
}

/// Token returned by [`EventBus::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Synchronous publish/subscribe registry.
///
/// Handlers for a topic run in registration order over a snapshot of the
/// list, so a handler that subscribes or unsubscribes during dispatch cannot
/// skip or double-invoke another entry. A panicking handler is caught, logged
/// against the topic, and never stops later handlers or reaches the emitter.
/// Registering the same closure twice yields two invocations.
pub struct EventBus {
    registry: Mutex<HashMap<String, Vec<(HandlerId, Handler)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn on<F>(&self, topic: &str, handler: F) -> HandlerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut registry = self.registry.lock().expect("event registry poisoned");
        registry
            .entry(topic.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove the first registration matching `id`. Returns whether anything
    /// was removed; removing an unknown id is a no-op.
    pub fn off(&self, topic: &str, id: HandlerId) -> bool {
        let mut registry = self.registry.lock().expect("event registry poisoned");
        if let Some(handlers) = registry.get_mut(topic) {
            if let Some(pos) = handlers.iter().position(|(hid, _)| *hid == id) {
                handlers.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn emit(&self, topic: &str, payload: Value) {
        let snapshot: Vec<Handler> = {
            let registry = self.registry.lock().expect("event registry poisoned");
            match registry.get(topic) {
                Some(handlers) => handlers.iter().map(|(_, h)| h.clone()).collect(),
                None => return,
            }
        };

        debug!(topic, handlers = snapshot.len(), "dispatching event");
        for handler in snapshot {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(&payload))) {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                error!(topic, detail = %detail, "event handler panicked");
            }
        }
    }

    pub fn handler_count(&self, topic: &str) -> usize {
        let registry = self.registry.lock().expect("event registry poisoned");
        registry.get(topic).map_or(0, |h| h.len())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for label in ["first", "second", "third"] {
            let seen = seen.clone();
            bus.on("scan:started", move |_| {
                seen.lock().unwrap().push(label);
            });
        }
        bus.emit("scan:started", json!({}));
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_panicking_handler_does_not_stop_later_handlers() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.on("scan:error", |_| panic!("handler exploded"));
        {
            let seen = seen.clone();
            bus.on("scan:error", move |_| seen.lock().unwrap().push("survivor"));
        }
        bus.emit("scan:error", json!({"scan_id": "s-1"}));
        assert_eq!(*seen.lock().unwrap(), vec!["survivor"]);
    }

    #[test]
    fn test_duplicate_registration_invokes_twice() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0u32));
        for _ in 0..2 {
            let count = count.clone();
            bus.on("tick", move |_| *count.lock().unwrap() += 1);
        }
        bus.emit("tick", json!(null));
        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[test]
    fn test_off_removes_only_matching_registration() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let id = {
            let seen = seen.clone();
            bus.on("tick", move |_| seen.lock().unwrap().push("a"))
        };
        {
            let seen = seen.clone();
            bus.on("tick", move |_| seen.lock().unwrap().push("b"));
        }
        assert!(bus.off("tick", id));
        assert!(!bus.off("tick", id));
        bus.emit("tick", json!(null));
        assert_eq!(*seen.lock().unwrap(), vec!["b"]);
    }

    #[test]
    fn test_handler_mutating_registry_mid_dispatch_is_safe() {
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let bus2 = bus.clone();
            let seen = seen.clone();
            bus.on("tick", move |_| {
                seen.lock().unwrap().push("registrar");
                // New registrations take effect on the next emit only.
                let seen = seen.clone();
                bus2.on("tick", move |_| seen.lock().unwrap().push("late"));
            });
        }
        bus.emit("tick", json!(null));
        assert_eq!(*seen.lock().unwrap(), vec!["registrar"]);
        bus.emit("tick", json!(null));
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["registrar", "registrar", "late"]
        );
    }

    #[test]
    fn test_emit_with_no_handlers_is_noop() {
        let bus = EventBus::new();
        bus.emit("nobody:listening", json!({}));
        assert_eq!(bus.handler_count("nobody:listening"), 0);
    }
}
