pub mod backend;
pub mod config;
pub mod dashboard;
pub mod errors;
pub mod events;
pub mod models;
pub mod notify;
pub mod orchestrator;
pub mod platform;
pub mod poller;
pub mod reporting;

pub use backend::{HttpBackend, MemoryBackend, ScanBackend, StatusSnapshot, StatusSource};
pub use config::PlatformConfig;
pub use errors::{FieldViolation, SightlineError, ValidationError};
pub use events::{topics, EventBus, HandlerId};
pub use models::{
    sanitize_target, Scan, ScanHistoryEntry, ScanModule, ScanPlan, ScanRequest, ScanStatus,
    ScanType, SearchResult,
};
pub use notify::{NotificationSystem, Severity};
pub use orchestrator::{OrchestratorConfig, ScanOrchestrator};
pub use platform::Platform;
pub use poller::{PollObserver, PollOutcome, PollerState, ScanStatusPoller};

use tracing_subscriber::EnvFilter;

/// Initialize tracing for embedding shells. Verbosity 0 is info, 1 debug,
/// anything higher trace; `RUST_LOG` wins when set.
pub fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
