use std::sync::Arc;
use tracing::info;

use crate::backend::{HttpBackend, ScanBackend};
use crate::config::PlatformConfig;
use crate::dashboard::DashboardService;
use crate::errors::SightlineError;
use crate::events::EventBus;
use crate::notify::{LogSink, NotificationSink, NotificationSystem};
use crate::orchestrator::ScanOrchestrator;

/// The constructed application context: one bus, one notifier, one
/// orchestrator, wired once at startup and torn down explicitly. Components
/// receive what they need from here rather than reaching for globals.
pub struct Platform {
    bus: Arc<EventBus>,
    notifier: Arc<NotificationSystem>,
    orchestrator: ScanOrchestrator,
    dashboard: DashboardService,
}

impl Platform {
    /// Single initialization entry point against the real backend.
    pub fn initialize(config: &PlatformConfig) -> Result<Self, SightlineError> {
        let backend = Arc::new(HttpBackend::new(
            &config.base_url(),
            config.request_timeout(),
        )?);
        Ok(Self::with_backend(config, backend, Arc::new(LogSink)))
    }

    /// Wire the platform over an injected backend and sink. This is the
    /// seam tests and offline shells use.
    pub fn with_backend(
        config: &PlatformConfig,
        backend: Arc<dyn ScanBackend>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let bus = Arc::new(EventBus::new());
        let notifier = Arc::new(NotificationSystem::with_default_duration(
            sink,
            config.notification_duration(),
        ));
        let orchestrator = ScanOrchestrator::new(
            config.orchestrator(),
            backend.clone(),
            bus.clone(),
            notifier.clone(),
        );
        let dashboard = DashboardService::new(backend);

        info!(
            base_url = %config.base_url(),
            build = env!("BUILD_TIMESTAMP"),
            git = option_env!("GIT_HASH").unwrap_or("unknown"),
            "platform initialized"
        );

        Self {
            bus,
            notifier,
            orchestrator,
            dashboard,
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn notifier(&self) -> &Arc<NotificationSystem> {
        &self.notifier
    }

    pub fn orchestrator(&self) -> &ScanOrchestrator {
        &self.orchestrator
    }

    pub fn dashboard(&self) -> &DashboardService {
        &self.dashboard
    }

    /// Teardown: stop every active scan, suppress pending retries, and
    /// dismiss all notifications.
    pub fn shutdown(&self) {
        self.orchestrator.shutdown();
        self.notifier.clear();
        info!("platform shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::models::ScanRequest;
    use crate::notify::sink::RecordingSink;

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_active_scans() {
        let config = PlatformConfig::default();
        let backend = Arc::new(MemoryBackend::new());
        let platform =
            Platform::with_backend(&config, backend, Arc::new(RecordingSink::default()));

        let request = ScanRequest::new("a@b.com", "email_lookup", &[]).with_retries(0);
        platform.orchestrator().submit(&request).await.unwrap();
        assert_eq!(platform.orchestrator().active_count(), 1);

        platform.shutdown();
        assert_eq!(platform.orchestrator().active_count(), 0);
        assert_eq!(platform.notifier().active_count(), 0);
    }
}
