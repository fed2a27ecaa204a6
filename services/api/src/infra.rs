use metrics_exporter_prometheus::PrometheusHandle;
use mortgage_portal::config::EventsConfig;
use mortgage_portal::lending::applications::{
    DecisionEngine, InMemoryApplicationRepository, LoanApplicationService,
};
use mortgage_portal::lending::events::{
    EventPublisher, InMemoryQueueTransport, InMemoryStreamTransport, PublishObserver,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type Lifecycle = LoanApplicationService<InMemoryApplicationRepository, EventPublisher>;
pub(crate) type Decisions = DecisionEngine<InMemoryApplicationRepository, EventPublisher>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Services wired to process-local storage and in-memory transports.
pub(crate) struct Portal {
    pub(crate) lifecycle: Arc<Lifecycle>,
    pub(crate) decisions: Arc<Decisions>,
    pub(crate) publisher: Arc<EventPublisher>,
    pub(crate) stream: Arc<InMemoryStreamTransport>,
    pub(crate) queue: Arc<InMemoryQueueTransport>,
}

impl Portal {
    /// Spawns the publisher's completion worker, so this must run inside the Tokio runtime.
    pub(crate) fn assemble(config: &EventsConfig, observer: Arc<dyn PublishObserver>) -> Self {
        let stream = Arc::new(InMemoryStreamTransport::new(config.partitions));
        let queue = Arc::new(InMemoryQueueTransport::default());
        let publisher = Arc::new(EventPublisher::spawn(
            stream.clone(),
            queue.clone(),
            observer,
            config,
        ));

        let lifecycle = Arc::new(LoanApplicationService::new(
            Arc::new(InMemoryApplicationRepository::default()),
            publisher.clone(),
            config.topic.clone(),
        ));
        let decisions = Arc::new(DecisionEngine::new(lifecycle.clone()));

        Self {
            lifecycle,
            decisions,
            publisher,
            stream,
            queue,
        }
    }
}
