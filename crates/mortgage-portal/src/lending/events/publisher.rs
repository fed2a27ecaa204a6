use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::envelope::ApplicationEvent;
use super::observer::{DeliveryOutcome, DeliveryReport, PublishFailure, PublishObserver};
use super::transport::{
    DeliveryFuture, FallbackMessage, FallbackTransport, OutboundRecord, PrimaryTransport,
    TransportError, TRACE_ID_HEADER,
};
use crate::config::EventsConfig;

/// Which step of the delivery pipeline took an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishRoute {
    /// Primary send initiated; its acknowledgement settles in the background.
    Primary,
    /// Primary initiation failed; the fallback queue accepted the event.
    Fallback,
    /// Both transports refused the event; a `PublishFailure` was reported.
    Dropped,
}

/// Outbound side of every committed mutation. Implementations never fail the caller.
pub trait EventSink: Send + Sync {
    fn publish(&self, topic: &str, partition_key: &str, event: ApplicationEvent) -> PublishRoute;
}

/// Fire-and-forget publisher: primary stream first, synchronous queue fallback second.
///
/// Primary acknowledgements are settled by a background worker bounded by
/// `EventsConfig::max_in_flight`; the worker only hands immutable
/// [`DeliveryReport`]s to the observer. Per-key ordering holds on the primary
/// path only. An event that falls back has no ordering guarantee against later
/// primary events for the same key.
pub struct EventPublisher {
    primary: Arc<dyn PrimaryTransport>,
    fallback: Arc<dyn FallbackTransport>,
    observer: Arc<dyn PublishObserver>,
    fallback_destination: String,
    completions: mpsc::Sender<PendingDelivery>,
    tracker: Arc<CompletionTracker>,
}

impl EventPublisher {
    /// Build the publisher and spawn its completion worker. Must run inside a Tokio runtime.
    pub fn spawn(
        primary: Arc<dyn PrimaryTransport>,
        fallback: Arc<dyn FallbackTransport>,
        observer: Arc<dyn PublishObserver>,
        config: &EventsConfig,
    ) -> Self {
        let (completions, queue) = mpsc::channel(config.completion_queue.max(1));
        let tracker = Arc::new(CompletionTracker::default());

        tokio::spawn(run_completion_worker(
            queue,
            Arc::clone(&observer),
            Arc::clone(&tracker),
            config.max_in_flight.max(1),
        ));

        Self {
            primary,
            fallback,
            observer,
            fallback_destination: config.fallback_destination.clone(),
            completions,
            tracker,
        }
    }

    /// Primary sends initiated but not yet settled by the worker.
    pub fn outstanding(&self) -> usize {
        self.tracker.outstanding.load(Ordering::Acquire)
    }

    /// Wait until every tracked primary delivery has been reported.
    pub async fn settled(&self) {
        loop {
            let idle = self.tracker.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();

            if self.outstanding() == 0 {
                return;
            }
            idle.await;
        }
    }

    fn initiate_primary(
        &self,
        topic: &str,
        key: &str,
        trace_id: &str,
        event: &ApplicationEvent,
    ) -> Result<DeliveryFuture, TransportError> {
        let value =
            serde_json::to_vec(event).map_err(|err| TransportError::Encoding(err.to_string()))?;

        self.primary.send(OutboundRecord {
            topic: topic.to_string(),
            key: key.to_string(),
            value,
            headers: vec![(TRACE_ID_HEADER.to_string(), trace_id.as_bytes().to_vec())],
        })
    }

    fn track(&self, context: DeliveryContext, delivery: DeliveryFuture) {
        self.tracker.outstanding.fetch_add(1, Ordering::AcqRel);

        let rejected = match self.completions.try_send(PendingDelivery { context, delivery }) {
            Ok(()) => return,
            Err(TrySendError::Full(pending)) => (pending, "completion queue full"),
            Err(TrySendError::Closed(pending)) => (pending, "completion worker stopped"),
        };

        let (pending, reason) = rejected;
        self.tracker.finish();
        warn!(
            topic = %pending.context.topic,
            key = %pending.context.key,
            trace_id = %pending.context.trace_id,
            reason,
            "primary send initiated but its outcome will not be observed"
        );
    }

    fn fall_back(
        &self,
        topic: &str,
        key: &str,
        trace_id: String,
        event: ApplicationEvent,
        primary_error: TransportError,
    ) -> PublishRoute {
        warn!(
            topic,
            key,
            trace_id = %trace_id,
            error = %primary_error,
            "primary stream unavailable, falling back to queue"
        );

        let message = FallbackMessage {
            key: key.to_string(),
            trace_id,
            payload: event,
        };

        match self.fallback.send(&self.fallback_destination, &message) {
            Ok(()) => {
                self.observer.delivery_settled(&DeliveryReport {
                    topic: topic.to_string(),
                    key: message.key,
                    trace_id: message.trace_id,
                    outcome: DeliveryOutcome::FellBack {
                        destination: self.fallback_destination.clone(),
                    },
                });
                PublishRoute::Fallback
            }
            Err(fallback_error) => {
                self.observer.publish_failed(&PublishFailure {
                    topic: topic.to_string(),
                    key: message.key,
                    trace_id: message.trace_id,
                    primary: primary_error,
                    fallback: fallback_error,
                });
                PublishRoute::Dropped
            }
        }
    }
}

impl EventSink for EventPublisher {
    fn publish(
        &self,
        topic: &str,
        partition_key: &str,
        mut event: ApplicationEvent,
    ) -> PublishRoute {
        let trace_id = event.metadata.resolve_trace_id().to_string();

        match self.initiate_primary(topic, partition_key, &trace_id, &event) {
            Ok(delivery) => {
                debug!(topic, key = partition_key, trace_id = %trace_id, "primary send initiated");
                self.track(
                    DeliveryContext {
                        topic: topic.to_string(),
                        key: partition_key.to_string(),
                        trace_id,
                    },
                    delivery,
                );
                PublishRoute::Primary
            }
            Err(primary_error) => {
                self.fall_back(topic, partition_key, trace_id, event, primary_error)
            }
        }
    }
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn publish(&self, topic: &str, partition_key: &str, event: ApplicationEvent) -> PublishRoute {
        (**self).publish(topic, partition_key, event)
    }
}

#[derive(Debug, Default)]
struct CompletionTracker {
    outstanding: AtomicUsize,
    idle: Notify,
}

impl CompletionTracker {
    fn finish(&self) {
        if self.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

struct DeliveryContext {
    topic: String,
    key: String,
    trace_id: String,
}

struct PendingDelivery {
    context: DeliveryContext,
    delivery: DeliveryFuture,
}

impl PendingDelivery {
    async fn settle(self, observer: &dyn PublishObserver) {
        let outcome = match self.delivery.await {
            Ok(receipt) => DeliveryOutcome::Acknowledged(receipt),
            Err(err) => DeliveryOutcome::Rejected(err),
        };

        observer.delivery_settled(&DeliveryReport {
            topic: self.context.topic,
            key: self.context.key,
            trace_id: self.context.trace_id,
            outcome,
        });
    }
}

async fn run_completion_worker(
    mut queue: mpsc::Receiver<PendingDelivery>,
    observer: Arc<dyn PublishObserver>,
    tracker: Arc<CompletionTracker>,
    max_in_flight: usize,
) {
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(err) = joined {
                    tracker.finish();
                    warn!(error = %err, "delivery completion task aborted");
                }
            }
            pending = queue.recv(), if in_flight.len() < max_in_flight => {
                let Some(pending) = pending else {
                    break;
                };
                let observer = Arc::clone(&observer);
                let tracker = Arc::clone(&tracker);
                in_flight.spawn(async move {
                    pending.settle(observer.as_ref()).await;
                    tracker.finish();
                });
            }
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(err) = joined {
            tracker.finish();
            warn!(error = %err, "delivery completion task aborted");
        }
    }
}
