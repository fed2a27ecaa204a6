use parking_lot::Mutex;
use tracing::{error, info, warn};

use super::transport::{DeliveryReceipt, TransportError};

/// Where an event ended up once its delivery settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Primary stream acknowledged the record.
    Acknowledged(DeliveryReceipt),
    /// Primary stream accepted the send but later rejected it.
    Rejected(TransportError),
    /// Primary initiation failed and the fallback queue took the event.
    FellBack { destination: String },
}

/// Immutable record handed to observers after a delivery settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub topic: String,
    pub key: String,
    pub trace_id: String,
    pub outcome: DeliveryOutcome,
}

/// Both transports refused one event. Observability only; never returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("event {key} on {topic} lost: primary {primary}; fallback {fallback}")]
pub struct PublishFailure {
    pub topic: String,
    pub key: String,
    pub trace_id: String,
    pub primary: TransportError,
    pub fallback: TransportError,
}

/// Observability sink for delivery results.
///
/// Implementations only ever see immutable reports, so they cannot reach back
/// into application state.
pub trait PublishObserver: Send + Sync {
    fn delivery_settled(&self, report: &DeliveryReport);

    fn publish_failed(&self, failure: &PublishFailure);
}

/// Default observer: turns reports into log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PublishObserver for TracingObserver {
    fn delivery_settled(&self, report: &DeliveryReport) {
        match &report.outcome {
            DeliveryOutcome::Acknowledged(receipt) => info!(
                topic = %report.topic,
                key = %report.key,
                trace_id = %report.trace_id,
                partition = ?receipt.partition,
                offset = ?receipt.offset,
                "event delivered to primary stream"
            ),
            DeliveryOutcome::Rejected(err) => error!(
                topic = %report.topic,
                key = %report.key,
                trace_id = %report.trace_id,
                error = %err,
                "primary stream rejected event"
            ),
            DeliveryOutcome::FellBack { destination } => warn!(
                topic = %report.topic,
                key = %report.key,
                trace_id = %report.trace_id,
                destination = %destination,
                "event delivered through fallback queue"
            ),
        }
    }

    fn publish_failed(&self, failure: &PublishFailure) {
        error!(
            topic = %failure.topic,
            key = %failure.key,
            trace_id = %failure.trace_id,
            primary_error = %failure.primary,
            fallback_error = %failure.fallback,
            "event lost: primary and fallback transports both failed"
        );
    }
}

/// Keeps every report in memory; used by tests and the CLI demo.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    reports: Mutex<Vec<DeliveryReport>>,
    failures: Mutex<Vec<PublishFailure>>,
}

impl RecordingObserver {
    pub fn reports(&self) -> Vec<DeliveryReport> {
        self.reports.lock().clone()
    }

    pub fn failures(&self) -> Vec<PublishFailure> {
        self.failures.lock().clone()
    }
}

impl PublishObserver for RecordingObserver {
    fn delivery_settled(&self, report: &DeliveryReport) {
        TracingObserver.delivery_settled(report);
        self.reports.lock().push(report.clone());
    }

    fn publish_failed(&self, failure: &PublishFailure) {
        TracingObserver.publish_failed(failure);
        self.failures.lock().push(failure.clone());
    }
}
