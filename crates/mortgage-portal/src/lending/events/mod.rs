//! Event announcements for committed application mutations.
//!
//! Delivery is best-effort: the primary stream is tried first, the fallback
//! queue second, and a double failure is only reported to the observer.

pub mod envelope;
pub mod memory;
pub mod observer;
pub mod publisher;
pub mod transport;

pub use envelope::{ApplicationEvent, ApplicationSnapshot, EventMetadata, Operation};
pub use memory::{InMemoryQueueTransport, InMemoryStreamTransport, StoredRecord, StreamMode};
pub use observer::{
    DeliveryOutcome, DeliveryReport, PublishFailure, PublishObserver, RecordingObserver,
    TracingObserver,
};
pub use publisher::{EventPublisher, EventSink, PublishRoute};
pub use transport::{
    DeliveryFuture, DeliveryReceipt, FallbackMessage, FallbackTransport, OutboundRecord,
    PrimaryTransport, TransportError, TRACE_ID_HEADER,
};
