use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use super::envelope::ApplicationEvent;

/// Header carrying the trace id on primary-stream records.
pub const TRACE_ID_HEADER: &str = "traceId";

/// Keyed record handed to the primary stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRecord {
    pub topic: String,
    pub key: String,
    pub value: Vec<u8>,
    pub headers: Vec<(String, Vec<u8>)>,
}

impl OutboundRecord {
    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_slice())
    }
}

/// Position the primary stream assigned to an acknowledged record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryReceipt {
    pub partition: Option<u32>,
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport unavailable: {0}")]
    Unavailable(String),
    #[error("delivery rejected: {0}")]
    Rejected(String),
    #[error("unable to encode event: {0}")]
    Encoding(String),
}

/// Resolves once the primary stream acknowledges or rejects a record.
pub type DeliveryFuture =
    Pin<Box<dyn Future<Output = Result<DeliveryReceipt, TransportError>> + Send + 'static>>;

/// Partitioned, asynchronously acknowledged stream (Kafka-like).
///
/// `send` only initiates delivery. An `Err` means the record was never handed
/// over; an `Ok` future settles later with the broker's verdict.
pub trait PrimaryTransport: Send + Sync {
    fn send(&self, record: OutboundRecord) -> Result<DeliveryFuture, TransportError>;
}

/// Wrapper put on the fallback queue so consumers keep the routing key and trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackMessage {
    pub key: String,
    pub trace_id: String,
    pub payload: ApplicationEvent,
}

/// Synchronous queue used when the primary stream cannot take a record.
pub trait FallbackTransport: Send + Sync {
    fn send(&self, destination: &str, message: &FallbackMessage) -> Result<(), TransportError>;
}
