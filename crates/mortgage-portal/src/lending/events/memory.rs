use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use parking_lot::Mutex;

use super::envelope::ApplicationEvent;
use super::transport::{
    DeliveryFuture, DeliveryReceipt, FallbackMessage, FallbackTransport, OutboundRecord,
    PrimaryTransport, TransportError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    Available,
    /// Sends fail at initiation, as when the broker cannot be reached.
    Unavailable,
    /// Sends are accepted but every acknowledgement comes back as a rejection.
    RejectAcknowledgements,
}

/// Record as appended to a partition log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub partition: u32,
    pub offset: u64,
    pub record: OutboundRecord,
}

impl StoredRecord {
    pub fn event(&self) -> Option<ApplicationEvent> {
        serde_json::from_slice(&self.record.value).ok()
    }
}

/// Partitioned append-only log standing in for the primary stream.
#[derive(Debug)]
pub struct InMemoryStreamTransport {
    mode: Mutex<StreamMode>,
    partitions: Mutex<Vec<Vec<StoredRecord>>>,
}

impl InMemoryStreamTransport {
    pub fn new(partitions: u32) -> Self {
        let partitions = partitions.max(1) as usize;
        Self {
            mode: Mutex::new(StreamMode::Available),
            partitions: Mutex::new(vec![Vec::new(); partitions]),
        }
    }

    pub fn set_mode(&self, mode: StreamMode) {
        *self.mode.lock() = mode;
    }

    pub fn partition_for(&self, key: &str) -> u32 {
        let count = self.partitions.lock().len() as u64;
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % count) as u32
    }

    /// Every record sent with `key`, in offset order.
    pub fn records_for_key(&self, key: &str) -> Vec<StoredRecord> {
        let partition = self.partition_for(key) as usize;
        self.partitions.lock()[partition]
            .iter()
            .filter(|stored| stored.record.key == key)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.partitions.lock().iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStreamTransport {
    fn default() -> Self {
        Self::new(1)
    }
}

impl PrimaryTransport for InMemoryStreamTransport {
    fn send(&self, record: OutboundRecord) -> Result<DeliveryFuture, TransportError> {
        match *self.mode.lock() {
            StreamMode::Unavailable => {
                return Err(TransportError::Unavailable(
                    "primary stream is not accepting records".to_string(),
                ))
            }
            StreamMode::RejectAcknowledgements => {
                let reason = format!("broker refused record for key {}", record.key);
                return Ok(Box::pin(std::future::ready(Err::<DeliveryReceipt, _>(
                    TransportError::Rejected(reason),
                ))));
            }
            StreamMode::Available => {}
        }

        let partition = self.partition_for(&record.key);
        let mut partitions = self.partitions.lock();
        let log = &mut partitions[partition as usize];
        let offset = log.len() as u64;
        log.push(StoredRecord {
            partition,
            offset,
            record,
        });

        let receipt = DeliveryReceipt {
            partition: Some(partition),
            offset: Some(offset),
        };
        Ok(Box::pin(std::future::ready(Ok::<_, TransportError>(receipt))))
    }
}

/// Destination-addressed queue standing in for the fallback broker.
#[derive(Debug)]
pub struct InMemoryQueueTransport {
    available: Mutex<bool>,
    messages: Mutex<Vec<(String, FallbackMessage)>>,
}

impl InMemoryQueueTransport {
    pub fn set_available(&self, available: bool) {
        *self.available.lock() = available;
    }

    pub fn messages(&self, destination: &str) -> Vec<FallbackMessage> {
        self.messages
            .lock()
            .iter()
            .filter(|(queued_for, _)| queued_for == destination)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryQueueTransport {
    fn default() -> Self {
        Self {
            available: Mutex::new(true),
            messages: Mutex::new(Vec::new()),
        }
    }
}

impl FallbackTransport for InMemoryQueueTransport {
    fn send(&self, destination: &str, message: &FallbackMessage) -> Result<(), TransportError> {
        if !*self.available.lock() {
            return Err(TransportError::Unavailable(format!(
                "queue {destination} is not accepting messages"
            )));
        }

        self.messages
            .lock()
            .push((destination.to_string(), message.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str) -> OutboundRecord {
        OutboundRecord {
            topic: "loan.applications".to_string(),
            key: key.to_string(),
            value: b"{}".to_vec(),
            headers: Vec::new(),
        }
    }

    #[tokio::test]
    async fn same_key_lands_on_one_partition_in_order() {
        let stream = InMemoryStreamTransport::new(4);

        let first = stream.send(record("app-1")).expect("initiated").await;
        let second = stream.send(record("app-1")).expect("initiated").await;

        let first = first.expect("acknowledged");
        let second = second.expect("acknowledged");
        assert_eq!(first.partition, second.partition);
        assert_eq!(first.offset.map(|offset| offset + 1), second.offset);

        let offsets: Vec<_> = stream
            .records_for_key("app-1")
            .into_iter()
            .map(|stored| stored.offset)
            .collect();
        assert_eq!(offsets.len(), 2);
        assert!(offsets[0] < offsets[1]);
    }

    #[tokio::test]
    async fn rejecting_stream_fails_after_initiation() {
        let stream = InMemoryStreamTransport::new(2);
        stream.set_mode(StreamMode::RejectAcknowledgements);

        let pending = stream.send(record("app-2")).expect("send still initiates");
        assert!(matches!(pending.await, Err(TransportError::Rejected(_))));
        assert!(stream.is_empty());
    }

    #[test]
    fn unavailable_stream_fails_at_initiation() {
        let stream = InMemoryStreamTransport::default();
        stream.set_mode(StreamMode::Unavailable);
        assert!(matches!(
            stream.send(record("app-3")),
            Err(TransportError::Unavailable(_))
        ));
    }
}
