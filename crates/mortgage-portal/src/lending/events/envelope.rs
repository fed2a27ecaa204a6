use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lending::applications::domain::{
    Application, ApplicationId, ApplicationStatus, PrincipalId,
};

pub const EVENT_VERSION: &str = "v1";
pub const EVENT_SOURCE: &str = "mortgage-portal";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const fn label(self) -> &'static str {
        match self {
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        }
    }

    pub fn event_type(self) -> String {
        format!("APPLICATION_{}", self.label())
    }
}

/// Consumer-facing view of an application at the moment of the mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSnapshot {
    pub id: ApplicationId,
    pub owner_id: PrincipalId,
    pub status: ApplicationStatus,
    pub amount: u64,
    pub term_months: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Application> for ApplicationSnapshot {
    fn from(application: &Application) -> Self {
        Self {
            id: application.id,
            owner_id: application.owner_id.clone(),
            status: application.status,
            amount: application.amount,
            term_months: application.term_months,
            created_at: application.created_at,
            updated_at: application.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    pub trace_id: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub event_type: String,
}

impl EventMetadata {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            trace_id: new_trace_id(),
            version: EVENT_VERSION.to_string(),
            timestamp: Utc::now(),
            source: EVENT_SOURCE.to_string(),
            event_type: event_type.into(),
        }
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    /// Keep an upstream trace id when present, otherwise mint one. Returns the id in effect.
    pub fn resolve_trace_id(&mut self) -> &str {
        if self.trace_id.trim().is_empty() {
            self.trace_id = new_trace_id();
        }
        &self.trace_id
    }
}

pub fn new_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Versioned envelope announced for every committed application mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationEvent {
    pub application: ApplicationSnapshot,
    pub metadata: EventMetadata,
    pub operation: Operation,
}

impl ApplicationEvent {
    pub fn new(application: &Application, operation: Operation) -> Self {
        Self {
            application: ApplicationSnapshot::from(application),
            metadata: EventMetadata::new(operation.event_type()),
            operation,
        }
    }

    /// Partition key keeping one application's events on one ordered lane.
    pub fn partition_key(&self) -> String {
        self.application.id.to_string()
    }
}
