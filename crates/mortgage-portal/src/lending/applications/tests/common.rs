use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use serde_json::Value;

use crate::lending::applications::domain::{
    Application, ApplicationId, ApplicationRequest, Decision, Principal,
};
use crate::lending::applications::identity::{
    PRINCIPAL_ID_HEADER, PRINCIPAL_NATIONAL_ID_HEADER, PRINCIPAL_ROLE_HEADER,
};
use crate::lending::applications::repository::{ApplicationRepository, RepositoryError};
use crate::lending::applications::{
    application_router, DecisionEngine, InMemoryApplicationRepository, LoanApplicationService,
};
use crate::lending::events::{ApplicationEvent, EventSink, Operation, PublishRoute};

pub(super) const TOPIC: &str = "loan.applications";

pub(super) fn applicant_a() -> Principal {
    Principal::applicant("applicant-a").with_national_id("NID-A")
}

pub(super) fn applicant_b() -> Principal {
    Principal::applicant("applicant-b").with_national_id("NID-B")
}

pub(super) fn officer() -> Principal {
    Principal::officer("officer-o")
}

pub(super) fn terms(amount: u64, term_months: u32) -> ApplicationRequest {
    ApplicationRequest {
        amount,
        term_months,
    }
}

pub(super) struct Harness<R: ApplicationRepository + 'static> {
    pub(super) lifecycle: Arc<LoanApplicationService<R, RecordingSink>>,
    pub(super) decisions: Arc<DecisionEngine<R, RecordingSink>>,
    pub(super) repository: Arc<R>,
    pub(super) events: Arc<RecordingSink>,
}

impl<R: ApplicationRepository + 'static> Harness<R> {
    pub(super) fn with_repository(repository: R) -> Self {
        let repository = Arc::new(repository);
        let events = Arc::new(RecordingSink::default());
        let lifecycle = Arc::new(LoanApplicationService::new(
            repository.clone(),
            events.clone(),
            TOPIC,
        ));
        let decisions = Arc::new(DecisionEngine::new(lifecycle.clone()));
        Self {
            lifecycle,
            decisions,
            repository,
            events,
        }
    }

    pub(super) fn router(&self) -> axum::Router {
        application_router(self.lifecycle.clone(), self.decisions.clone())
    }
}

pub(super) fn harness() -> Harness<InMemoryApplicationRepository> {
    Harness::with_repository(InMemoryApplicationRepository::default())
}

/// Event sink that keeps every hand-off for inspection.
#[derive(Default)]
pub(super) struct RecordingSink {
    published: Mutex<Vec<(String, String, ApplicationEvent)>>,
}

impl RecordingSink {
    pub(super) fn events(&self) -> Vec<ApplicationEvent> {
        self.published
            .lock()
            .expect("sink mutex poisoned")
            .iter()
            .map(|(_, _, event)| event.clone())
            .collect()
    }

    pub(super) fn operations(&self) -> Vec<Operation> {
        self.events().iter().map(|event| event.operation).collect()
    }

    pub(super) fn keys(&self) -> Vec<(String, String)> {
        self.published
            .lock()
            .expect("sink mutex poisoned")
            .iter()
            .map(|(topic, key, _)| (topic.clone(), key.clone()))
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, topic: &str, partition_key: &str, event: ApplicationEvent) -> PublishRoute {
        self.published.lock().expect("sink mutex poisoned").push((
            topic.to_string(),
            partition_key.to_string(),
            event,
        ));
        PublishRoute::Primary
    }
}

pub(super) struct UnavailableRepository;

impl ApplicationRepository for UnavailableRepository {
    fn insert(&self, _application: Application) -> Result<Application, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find(
        &self,
        _predicate: &dyn Fn(&Application) -> bool,
    ) -> Result<Vec<Application>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_pending(&self, _application: Application) -> Result<Application, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn remove_pending(&self, _id: &ApplicationId) -> Result<Application, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn record_decision(&self, _decision: Decision) -> Result<Application, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn decision_for(&self, _id: &ApplicationId) -> Result<Option<Decision>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn request(
    method: Method,
    uri: &str,
    principal: Option<&Principal>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(principal) = principal {
        builder = builder
            .header(PRINCIPAL_ID_HEADER, principal.id.0.as_str())
            .header(PRINCIPAL_ROLE_HEADER, principal.role.label());
        if let Some(national_id) = &principal.national_id {
            builder = builder.header(PRINCIPAL_NATIONAL_ID_HEADER, national_id.as_str());
        }
    }

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
