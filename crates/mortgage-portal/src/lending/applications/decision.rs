use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::access;
use super::domain::{ApplicationId, Decision, DecisionId, DecisionRequest, Principal};
use super::repository::ApplicationRepository;
use super::service::{ApplicationServiceError, LoanApplicationService};
use crate::lending::events::{EventSink, Operation};

/// Officer decisions on pending applications.
///
/// Reads go through the lifecycle service so access rules stay in one place.
/// The PENDING check and the decision write happen inside a single guarded
/// repository call; of several officers racing on one application exactly one
/// succeeds and the rest see `AlreadyDecided`.
pub struct DecisionEngine<R, E> {
    lifecycle: Arc<LoanApplicationService<R, E>>,
}

impl<R, E> DecisionEngine<R, E>
where
    R: ApplicationRepository + 'static,
    E: EventSink + 'static,
{
    pub fn new(lifecycle: Arc<LoanApplicationService<R, E>>) -> Self {
        Self { lifecycle }
    }

    pub fn decide(
        &self,
        id: &ApplicationId,
        request: DecisionRequest,
        officer: &Principal,
    ) -> Result<Decision, ApplicationServiceError> {
        access::authorize_decide(officer)?;
        request.validate()?;

        let current = self.lifecycle.get(id, officer)?;
        if current.status.is_decided() {
            return Err(ApplicationServiceError::AlreadyDecided(*id));
        }

        let decision = Decision {
            id: DecisionId(Uuid::new_v4()),
            application_id: *id,
            officer_id: officer.id.clone(),
            outcome: request.outcome,
            comments: request.comments,
            decided_at: Utc::now(),
        };

        let decided = self
            .lifecycle
            .repository()
            .record_decision(decision.clone())
            .map_err(|err| {
                let err = ApplicationServiceError::from_guarded(err, *id);
                if matches!(err, ApplicationServiceError::AlreadyDecided(_)) {
                    warn!(application_id = %id, officer = %officer.id, "lost decision race");
                }
                err
            })?;

        info!(
            application_id = %decided.id,
            officer = %officer.id,
            status = decided.status.label(),
            "application decided"
        );
        self.lifecycle.announce(&decided, Operation::Update);
        Ok(decision)
    }

    /// The recorded decision, if any, visible to whoever may read the application.
    pub fn decision_for(
        &self,
        id: &ApplicationId,
        principal: &Principal,
    ) -> Result<Option<Decision>, ApplicationServiceError> {
        self.lifecycle.get(id, principal)?;
        Ok(self.lifecycle.repository().decision_for(id)?)
    }
}
