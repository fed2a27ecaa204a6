use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::access::{self, AccessDenied};
use super::domain::{
    Application, ApplicationFilter, ApplicationId, ApplicationRequest, ApplicationStatus,
    FieldViolation, Principal,
};
use super::repository::{ApplicationRepository, RepositoryError};
use crate::lending::events::{ApplicationEvent, EventSink, Operation};

/// Application lifecycle: intake plus access-controlled read, list, update, and withdrawal.
///
/// Every mutation is committed to the repository first and only then handed
/// to the event sink; a failed write never produces an event.
pub struct LoanApplicationService<R, E> {
    repository: Arc<R>,
    events: Arc<E>,
    topic: String,
}

impl<R, E> LoanApplicationService<R, E>
where
    R: ApplicationRepository + 'static,
    E: EventSink + 'static,
{
    pub fn new(repository: Arc<R>, events: Arc<E>, topic: impl Into<String>) -> Self {
        Self {
            repository,
            events,
            topic: topic.into(),
        }
    }

    /// Submit a new application owned by `principal`.
    pub fn create(
        &self,
        request: ApplicationRequest,
        principal: &Principal,
    ) -> Result<Application, ApplicationServiceError> {
        access::authorize_create(principal)?;
        request.validate()?;

        let now = Utc::now();
        let application = Application {
            id: ApplicationId::generate(),
            owner_id: principal.id.clone(),
            owner_national_id: principal.national_id.clone(),
            status: ApplicationStatus::Pending,
            amount: request.amount,
            term_months: request.term_months,
            created_at: now,
            updated_at: now,
        };

        let stored = self.repository.insert(application)?;
        info!(application_id = %stored.id, owner = %stored.owner_id, "application submitted");
        self.announce(&stored, Operation::Create);
        Ok(stored)
    }

    pub fn get(
        &self,
        id: &ApplicationId,
        principal: &Principal,
    ) -> Result<Application, ApplicationServiceError> {
        let application = self
            .repository
            .fetch(id)?
            .ok_or(ApplicationServiceError::NotFound(*id))?;
        access::authorize_read(principal, &application)?;
        Ok(application)
    }

    /// Officers see every match; applicants only ever see their own applications.
    pub fn list(
        &self,
        filter: &ApplicationFilter,
        principal: &Principal,
    ) -> Result<Vec<Application>, ApplicationServiceError> {
        let scope = access::list_scope(principal);
        let applications = self
            .repository
            .find(&|application: &Application| {
                scope.admits(application) && filter.matches(application)
            })?;
        debug!(count = applications.len(), role = principal.role.label(), "applications listed");
        Ok(applications)
    }

    /// Change amount and term while the application is still pending.
    pub fn update(
        &self,
        id: &ApplicationId,
        request: ApplicationRequest,
        principal: &Principal,
    ) -> Result<Application, ApplicationServiceError> {
        let current = self.get(id, principal)?;
        access::authorize_update(principal, &current)?;
        if current.status.is_decided() {
            return Err(ApplicationServiceError::AlreadyDecided(*id));
        }
        request.validate()?;

        let revised = Application {
            amount: request.amount,
            term_months: request.term_months,
            updated_at: Utc::now(),
            ..current
        };

        let stored = self
            .repository
            .update_pending(revised)
            .map_err(|err| ApplicationServiceError::from_guarded(err, *id))?;
        info!(application_id = %stored.id, "application terms updated");
        self.announce(&stored, Operation::Update);
        Ok(stored)
    }

    /// Withdraw or discard a pending application.
    pub fn delete(
        &self,
        id: &ApplicationId,
        principal: &Principal,
    ) -> Result<(), ApplicationServiceError> {
        let current = self.get(id, principal)?;
        access::authorize_delete(principal, &current)?;
        if current.status.is_decided() {
            return Err(ApplicationServiceError::AlreadyDecided(*id));
        }

        let removed = self
            .repository
            .remove_pending(id)
            .map_err(|err| ApplicationServiceError::from_guarded(err, *id))?;
        info!(application_id = %removed.id, by = %principal.id, "application deleted");
        self.announce(&removed, Operation::Delete);
        Ok(())
    }

    pub(crate) fn repository(&self) -> &R {
        &self.repository
    }

    /// Hand the committed state to the event sink. Never fails the caller.
    pub(crate) fn announce(&self, application: &Application, operation: Operation) {
        let event = ApplicationEvent::new(application, operation);
        let key = event.partition_key();
        let route = self.events.publish(&self.topic, &key, event);
        debug!(application_id = %application.id, operation = operation.label(), ?route, "event handed off");
    }
}

/// Error raised by the lifecycle and decision services.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationServiceError {
    #[error("application {0} not found")]
    NotFound(ApplicationId),
    #[error(transparent)]
    AccessDenied(#[from] AccessDenied),
    #[error("application {0} is already decided")]
    AlreadyDecided(ApplicationId),
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ApplicationServiceError {
    /// Map a guarded repository write on `id` onto the caller-facing taxonomy.
    pub(crate) fn from_guarded(err: RepositoryError, id: ApplicationId) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound(id),
            RepositoryError::NotPending => Self::AlreadyDecided(id),
            other => Self::Repository(other),
        }
    }

    /// Stable machine-readable code for API payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NotFound",
            Self::AccessDenied(_) => "AccessDenied",
            Self::AlreadyDecided(_) => "AlreadyDecided",
            Self::Validation { .. } => "ValidationError",
            Self::Repository(_) => "RepositoryUnavailable",
        }
    }
}

impl From<FieldViolation> for ApplicationServiceError {
    fn from(violation: FieldViolation) -> Self {
        Self::Validation {
            field: violation.field,
            message: violation.message,
        }
    }
}
