use super::domain::{Application, ApplicationId, Decision};

/// Storage abstraction so the lifecycle and decision services can be exercised in isolation.
///
/// Implementations must be safe under concurrent callers. The guarded
/// operations (`update_pending`, `remove_pending`, `record_decision`) check the
/// PENDING precondition and apply their write as one atomic step.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError>;

    fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError>;

    /// Applications accepted by `predicate`, in insertion order.
    fn find(
        &self,
        predicate: &dyn Fn(&Application) -> bool,
    ) -> Result<Vec<Application>, RepositoryError>;

    /// Replace the stored application while it is still PENDING.
    fn update_pending(&self, application: Application) -> Result<Application, RepositoryError>;

    /// Remove the application while it is still PENDING, returning the removed record.
    fn remove_pending(&self, id: &ApplicationId) -> Result<Application, RepositoryError>;

    /// Store `decision` and move its application to the matching terminal status.
    fn record_decision(&self, decision: Decision) -> Result<Application, RepositoryError>;

    fn decision_for(&self, id: &ApplicationId) -> Result<Option<Decision>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("application is no longer pending")]
    NotPending,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
