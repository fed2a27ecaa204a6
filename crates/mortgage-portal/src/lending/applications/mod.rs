//! Mortgage loan application intake, access control, and officer decisions.

pub mod access;
pub mod decision;
pub mod domain;
pub mod identity;
pub mod memory;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use access::{AccessDenied, Capability, ListScope};
pub use decision::DecisionEngine;
pub use domain::{
    Application, ApplicationFilter, ApplicationId, ApplicationRequest, ApplicationStatus,
    Decision, DecisionId, DecisionOutcome, DecisionRequest, FieldViolation, Principal,
    PrincipalId, Role, MAX_COMMENT_CHARS, MAX_TERM_MONTHS,
};
pub use identity::IdentityRejection;
pub use memory::InMemoryApplicationRepository;
pub use repository::{ApplicationRepository, RepositoryError};
pub use router::{application_router, error_response, ApplicationApi, APPLICATIONS_PATH};
pub use service::{ApplicationServiceError, LoanApplicationService};
