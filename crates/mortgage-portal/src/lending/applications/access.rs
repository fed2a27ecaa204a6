//! Role capability table and the per-operation checks built on it.
//!
//! Every lifecycle and decision operation calls exactly one `authorize_*`
//! function here before touching the repository, so the table below is the
//! single place that decides who may do what.

use super::domain::{Application, Principal, PrincipalId, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    CreateOwn,
    ReadOwn,
    ReadAny,
    ListAll,
    UpdateOwn,
    DeleteOwn,
    DeleteAny,
    Decide,
}

impl Role {
    pub const fn allows(self, capability: Capability) -> bool {
        use Capability::*;

        match self {
            Role::Applicant => matches!(capability, CreateOwn | ReadOwn | UpdateOwn | DeleteOwn),
            Role::Officer => matches!(capability, ReadAny | ListAll | DeleteAny | Decide),
        }
    }
}

/// Rejection raised when a principal's role or ownership does not cover an operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("access denied: {reason}")]
pub struct AccessDenied {
    pub reason: &'static str,
}

impl AccessDenied {
    const fn because(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// Which applications a listing call is allowed to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListScope {
    All,
    OwnedBy(PrincipalId),
}

impl ListScope {
    pub fn admits(&self, application: &Application) -> bool {
        match self {
            ListScope::All => true,
            ListScope::OwnedBy(owner) => &application.owner_id == owner,
        }
    }
}

pub fn authorize_create(principal: &Principal) -> Result<(), AccessDenied> {
    if principal.role.allows(Capability::CreateOwn) {
        Ok(())
    } else {
        Err(AccessDenied::because("only applicants may submit applications"))
    }
}

pub fn authorize_read(principal: &Principal, application: &Application) -> Result<(), AccessDenied> {
    if principal.role.allows(Capability::ReadAny) {
        return Ok(());
    }
    if principal.role.allows(Capability::ReadOwn) && application.is_owned_by(principal) {
        return Ok(());
    }
    Err(AccessDenied::because("you can only view your own applications"))
}

pub fn list_scope(principal: &Principal) -> ListScope {
    if principal.role.allows(Capability::ListAll) {
        ListScope::All
    } else {
        ListScope::OwnedBy(principal.id.clone())
    }
}

pub fn authorize_update(
    principal: &Principal,
    application: &Application,
) -> Result<(), AccessDenied> {
    if principal.role.allows(Capability::UpdateOwn) && application.is_owned_by(principal) {
        Ok(())
    } else {
        Err(AccessDenied::because("only the owning applicant may change loan terms"))
    }
}

pub fn authorize_delete(
    principal: &Principal,
    application: &Application,
) -> Result<(), AccessDenied> {
    if principal.role.allows(Capability::DeleteAny) {
        return Ok(());
    }
    if principal.role.allows(Capability::DeleteOwn) && application.is_owned_by(principal) {
        return Ok(());
    }
    Err(AccessDenied::because("you can only withdraw your own applications"))
}

pub fn authorize_decide(principal: &Principal) -> Result<(), AccessDenied> {
    if principal.role.allows(Capability::Decide) {
        Ok(())
    } else {
        Err(AccessDenied::because("only officers may decide applications"))
    }
}
