//! Principal extraction from gateway-supplied headers.
//!
//! Authentication happens upstream; the gateway forwards the verified subject
//! and role on every request. A request missing either header never reaches a
//! service method.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::domain::{Principal, PrincipalId, Role};

pub const PRINCIPAL_ID_HEADER: &str = "x-principal-id";
pub const PRINCIPAL_ROLE_HEADER: &str = "x-principal-role";
pub const PRINCIPAL_NATIONAL_ID_HEADER: &str = "x-principal-national-id";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityRejection {
    #[error("missing {0} header")]
    Missing(&'static str),
    #[error("unrecognised role {0:?}")]
    UnknownRole(String),
}

impl IntoResponse for IdentityRejection {
    fn into_response(self) -> Response {
        let payload = json!({
            "error": "Unauthenticated",
            "detail": self.to_string(),
        });
        (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
    }
}

pub fn principal_from_headers(headers: &HeaderMap) -> Result<Principal, IdentityRejection> {
    let id = header_value(headers, PRINCIPAL_ID_HEADER)
        .ok_or(IdentityRejection::Missing(PRINCIPAL_ID_HEADER))?;
    let role = header_value(headers, PRINCIPAL_ROLE_HEADER)
        .ok_or(IdentityRejection::Missing(PRINCIPAL_ROLE_HEADER))?;

    let role = match role.to_ascii_uppercase().as_str() {
        "APPLICANT" => Role::Applicant,
        "OFFICER" => Role::Officer,
        _ => return Err(IdentityRejection::UnknownRole(role.to_string())),
    };

    Ok(Principal {
        id: PrincipalId(id.to_string()),
        role,
        national_id: header_value(headers, PRINCIPAL_NATIONAL_ID_HEADER).map(str::to_string),
    })
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = IdentityRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        principal_from_headers(&parts.headers)
    }
}
