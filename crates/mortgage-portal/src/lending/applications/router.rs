use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use super::decision::DecisionEngine;
use super::domain::{
    ApplicationFilter, ApplicationId, ApplicationRequest, DecisionRequest, Principal,
};
use super::repository::ApplicationRepository;
use super::service::{ApplicationServiceError, LoanApplicationService};
use crate::lending::events::EventSink;

pub const APPLICATIONS_PATH: &str = "/api/v1/applications";

/// Shared handler state: the lifecycle service and the decision engine over it.
pub struct ApplicationApi<R, E> {
    pub lifecycle: Arc<LoanApplicationService<R, E>>,
    pub decisions: Arc<DecisionEngine<R, E>>,
}

impl<R, E> Clone for ApplicationApi<R, E> {
    fn clone(&self) -> Self {
        Self {
            lifecycle: Arc::clone(&self.lifecycle),
            decisions: Arc::clone(&self.decisions),
        }
    }
}

/// Router builder exposing the application lifecycle and decision endpoints.
pub fn application_router<R, E>(
    lifecycle: Arc<LoanApplicationService<R, E>>,
    decisions: Arc<DecisionEngine<R, E>>,
) -> Router
where
    R: ApplicationRepository + 'static,
    E: EventSink + 'static,
{
    Router::new()
        .route(
            APPLICATIONS_PATH,
            get(list_handler::<R, E>).post(create_handler::<R, E>),
        )
        .route(
            "/api/v1/applications/:application_id",
            get(get_handler::<R, E>)
                .put(update_handler::<R, E>)
                .delete(delete_handler::<R, E>),
        )
        .route(
            "/api/v1/applications/:application_id/decision",
            get(decision_lookup_handler::<R, E>).patch(decide_handler::<R, E>),
        )
        .with_state(ApplicationApi {
            lifecycle,
            decisions,
        })
}

pub(crate) async fn create_handler<R, E>(
    State(api): State<ApplicationApi<R, E>>,
    principal: Principal,
    body: Result<Json<ApplicationRequest>, JsonRejection>,
) -> Response
where
    R: ApplicationRepository + 'static,
    E: EventSink + 'static,
{
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return malformed_body(rejection),
    };

    match api.lifecycle.create(request, &principal) {
        Ok(application) => (StatusCode::CREATED, Json(application)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_handler<R, E>(
    State(api): State<ApplicationApi<R, E>>,
    principal: Principal,
    filter: Result<Query<ApplicationFilter>, QueryRejection>,
) -> Response
where
    R: ApplicationRepository + 'static,
    E: EventSink + 'static,
{
    let Query(filter) = match filter {
        Ok(filter) => filter,
        Err(rejection) => {
            return validation_payload("query", rejection.body_text());
        }
    };

    match api.lifecycle.list(&filter, &principal) {
        Ok(applications) => (StatusCode::OK, Json(applications)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn get_handler<R, E>(
    State(api): State<ApplicationApi<R, E>>,
    principal: Principal,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    E: EventSink + 'static,
{
    let id = match parse_id(&application_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match api.lifecycle.get(&id, &principal) {
        Ok(application) => (StatusCode::OK, Json(application)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn update_handler<R, E>(
    State(api): State<ApplicationApi<R, E>>,
    principal: Principal,
    Path(application_id): Path<String>,
    body: Result<Json<ApplicationRequest>, JsonRejection>,
) -> Response
where
    R: ApplicationRepository + 'static,
    E: EventSink + 'static,
{
    let id = match parse_id(&application_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return malformed_body(rejection),
    };

    match api.lifecycle.update(&id, request, &principal) {
        Ok(application) => (StatusCode::OK, Json(application)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn delete_handler<R, E>(
    State(api): State<ApplicationApi<R, E>>,
    principal: Principal,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    E: EventSink + 'static,
{
    let id = match parse_id(&application_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match api.lifecycle.delete(&id, &principal) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn decide_handler<R, E>(
    State(api): State<ApplicationApi<R, E>>,
    principal: Principal,
    Path(application_id): Path<String>,
    body: Result<Json<DecisionRequest>, JsonRejection>,
) -> Response
where
    R: ApplicationRepository + 'static,
    E: EventSink + 'static,
{
    let id = match parse_id(&application_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return malformed_body(rejection),
    };

    match api.decisions.decide(&id, request, &principal) {
        Ok(decision) => (StatusCode::OK, Json(decision)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn decision_lookup_handler<R, E>(
    State(api): State<ApplicationApi<R, E>>,
    principal: Principal,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    E: EventSink + 'static,
{
    let id = match parse_id(&application_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match api.decisions.decision_for(&id, &principal) {
        Ok(Some(decision)) => (StatusCode::OK, Json(decision)).into_response(),
        Ok(None) => {
            let payload = json!({
                "error": "NotFound",
                "detail": format!("no decision recorded for application {id}"),
            });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

/// Map a service error onto its status code and `{"error","detail"}` payload.
pub fn error_response(err: ApplicationServiceError) -> Response {
    let status = match &err {
        ApplicationServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ApplicationServiceError::AccessDenied(_) => StatusCode::FORBIDDEN,
        ApplicationServiceError::AlreadyDecided(_) => StatusCode::CONFLICT,
        ApplicationServiceError::Validation { field, message } => {
            return validation_payload(field, message.clone());
        }
        ApplicationServiceError::Repository(source) => {
            error!(error = %source, "application repository failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let payload = json!({
        "error": err.code(),
        "detail": err.to_string(),
    });
    (status, Json(payload)).into_response()
}

fn validation_payload(field: &str, message: String) -> Response {
    let payload = json!({
        "error": "ValidationError",
        "field": field,
        "detail": message,
    });
    (StatusCode::BAD_REQUEST, Json(payload)).into_response()
}

/// Request body fields a deserialization failure can be pinned to.
const BODY_FIELDS: [&str; 4] = ["amount", "termMonths", "outcome", "comments"];

fn malformed_body(rejection: JsonRejection) -> Response {
    let detail = rejection.body_text();
    let field = BODY_FIELDS
        .into_iter()
        .find(|field| detail.contains(field))
        .unwrap_or("body");
    validation_payload(field, detail)
}

fn parse_id(raw: &str) -> Result<ApplicationId, Response> {
    Uuid::parse_str(raw)
        .map(ApplicationId)
        .map_err(|_| validation_payload("id", format!("{raw:?} is not an application id")))
}
