//! HTTP API facade
//!
//! Translates the tsuru service-broker routes onto manager operations and
//! maps the error taxonomy to status codes. All HTTP knowledge lives here;
//! the manager is injected at router construction.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::BrokerError;
use crate::instance::InstanceState;
use crate::manager::AnyManager;

/// Build the broker router with the manager injected as shared state
pub fn router(manager: AnyManager) -> Router {
    Router::new()
        .route("/resources", post(create))
        .route(
            "/resources/:name",
            post(bind).get(info).delete(remove),
        )
        .route("/resources/:name/hostname/:host", delete(unbind))
        .route("/resources/:name/status", get(status))
        .with_state(manager)
}

/// Map a broker error to its response
fn error_response(err: BrokerError) -> Response {
    match err {
        BrokerError::InvalidInput(_) => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
        BrokerError::NotFound => {
            (StatusCode::NOT_FOUND, "Instance not found").into_response()
        }
        BrokerError::Conflict { .. } => (StatusCode::CONFLICT, err.to_string()).into_response(),
        BrokerError::Backend(err) => {
            error!(error = %err, "Backend failure");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateForm {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BindForm {
    #[serde(rename = "app-host")]
    app_host: Option<String>,
}

#[derive(Debug, Serialize)]
struct InfoResponse {
    name: String,
}

async fn create(State(manager): State<AnyManager>, Form(form): Form<CreateForm>) -> Response {
    let name = form.name.as_deref().unwrap_or("");
    match manager.create(name).await {
        Ok(_) => StatusCode::CREATED.into_response(),
        Err(err) => error_response(err),
    }
}

async fn remove(State(manager): State<AnyManager>, Path(name): Path<String>) -> Response {
    match manager.remove(&name).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

async fn bind(
    State(manager): State<AnyManager>,
    Path(name): Path<String>,
    Form(form): Form<BindForm>,
) -> Response {
    let host = form.app_host.as_deref().unwrap_or("");
    match manager.bind(&name, host).await {
        // tsuru expects a JSON null body on successful bind
        Ok(()) => (StatusCode::CREATED, Json(serde_json::Value::Null)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn unbind(
    State(manager): State<AnyManager>,
    Path((name, host)): Path<(String, String)>,
) -> Response {
    match manager.unbind(&name, &host).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

async fn info(State(manager): State<AnyManager>, Path(name): Path<String>) -> Response {
    match manager.info(&name).await {
        Ok(instance) => Json(InfoResponse {
            name: instance.name,
        })
        .into_response(),
        Err(err) => error_response(err),
    }
}

async fn status(State(manager): State<AnyManager>, Path(name): Path<String>) -> Response {
    match manager.status(&name).await {
        Ok(InstanceState::Pending) => StatusCode::ACCEPTED.into_response(),
        Ok(InstanceState::Running) => StatusCode::NO_CONTENT.into_response(),
        Ok(InstanceState::Error) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        Err(err) => error_response(err),
    }
}
