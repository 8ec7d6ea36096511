//! HTTP handlers for the REST API

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use kube::api::Api;
use tracing::{error, instrument};

use crate::controller::ControllerState;
use crate::crd::APIServiceOperator;

use super::dto::{ErrorResponse, HealthResponse, OperatorStatusResponse};

/// Liveness endpoint
#[instrument]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness endpoint: fails once shutdown has started
pub async fn ready(State(state): State<Arc<ControllerState>>) -> StatusCode {
    if state.shutdown.is_shutting_down() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

/// Current management state and conditions of the operator resource
#[instrument(skip(state))]
pub async fn operator_status(
    State(state): State<Arc<ControllerState>>,
) -> Result<Json<OperatorStatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    let api: Api<APIServiceOperator> = Api::all(state.client.clone());

    match api.get_opt(&state.operator_name).await {
        Ok(Some(operator)) => Ok(Json(OperatorStatusResponse {
            name: state.operator_name.clone(),
            management_state: operator.spec.management_state.to_string(),
            conditions: operator.status.map(|s| s.conditions).unwrap_or_default(),
        })),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                "not_found",
                &format!("APIServiceOperator {} not found", state.operator_name),
            )),
        )),
        Err(e) => {
            error!("Failed to get APIServiceOperator {}: {:?}", state.operator_name, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("get_failed", &e.to_string())),
            ))
        }
    }
}
