//! Request handler: cache lookup, remote fetch on miss, JSON response.

use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::AppState;
use crate::telemetry;

/// Response body of the local endpoint, for both success and failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterResponse {
    pub body: String,
}

pub(crate) async fn get_parameter(
    State(state): State<AppState>,
) -> (StatusCode, Json<ParameterResponse>) {
    if let Some(value) = state.cache.get(&state.parameter_name) {
        debug!(parameter = %state.parameter_name, "serving parameter from cache");
        return respond(StatusCode::OK, value);
    }

    let start = Instant::now();
    let result = state.store.get_parameter(&state.parameter_name).await;
    metrics::histogram!(telemetry::REMOTE_FETCH_DURATION_SECONDS)
        .record(start.elapsed().as_secs_f64());

    match result {
        Ok(value) => {
            metrics::counter!(telemetry::REMOTE_FETCHES_TOTAL, "status" => "ok").increment(1);
            debug!(
                parameter = %state.parameter_name,
                store = state.store.name(),
                "fetched parameter, caching"
            );
            state
                .cache
                .insert(state.parameter_name.as_ref(), value.clone());
            respond(StatusCode::OK, value)
        }
        Err(e) => {
            metrics::counter!(telemetry::REMOTE_FETCHES_TOTAL, "status" => "error").increment(1);
            warn!(
                parameter = %state.parameter_name,
                store = state.store.name(),
                error = %e,
                "parameter fetch failed"
            );
            respond(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn respond(status: StatusCode, body: String) -> (StatusCode, Json<ParameterResponse>) {
    (status, Json(ParameterResponse { body }))
}
