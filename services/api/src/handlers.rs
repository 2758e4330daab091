//! Axum Handlers for the REST API
//!
//! The token endpoint proxies `streaming.create_token` on the avatar provider
//! and answers with the bare token as plain text. Failures are reported as
//! plain-text 500s carrying the reason.

use anyhow::Context;
use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::{
    models::{CreateTokenResponse, HealthResponse},
    state::AppState,
};

pub enum ApiError {
    /// The provider answered with a non-2xx status.
    Upstream {
        status: u16,
        body: serde_json::Value,
    },
    MissingToken,
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match self {
            ApiError::Upstream { status, body } => {
                format!("Failed to create token: {} {}", status, body)
            }
            ApiError::MissingToken => "No token received in response".to_string(),
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                err.to_string()
            }
        };
        error!(%message, "Error retrieving access token");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain")],
            message,
        )
            .into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// Create a short-lived streaming token.
#[utoipa::path(
    post,
    path = "/api/get-access-token",
    responses(
        (status = 200, description = "Streaming access token", body = String, content_type = "text/plain"),
        (status = 500, description = "The provider refused or returned no token", body = String, content_type = "text/plain")
    )
)]
#[instrument(skip_all)]
pub async fn get_access_token(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let url = format!(
        "{}/v1/streaming.create_token",
        state.config.avatar_base_api_url
    );
    let res = state
        .http
        .post(&url)
        .header("x-api-key", &state.config.avatar_api_key)
        .json(&json!({}))
        .send()
        .await
        .context("Failed to reach the avatar provider")?;

    let status = res.status();
    if !status.is_success() {
        let body = res
            .json::<serde_json::Value>()
            .await
            .unwrap_or_else(|_| json!({}));
        error!(
            status = status.as_u16(),
            status_text = status.canonical_reason().unwrap_or_default(),
            error_data = %body,
            "Token creation failed"
        );
        return Err(ApiError::Upstream {
            status: status.as_u16(),
            body,
        });
    }

    let data: CreateTokenResponse = res
        .json()
        .await
        .context("Invalid token response from the avatar provider")?;
    let token = data.into_token().ok_or(ApiError::MissingToken)?;

    info!(token_len = token.len(), "Access token created");
    Ok(([(header::CONTENT_TYPE, "text/plain")], token))
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
