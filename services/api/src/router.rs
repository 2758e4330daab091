//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the token endpoint and the OpenAPI documentation.

use crate::{handlers, models::HealthResponse, state::AppState};

use avatar_core::credentials::ACCESS_TOKEN_PATH;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::get_access_token, handlers::health),
    components(schemas(HealthResponse)),
    tags(
        (name = "Avatar API", description = "Credential proxy for streaming avatar sessions")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route(ACCESS_TOKEN_PATH, post(handlers::get_access_token))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(handlers::health))
        .merge(api_router)
}
