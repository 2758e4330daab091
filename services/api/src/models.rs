//! API Models
//!
//! Wire types for the provider's token endpoint and for this service's own
//! responses, with `utoipa` schemas for the OpenAPI document.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body returned by the provider's `streaming.create_token` endpoint.
#[derive(Deserialize, Debug, Default)]
pub struct CreateTokenResponse {
    #[serde(default)]
    pub data: Option<TokenData>,
}

#[derive(Deserialize, Debug, Default)]
pub struct TokenData {
    #[serde(default)]
    pub token: Option<String>,
}

impl CreateTokenResponse {
    /// The token, if the provider sent a non-empty one.
    pub fn into_token(self) -> Option<String> {
        self.data
            .and_then(|data| data.token)
            .filter(|token| !token.is_empty())
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
}
