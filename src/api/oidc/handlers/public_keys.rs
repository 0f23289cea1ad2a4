use axum::Json;
use axum::extract::State;
use serde_json::Value;

use crate::state::AppState;

/// GET /openidconnect/public_keys (JWK Set)
pub async fn public_keys(State(state): State<AppState>) -> Json<Value> {
    Json(state.key.jwks())
}
