/*
 * Responsibility
 * - POST {internal prefix}/credentials: register credentials with the configured provider
 * - Providers that do not register (machine-to-machine) answer 501
 */
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde_json::{Value, json};
use tracing::info;

use crate::error::AppError;
use crate::repos::credentials_repo::RegistrationInfo;
use crate::services::oidc::OidcError;
use crate::state::AppState;

pub async fn register_credentials(
    State(state): State<AppState>,
    Json(info): Json<RegistrationInfo>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if info.username.trim().is_empty() {
        return Err(AppError::InvalidRequest("username must not be empty".to_string()));
    }

    let provider = state.credentials.provider_type();
    let id = state
        .credentials
        .register(&info)
        .await
        .map_err(OidcError::from)?
        .ok_or(OidcError::NotImplemented("credentials registration"))?;

    info!(credentials_id = %id, provider, "credentials registered");
    Ok((StatusCode::CREATED, Json(json!({ "id": id, "provider": provider }))))
}
