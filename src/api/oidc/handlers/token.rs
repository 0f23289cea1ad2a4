/*
 * Responsibility
 * - POST /openidconnect/token (form), branched on grant_type
 *   - authorization_code: redeem -> session -> tokens
 *   - refresh_token: not implemented (501)
 * - POST /openidconnect/token/introspect: not implemented (501)
 */
use axum::Json;
use axum::extract::{Form, State};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{error, warn};

use crate::api::oidc::dto::token_request::{IntrospectionRequest, TokenRequest};
use crate::api::oidc::dto::token_response::TokenResponse;
use crate::error::AppError;
use crate::services::oidc::OidcError;
use crate::services::session::Session;
use crate::state::AppState;

pub async fn token(
    State(state): State<AppState>,
    Form(req): Form<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let session = match req.grant_type.as_deref() {
        Some("authorization_code") => {
            let code = req
                .code
                .as_deref()
                .ok_or_else(|| AppError::InvalidRequest("missing code".to_string()))?;
            redeem(&state, code, req.client_id.as_deref()).await?
        }
        Some("refresh_token") => {
            let refresh_token = req
                .refresh_token
                .as_deref()
                .ok_or_else(|| AppError::InvalidRequest("missing refresh_token".to_string()))?;
            state.issuer.refresh_token(refresh_token).await?
        }
        Some(other) => {
            return Err(AppError::InvalidRequest(format!(
                "unsupported grant_type: {}",
                other
            )));
        }
        None => return Err(AppError::InvalidRequest("missing grant_type".to_string())),
    };

    Ok(Json(token_response(&state, &session)?))
}

async fn redeem(
    state: &AppState,
    code: &str,
    client_id: Option<&str>,
) -> Result<Session, AppError> {
    let session_id = state.issuer.redeem_authorization_code(code).await?;

    let session = match state.issuer.session(session_id).await {
        Ok(session) => session,
        // The session behind the code expired or was deleted meanwhile.
        Err(OidcError::SessionNotFound) => {
            return Err(AppError::InvalidGrant("session not found".to_string()));
        }
        Err(err) => return Err(err.into()),
    };

    if client_id.is_some() && client_id != session.oauth2.client_id.as_deref() {
        warn!(session_id = %session_id, "authorization code presented by another client");
        return Err(AppError::InvalidGrant("client mismatch".to_string()));
    }

    Ok(session)
}

fn token_response(state: &AppState, session: &Session) -> Result<TokenResponse, AppError> {
    let Some(access_token) = session.oauth2.access_token.as_deref() else {
        error!(session_id = %session.id(), "derived session has no access token");
        return Err(AppError::Internal);
    };

    Ok(TokenResponse {
        access_token: URL_SAFE_NO_PAD.encode(access_token),
        id_token: state.issuer.issue_id_token(session)?,
        token_type: "Bearer",
        expires_in: (session.meta.expires_at - Utc::now()).num_seconds().max(0),
        scope: session.oauth2.scope.as_ref().map(|s| s.join(" ")),
    })
}

pub async fn introspect(
    State(state): State<AppState>,
    Form(req): Form<IntrospectionRequest>,
) -> Result<Json<Value>, AppError> {
    let session = state.issuer.check_access_token(&req.token).await?;
    Ok(Json(json!({
        "active": true,
        "sub": session.credentials.id,
        "client_id": session.oauth2.client_id,
        "exp": session.meta.expires_at.timestamp(),
    })))
}
