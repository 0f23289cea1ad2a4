//! Private endpoints: bearer credential -> session -> admission decision.
//!
//! The bearer value is tried as an ID token first. Only when it is not an ID
//! token at all (`TokenMalformed`) and opaque access tokens are allowed is it
//! looked up as an access token. Any resolution failure just leaves the
//! request without a session; `AccessPolicy` decides what happens next.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{OriginalUri, State},
    http::{HeaderValue, Request, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::api::oidc::extractors::AuthCtx;
use crate::error::AppError;
use crate::middleware::auth::policy::{AccessPolicy, Decision};
use crate::services::oidc::OidcError;
use crate::services::session::Session;
use crate::state::AppState;

pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    OriginalUri(original_uri): OriginalUri,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let session = match authorization
        .as_deref()
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        Some(token) => resolve_bearer(&state, token.trim()).await,
        None => None,
    };

    match state
        .policy
        .decide(session.as_deref(), original_uri.path(), authorization.as_deref())
    {
        Decision::Admit => {
            req.extensions_mut().insert(AuthCtx::new(session));
            next.run(req).await
        }
        Decision::Deny => {
            debug!(path = %original_uri.path(), "request denied");
            unauthorized(&state.policy)
        }
    }
}

async fn resolve_bearer(state: &AppState, token: &str) -> Option<Arc<Session>> {
    match state.resolver.session_from_id_token(token) {
        Ok(session) => Some(Arc::new(session)),
        Err(OidcError::TokenMalformed) if state.policy.allow_access_token_auth => {
            match state.resolver.session_from_access_token(token).await {
                Ok(session) => Some(Arc::new(session)),
                Err(err) => {
                    warn!(error = %err, "access token authentication failed");
                    None
                }
            }
        }
        Err(err) => {
            warn!(error = %err, "id token authentication failed");
            None
        }
    }
}

fn unauthorized(policy: &AccessPolicy) -> Response {
    let mut response = AppError::Unauthorized.into_response();
    if let Ok(value) = HeaderValue::from_str(&policy.challenge()) {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, value);
    }
    response
}
