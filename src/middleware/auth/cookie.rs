//! Public endpoints: session from the session cookie, if any.
//!
//! Never rejects. A missing, undecodable or unknown cookie yields an
//! `AuthCtx` without a session and the handler decides what to do.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};
use axum_extra::extract::CookieJar;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use tracing::{debug, warn};

use crate::api::oidc::extractors::AuthCtx;
use crate::services::session::Session;
use crate::state::AppState;

pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state, cookie_middleware))
}

async fn cookie_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(req.headers());
    let session = match jar.get(&state.cookie_name) {
        Some(cookie) => session_from_cookie(&state, cookie.value()).await,
        None => None,
    };

    req.extensions_mut().insert(AuthCtx::new(session));
    next.run(req).await
}

async fn session_from_cookie(state: &AppState, value: &str) -> Option<Arc<Session>> {
    let Ok(cookie_id) = URL_SAFE_NO_PAD.decode(value.trim_end_matches('=')) else {
        debug!("undecodable session cookie");
        return None;
    };

    match state.sessions.get_by_cookie_id(&cookie_id).await {
        Ok(session) => session.map(Arc::new),
        Err(err) => {
            warn!(error = %err, "cookie session lookup failed");
            None
        }
    }
}
