/*
 * Responsibility
 * - GET /openidconnect/authorize (authorization code flow, response_type=code)
 * - Root session comes from the session cookie; none -> 401
 * - Derived session + single-use code, then 302 back to the client
 */
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::info;

use crate::api::oidc::dto::authorize::AuthorizeQuery;
use crate::api::oidc::extractors::AuthCtxExtractor;
use crate::error::AppError;
use crate::services::oidc::OidcError;
use crate::state::AppState;

pub async fn authorize(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Response, AppError> {
    if query.response_type != "code" {
        return Err(AppError::InvalidRequest(format!(
            "unsupported response_type: {}",
            query.response_type
        )));
    }

    let mut redirect = url::Url::parse(&query.redirect_uri)
        .map_err(|_| AppError::InvalidRequest("invalid redirect_uri".to_string()))?;

    let root = ctx.session().ok_or(OidcError::UnauthorizedAccess)?;
    let scope: Vec<String> = query.scope.split_whitespace().map(str::to_owned).collect();

    let session = state
        .issuer
        .create_derived_session(root, &query.client_id, &scope, None)
        .await?;
    let code = state
        .issuer
        .generate_authorization_code(session.id())
        .await?;

    {
        let mut pairs = redirect.query_pairs_mut();
        pairs.append_pair("code", &code);
        if let Some(client_state) = &query.state {
            pairs.append_pair("state", client_state);
        }
    }

    info!(client_id = %query.client_id, session_id = %session.id(), "authorization code granted");
    Ok((StatusCode::FOUND, [(header::LOCATION, redirect.to_string())]).into_response())
}
