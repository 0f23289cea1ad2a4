use serde::Deserialize;

/// Query of `GET /openidconnect/authorize`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeQuery {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    // Space-separated
    #[serde(default)]
    pub scope: String,
    pub state: Option<String>,
}
