use std::path::PathBuf;

use thiserror::Error;

use crate::repos::error::RepoError;

/// Failures of the session issuance and token resolution core.
///
/// Token/credential resolution errors never leave the authentication phase;
/// code errors reach the code-exchange caller as an invalid grant.
#[derive(Debug, Error)]
pub enum OidcError {
    #[error("token is malformed")]
    TokenMalformed,

    #[error("token expired")]
    TokenExpired,

    #[error("invalid token signature")]
    TokenInvalidSignature,

    #[error("authorization code not found")]
    CodeNotFound,

    #[error("authorization code expired")]
    CodeExpired,

    #[error("session not found")]
    SessionNotFound,

    #[error("credentials not found: {0}")]
    CredentialsNotFound(String),

    // Recovered from by falling back to the global tenant.
    #[error("unknown tenant: {0:?}")]
    TenantUnknown(Option<String>),

    #[error("unauthorized access")]
    UnauthorizedAccess,

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("private key file {0:?} does not exist; run in provisioning mode to generate one")]
    KeyMaterialMissing(PathBuf),

    #[error("invalid key material: {0}")]
    KeyMaterialInvalid(String),

    #[error("random source failure")]
    Random(#[from] getrandom::Error),

    #[error(transparent)]
    Store(#[from] RepoError),
}
