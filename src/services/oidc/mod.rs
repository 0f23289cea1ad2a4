//! OpenID Connect core: codes, derived sessions, token resolution, UserInfo.
pub mod auth_code;
pub mod error;
pub mod id_token;
pub mod issuer;
pub mod keys;
pub mod resolver;
pub mod userinfo;

pub use error::OidcError;
