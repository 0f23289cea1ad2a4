pub mod authorize;
pub mod credentials;
pub mod health;
pub mod public_keys;
pub mod token;
pub mod userinfo;
