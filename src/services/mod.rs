pub mod cache;
pub mod oidc;
pub mod random;
pub mod scheduler;
pub mod session;
