pub mod audit_repo;
pub mod auth_code_repo;
pub mod credentials_repo;
pub mod error;
pub mod session_repo;
pub mod tenant_repo;

#[cfg(test)]
pub mod memory;
