/*
 * Responsibility
 * - OpenID Connect HTTP surface (routes() / internal_routes() re-export)
 */
pub mod dto;
pub mod extractors;
pub mod handlers;
mod routes;

pub use routes::{internal_routes, routes};
