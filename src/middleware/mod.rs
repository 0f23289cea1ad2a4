/*
 * Responsibility
 * - auth: request authentication / admission (private + cookie paths)
 * - http: transport-level layers (request id, tracing, limits, timeout)
 */
pub mod auth;
pub mod http;
