/*
 * Responsibility
 * - access: bearer authentication + admission for private endpoints
 * - cookie: best-effort cookie session for public endpoints
 * - policy: the admission decision itself (no HTTP)
 */
pub mod access;
pub mod cookie;
pub mod policy;
