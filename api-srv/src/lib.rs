//! keygate API server
//!
//! Routes, shared state and ambient plumbing of the `keygate-api-srv` binary.
//! Authentication itself lives in `keygate_auth`.

/// Router assembly
pub mod app;

/// Claims echo endpoint
pub mod claims;

/// OpenAPI document, Swagger UI and root redirect
pub mod docs;

/// Interactive login and logout endpoints
pub mod login;

/// Request logging middleware
pub mod observability;

/// Shared handler state
pub mod state;

/// Tracing subscriber setup
pub mod telemetry;
