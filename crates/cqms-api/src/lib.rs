//! Session handling, the query lifecycle controller, dashboard aggregates,
//! and the HTTP handlers that expose them.

pub mod auth;
pub mod capability;
pub mod dashboard;
pub mod error;
pub mod extract;
pub mod lifecycle;
pub mod middleware;
pub mod queries;
pub mod router;
pub mod session;
pub mod summary;
pub mod validation;
