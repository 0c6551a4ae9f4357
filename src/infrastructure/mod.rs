// Infrastructure - identity, credentials, audit trail and request middleware
pub mod actor;        // Request-scoped identity
pub mod audit;        // Activity log sinks
pub mod auth;         // Bearer token verification
pub mod middleware;   // Actor resolution for axum

pub use actor::{Actor, Role};
pub use audit::{AuditAction, AuditEvent, AuditLog, AuditSink, DatabaseAuditSink, TracingAuditSink};
pub use auth::{AuthFailure, AuthProvider, Claims, JwtAuthProvider};
