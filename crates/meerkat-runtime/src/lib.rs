//! Action dispatch for the Meerkat automation gateway.
//!
//! - [`action`] decodes and validates request bodies.
//! - [`adapter`] is the seam to the database backend.
//! - [`dispatcher`] runs one action per request and shapes the response.
//! - [`audit`] records the outcome of every request.

pub mod action;
pub mod adapter;
pub mod audit;
pub mod dispatcher;

#[cfg(any(test, feature = "memory"))]
pub mod memory;

pub use action::{Action, ActionRequest, SessionAction};
pub use adapter::{SchemaAdmin, SchemaSession};
pub use audit::{AuditEvent, AuditOutcome, AuditSink, RecordingAuditSink, TracingAuditSink};
pub use dispatcher::Dispatcher;
