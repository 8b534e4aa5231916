//! HTTP handlers.
//!
//! Handlers extract path, query and body, call into [`crate::engine`] and
//! wrap results in the `{ "data": ... }` envelope.

pub mod attachment;
pub mod negotiation;
pub mod readiness;
pub mod risk;
pub mod service_run;
pub mod stakeholder;
