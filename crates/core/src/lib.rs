//! Domain logic for the N3 service run coordination engine.
//!
//! Everything in this crate is pure: constants, validation, state machines
//! and the drift / risk / eligibility computations. Callers load rows from
//! the database and pass plain values in, which keeps every rule unit
//! testable without PostgreSQL.

pub mod drift;
pub mod eligibility;
pub mod error;
pub mod lifecycle;
pub mod pagination;
pub mod policy;
pub mod readiness;
pub mod risk;
pub mod schedule_proposal;
pub mod snapshot;
pub mod stakeholder;
pub mod types;
