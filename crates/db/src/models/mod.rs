//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - `FromRow` + `Serialize` entity structs matching database rows
//! - `Deserialize` create DTOs for inserts
//! - `Deserialize` update DTOs (all `Option` fields) for patches

pub mod event;
pub mod maintenance_request;
pub mod readiness;
pub mod risk;
pub mod schedule_proposal;
pub mod service_run;
pub mod stakeholder;
