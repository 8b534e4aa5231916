//! Repository layer.
//!
//! Each repository is a zero-sized struct with async methods. Single-query
//! methods accept any executor (`&PgPool` or `&mut *tx`); methods that
//! issue several statements take `&mut PgConnection` so they run inside
//! the caller's transaction.

pub mod attachment_repo;
pub mod event_repo;
pub mod maintenance_request_repo;
pub mod readiness_repo;
pub mod replan_repo;
pub mod schedule_proposal_repo;
pub mod segment_repo;
pub mod service_run_repo;
pub mod stakeholder_repo;

pub use attachment_repo::AttachmentRepo;
pub use event_repo::EventRepo;
pub use maintenance_request_repo::MaintenanceRequestRepo;
pub use readiness_repo::{HandoffRepo, SnapshotRepo};
pub use replan_repo::{MonitorStateRepo, ReplanBundleRepo};
pub use schedule_proposal_repo::ScheduleProposalRepo;
pub use segment_repo::SegmentRepo;
pub use service_run_repo::ServiceRunRepo;
pub use stakeholder_repo::StakeholderRepo;
