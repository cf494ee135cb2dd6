//! Service layer for the sysfs state engine
//!
//! Services hold the logic between the device model and the control
//! files: reading and scaling values, planning and applying writes, the
//! poll loop and its snapshots, and rendering log rows and scripts.

pub mod applier;
pub mod log_record;
pub mod planner;
pub mod poller;
pub mod reader;
pub mod script;
pub mod snapshot;

pub use applier::{ApplyReport, FailedCommand, PlanApplier};
pub use planner::{apply_to_model, plan_write, SkippedTarget, WriteAction, WriteCommand, WritePlan};
pub use poller::{PollConfig, Poller, TickReport};
pub use reader::{read, read_params, read_ppm, read_pstates, ReadReport};
pub use script::{render_script, save_script};
pub use snapshot::{CollectionSnapshot, SnapshotSlot};
