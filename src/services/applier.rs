//! In-process plan application
//!
//! Every command re-checks writability right before its write. A failed
//! precondition or write skips that command and is reported; earlier
//! writes are never rolled back.

use crate::services::planner::{WriteCommand, WritePlan};
use crate::sysfs::ControlFs;
use serde::Serialize;

/// A command that was not written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedCommand {
    pub command: WriteCommand,
    pub reason: String,
}

/// Outcome of applying one plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub card_index: u32,
    pub applied: Vec<WriteCommand>,
    pub failed: Vec<FailedCommand>,
}

impl ApplyReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// The commands that reached the hardware, as a plan
    pub fn applied_plan(&self) -> WritePlan {
        WritePlan {
            card_index: self.card_index,
            commands: self.applied.clone(),
            skipped: Vec::new(),
        }
    }
}

/// Applies write plans through a `ControlFs`
pub struct PlanApplier {
    dry_run: bool,
}

impl PlanApplier {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Write each command in order
    pub fn apply(&self, fs: &dyn ControlFs, plan: &WritePlan) -> ApplyReport {
        let mut report = ApplyReport {
            card_index: plan.card_index,
            ..Default::default()
        };

        for command in &plan.commands {
            if self.dry_run {
                log::info!("DRY RUN: Would write {}", command);
                report.applied.push(command.clone());
                continue;
            }

            if !fs.can_write(&command.path) {
                log::warn!(
                    "Skipping {}: {} is not writable",
                    command.param,
                    command.path.display()
                );
                report.failed.push(FailedCommand {
                    command: command.clone(),
                    reason: "not writable".to_string(),
                });
                continue;
            }

            match fs.write(&command.path, &command.value) {
                Ok(()) => {
                    log::debug!("Applied {}", command);
                    report.applied.push(command.clone());
                }
                Err(e) => {
                    log::warn!("Write of {} failed: {}", command.param, e);
                    report.failed.push(FailedCommand {
                        command: command.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Check if in dry-run mode
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}
