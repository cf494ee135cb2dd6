//! amdgpu-pac - AMD GPU sysfs state engine
//!
//! This library discovers AMD GPUs through sysfs, reads their sensors and
//! p-state tables into a typed model, and plans and applies writes to the
//! amdgpu control files.
//!
//! # Modules
//!
//! - [`cli`]: Command-line interface definitions
//! - [`commands`]: Command handlers
//! - [`config`]: Configuration system
//! - [`discovery`]: Device enumeration and capability classification
//! - [`domain`]: Device model, parameters and p-state tables
//! - [`error`]: Error types
//! - [`parse`]: Parsers for control file formats
//! - [`services`]: Reading, planning, applying and polling
//! - [`sysfs`]: Control file access

pub mod cli;
pub mod commands;
pub mod config;
pub mod discovery;
pub mod domain;
pub mod error;
pub mod parse;
pub mod services;
pub mod sysfs;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::{AppError, Result};
