//! Sysfs abstraction layer
//!
//! Provides trait-based abstractions over the kernel's control files for
//! testability.

pub mod fs;
pub mod traits;

pub use fs::SysFs;
pub use traits::ControlFs;
