//! Unified error types for amdgpu-pac
//!
//! This module defines all error types used throughout the application.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from the sysfs backend
    #[error("Sysfs error: {0}")]
    Sysfs(#[from] SysfsError),

    /// Error from configuration parsing/validation
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error from domain type validation
    #[error("Domain validation error: {0}")]
    Domain(#[from] DomainError),

    /// Control file content could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Card not found by index
    #[error("GPU card not found: {0}")]
    CardNotFound(u32),

    /// No compatible GPUs detected in the system
    #[error("No compatible AMD GPUs detected")]
    NoCompatibleDevices,

    /// A poll cycle held the collection when exclusive access was needed
    #[error("Poll cycle already in progress")]
    PollBusy,

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from sysfs file access
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SysfsError {
    /// The control file does not exist
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// The process lacks permission for the requested access
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The read did not complete in time
    #[error("Read timed out: {0}")]
    Timeout(PathBuf),

    /// Any other IO failure
    #[error("IO error on {path}: {message}")]
    Io { path: PathBuf, message: String },
}

impl SysfsError {
    /// Build a sysfs error from an IO error on a path
    pub fn from_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            std::io::ErrorKind::NotFound => SysfsError::NotFound(path),
            std::io::ErrorKind::PermissionDenied => SysfsError::PermissionDenied(path),
            _ => SysfsError::Io {
                path,
                message: err.to_string(),
            },
        }
    }
}

/// Errors from parsing control file contents
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A value was missing or had the wrong shape
    #[error("Could not parse {what} from '{text}'")]
    InvalidValue { what: &'static str, text: String },

    /// A line of a multi-line table was malformed
    #[error("Malformed line {line}: {message}")]
    MalformedLine { line: usize, message: String },

    /// The driver reported the "not available" sentinel
    #[error("Value not available")]
    NotAvailable,
}

/// Errors from domain type validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid fan PWM value (must be 0-100)
    #[error("Invalid fan PWM: {0}% (must be 0-100)")]
    InvalidFanPwm(u8),

    /// Power cap outside the device's reported range
    #[error("Invalid power cap: {value}W (valid range: {min}-{max}W)")]
    InvalidPowerCap { value: u32, min: u32, max: u32 },

    /// Clock outside the device's OD range
    #[error("Invalid {domain} clock: {value}MHz (valid range: {min}-{max}MHz)")]
    InvalidClock {
        domain: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    /// Voltage outside the device's OD range
    #[error("Invalid voltage: {value}mV (valid range: {min}-{max}mV)")]
    InvalidVoltage { value: u32, min: u32, max: u32 },

    /// P-state mask must name at least one state
    #[error("P-state mask must enable at least one state")]
    EmptyMask,

    /// A value had the wrong semantic kind for its parameter
    #[error("Parameter '{param}' expects a {expected} value")]
    KindMismatch {
        param: &'static str,
        expected: &'static str,
    },

    /// Invalid value provided
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Errors from configuration parsing and validation
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// Invalid config value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Errors from service operations
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Sysfs operation failed
    #[error("Sysfs operation failed: {0}")]
    Sysfs(#[from] SysfsError),

    /// Domain validation failed
    #[error("Validation failed: {0}")]
    Domain(#[from] DomainError),

    /// Control file content was unusable
    #[error("Parse failed: {0}")]
    Parse(#[from] ParseError),

    /// Poll cycle already running
    #[error("Poll cycle already in progress")]
    Busy,
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Sysfs(e) => AppError::Sysfs(e),
            ServiceError::Domain(e) => AppError::Domain(e),
            ServiceError::Parse(e) => AppError::Parse(e),
            ServiceError::Busy => AppError::PollBusy,
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_display() {
        let err = DomainError::InvalidFanPwm(150);
        assert_eq!(err.to_string(), "Invalid fan PWM: 150% (must be 0-100)");
    }

    #[test]
    fn test_power_cap_error_display() {
        let err = DomainError::InvalidPowerCap {
            value: 500,
            min: 100,
            max: 300,
        };
        assert!(err.to_string().contains("500W"));
        assert!(err.to_string().contains("100-300W"));
    }

    #[test]
    fn test_sysfs_error_from_io() {
        let err = SysfsError::from_io(
            "/sys/x",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope"),
        );
        assert_eq!(err, SysfsError::PermissionDenied(PathBuf::from("/sys/x")));

        let err = SysfsError::from_io(
            "/sys/y",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, SysfsError::NotFound(_)));
    }

    #[test]
    fn test_error_conversion() {
        let domain_err = DomainError::InvalidFanPwm(120);
        let app_err: AppError = domain_err.into();
        assert!(matches!(app_err, AppError::Domain(_)));
    }
}
