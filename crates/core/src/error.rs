use crate::types::GuestOs;
use std::path::PathBuf;

/// Errors that can occur when managing hosting-VM resources.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("missing required configuration: {0}")]
    MissingConfig(String),

    #[error("feature not supported: {0}")]
    UnsupportedFeature(String),

    #[error("{resource} is not supported on {guest_os} guests")]
    UnsupportedGuestOs {
        resource: &'static str,
        guest_os: GuestOs,
    },

    #[error("{host_path:?} is not present as a {resource} in {vm}")]
    NotFound {
        resource: &'static str,
        host_path: PathBuf,
        vm: String,
    },

    #[error("hosting VM {0} is not running")]
    NotRunning(String),

    #[error("{host_path:?} is already attached to {vm}")]
    AlreadyAttached { host_path: PathBuf, vm: String },

    #[error("no available SCSI slot in {vm}")]
    NoAvailableSlot { vm: String },

    #[error("{operation} failed: {source}")]
    ControlPlane {
        operation: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{} resource(s) failed to release: {}", .0.len(), join_errors(.0))]
    PartialTeardown(Vec<Error>),

    #[error("guest process error: {0}")]
    GuestProcess(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Malformed input from the caller. Never worth retrying.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Error::InvalidConfig(_) | Error::MissingConfig(_))
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedFeature(_) | Error::UnsupportedGuestOs { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, Error>;
