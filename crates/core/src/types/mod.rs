mod disk;
mod mount;
mod share;

pub use disk::{LUNS_PER_CONTROLLER, MAX_SCSI_CONTROLLERS, ScsiSlot};
pub use mount::{ContainerRoot, ContainerSpec, MountSpec, RootSpec};
pub use share::{Plan9Flags, ShareInfo, VsmbFlags};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating system running inside the hosting VM.
///
/// Decides which share kind the VM can expose: Plan 9 for Linux guests, SMB
/// for Windows guests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuestOs {
    Linux,
    Windows,
}

impl fmt::Display for GuestOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuestOs::Linux => f.write_str("linux"),
            GuestOs::Windows => f.write_str("windows"),
        }
    }
}
