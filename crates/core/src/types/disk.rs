use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound on SCSI controllers a hosting VM can be configured with.
pub const MAX_SCSI_CONTROLLERS: u8 = 4;

/// Attachment points on each SCSI controller.
pub const LUNS_PER_CONTROLLER: u8 = 64;

/// A `(controller, lun)` attachment point for a hot-added virtual disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScsiSlot {
    pub controller: u8,
    pub lun: u8,
}

impl ScsiSlot {
    pub fn new(controller: u8, lun: u8) -> Self {
        Self { controller, lun }
    }
}

impl fmt::Display for ScsiSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.controller, self.lun)
    }
}
