use crate::vm::HostingVm;
use hostvm_core::{ControlPlane, Error, GuestOs, GuestProcess, MAX_SCSI_CONTROLLERS, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Argument vector of the in-guest tar-to-VHD converter.
pub const DEFAULT_CONVERTER_ARGS: &[&str] = &["tar2vhd"];

/// Static description of a hosting VM.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostingVmConfig {
    pub id: String,
    pub guest_os: GuestOs,
    pub scsi_controllers: u8,
    pub converter_args: Vec<String>,
}

impl Default for HostingVmConfig {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            guest_os: GuestOs::Linux,
            scsi_controllers: 1,
            converter_args: DEFAULT_CONVERTER_ARGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl HostingVmConfig {
    fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::InvalidConfig("hosting VM id cannot be empty".into()));
        }
        if self.scsi_controllers == 0 || self.scsi_controllers > MAX_SCSI_CONTROLLERS {
            return Err(Error::InvalidConfig(format!(
                "scsi_controllers must be between 1 and {MAX_SCSI_CONTROLLERS}, got {}",
                self.scsi_controllers
            )));
        }
        if self.converter_args.is_empty() {
            return Err(Error::InvalidConfig(
                "converter_args must name a program".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`HostingVm`].
///
/// # Example
///
/// ```rust,ignore
/// let vm = HostingVm::builder(GuestOs::Linux)
///     .id("uvm-1")
///     .control_plane(control_plane)
///     .guest_process(launcher)
///     .build()?;
/// ```
pub struct HostingVmBuilder {
    config: HostingVmConfig,
    control_plane: Option<Arc<dyn ControlPlane>>,
    guest_process: Option<Arc<dyn GuestProcess>>,
}

impl HostingVmBuilder {
    pub(crate) fn new(config: HostingVmConfig) -> Self {
        Self {
            config,
            control_plane: None,
            guest_process: None,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.config.id = id.into();
        self
    }

    /// Number of SCSI controllers available for hot-added disks (1-4).
    pub fn scsi_controllers(mut self, count: u8) -> Self {
        self.config.scsi_controllers = count;
        self
    }

    pub fn converter_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.config.converter_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn control_plane(mut self, control_plane: Arc<dyn ControlPlane>) -> Self {
        self.control_plane = Some(control_plane);
        self
    }

    /// Launcher for processes inside the guest. Without one, process
    /// creation fails with [`Error::UnsupportedFeature`].
    pub fn guest_process(mut self, guest_process: Arc<dyn GuestProcess>) -> Self {
        self.guest_process = Some(guest_process);
        self
    }

    pub fn build(self) -> Result<HostingVm> {
        self.config.validate()?;
        let control_plane = self
            .control_plane
            .ok_or_else(|| Error::MissingConfig("control plane".into()))?;
        Ok(HostingVm::new(self.config, control_plane, self.guest_process))
    }
}
