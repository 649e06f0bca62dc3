//! The hosting VM and the state it guards.
//!
//! A [`HostingVm`] owns every registry of host resources attached to one
//! utility VM: Plan 9 shares, SMB shares and SCSI disks. All of it lives
//! behind a single async mutex that is held for the full duration of each
//! operation, control-plane round trip included. Operations on one VM are
//! therefore totally ordered; separate VMs share nothing and proceed in
//! parallel.

use crate::config::{HostingVmBuilder, HostingVmConfig};
use crate::scsi::ScsiState;
use crate::shares::{ShareKind, ShareRegistry};
use hostvm_core::{
    ControlPlane, Error, GuestOs, GuestProcess, ModifyRequest, ProcessHandle, ProcessOptions,
    Result, VmRef,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, MutexGuard};

pub(crate) struct VmState {
    pub(crate) vsmb: ShareRegistry,
    pub(crate) plan9: ShareRegistry,
    pub(crate) scsi: ScsiState,
}

/// A running utility VM that hosts one or more containers.
///
/// Share it between container flows with an `Arc`.
pub struct HostingVm {
    config: HostingVmConfig,
    control_plane: Arc<dyn ControlPlane>,
    guest_process: Option<Arc<dyn GuestProcess>>,
    running: AtomicBool,
    state: Mutex<VmState>,
}

impl HostingVm {
    pub fn builder(guest_os: GuestOs) -> HostingVmBuilder {
        HostingVmBuilder::new(HostingVmConfig {
            guest_os,
            ..HostingVmConfig::default()
        })
    }

    pub fn from_config(config: HostingVmConfig) -> HostingVmBuilder {
        HostingVmBuilder::new(config)
    }

    pub(crate) fn new(
        config: HostingVmConfig,
        control_plane: Arc<dyn ControlPlane>,
        guest_process: Option<Arc<dyn GuestProcess>>,
    ) -> Self {
        let state = VmState {
            vsmb: ShareRegistry::new(ShareKind::Vsmb),
            plan9: ShareRegistry::new(ShareKind::Plan9),
            scsi: ScsiState::new(config.scsi_controllers),
        };
        Self {
            config,
            control_plane,
            guest_process,
            running: AtomicBool::new(true),
            state: Mutex::new(state),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn guest_os(&self) -> GuestOs {
        self.config.guest_os
    }

    pub fn config(&self) -> &HostingVmConfig {
        &self.config
    }

    pub fn vm_ref(&self) -> VmRef {
        VmRef {
            id: self.config.id.clone(),
            guest_os: self.config.guest_os,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_running(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(Error::NotRunning(self.config.id.clone()))
        }
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, VmState> {
        self.state.lock().await
    }

    /// Issues one modification, wrapping a failure with `operation`.
    pub(crate) async fn modify(&self, request: &ModifyRequest, operation: &str) -> Result<()> {
        tracing::trace!(vm = %self.config.id, %request, "modify");
        self.control_plane
            .modify(request)
            .await
            .map_err(|e| Error::ControlPlane {
                operation: format!("{operation} in {}", self.config.id),
                source: Box::new(e),
            })
    }

    /// Starts a process inside the guest.
    pub async fn create_process(&self, options: ProcessOptions) -> Result<Box<dyn ProcessHandle>> {
        self.ensure_running()?;
        let launcher = self.guest_process.as_ref().ok_or_else(|| {
            Error::UnsupportedFeature(format!(
                "process creation in {} (no guest process launcher)",
                self.config.id
            ))
        })?;
        launcher.start(&self.config.id, options).await
    }

    /// Marks the VM as terminated. New attachments are refused afterwards.
    ///
    /// Resources still attached are reported but left in the registries so
    /// their owners can release them.
    pub async fn terminate(&self) {
        let state = self.lock().await;
        let plan9 = state.plan9.len();
        let vsmb = state.vsmb.len();
        let scsi = state.scsi.attached_count();
        if plan9 + vsmb + scsi > 0 {
            tracing::warn!(
                vm = %self.config.id,
                plan9,
                vsmb,
                scsi,
                "terminating hosting VM with resources still attached"
            );
        }
        self.running.store(false, Ordering::SeqCst);
        tracing::debug!(vm = %self.config.id, "hosting VM terminated");
    }
}

impl std::fmt::Debug for HostingVm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostingVm")
            .field("id", &self.config.id)
            .field("guest_os", &self.config.guest_os)
            .field("running", &self.is_running())
            .finish()
    }
}
