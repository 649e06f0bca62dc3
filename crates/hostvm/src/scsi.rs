//! SCSI attachment slots for hot-added virtual disks.
//!
//! Slots are handed out first-free in controller-major order. A host path
//! can occupy at most one slot at a time; unlike shares, disks are not
//! ref-counted.

use crate::vm::HostingVm;
use hostvm_core::{Error, LUNS_PER_CONTROLLER, ModifyRequest, Result, ScsiSlot};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub(crate) struct SlotAllocator {
    controllers: u8,
    occupied: Vec<bool>,
}

impl SlotAllocator {
    pub(crate) fn new(controllers: u8) -> Self {
        Self {
            controllers,
            occupied: vec![false; usize::from(controllers) * usize::from(LUNS_PER_CONTROLLER)],
        }
    }

    fn index(slot: ScsiSlot) -> usize {
        usize::from(slot.controller) * usize::from(LUNS_PER_CONTROLLER) + usize::from(slot.lun)
    }

    pub(crate) fn allocate(&mut self) -> Option<ScsiSlot> {
        for controller in 0..self.controllers {
            for lun in 0..LUNS_PER_CONTROLLER {
                let slot = ScsiSlot::new(controller, lun);
                let index = Self::index(slot);
                if !self.occupied[index] {
                    self.occupied[index] = true;
                    return Some(slot);
                }
            }
        }
        None
    }

    pub(crate) fn free(&mut self, slot: ScsiSlot) {
        if let Some(occupied) = self.occupied.get_mut(Self::index(slot)) {
            *occupied = false;
        }
    }

    pub(crate) fn occupied_count(&self) -> usize {
        self.occupied.iter().filter(|o| **o).count()
    }
}

#[derive(Debug)]
struct ScsiDisk {
    slot: ScsiSlot,
    guest_path: String,
    read_only: bool,
}

pub(crate) struct ScsiState {
    slots: SlotAllocator,
    disks: HashMap<PathBuf, ScsiDisk>,
}

impl ScsiState {
    pub(crate) fn new(controllers: u8) -> Self {
        Self {
            slots: SlotAllocator::new(controllers),
            disks: HashMap::new(),
        }
    }

    pub(crate) fn attached_count(&self) -> usize {
        self.disks.len()
    }
}

fn not_found(host_path: &Path, vm: &str) -> Error {
    Error::NotFound {
        resource: "SCSI disk",
        host_path: host_path.to_path_buf(),
        vm: vm.to_string(),
    }
}

impl HostingVm {
    /// Hot-adds the virtual disk at `host_path` to the first free SCSI slot,
    /// mounted in the guest at `guest_path`.
    pub async fn attach_scsi(
        &self,
        host_path: impl AsRef<Path>,
        guest_path: &str,
        read_only: bool,
    ) -> Result<ScsiSlot> {
        let host_path = host_path.as_ref();
        let mut state = self.lock().await;
        self.ensure_running()?;

        if state.scsi.disks.contains_key(host_path) {
            return Err(Error::AlreadyAttached {
                host_path: host_path.to_path_buf(),
                vm: self.id().to_string(),
            });
        }
        let slot = state.scsi.slots.allocate().ok_or_else(|| Error::NoAvailableSlot {
            vm: self.id().to_string(),
        })?;

        let request =
            ModifyRequest::add_scsi_disk(slot, host_path.to_path_buf(), guest_path, read_only);
        if let Err(e) = self.modify(&request, &format!("add SCSI disk at {slot}")).await {
            state.scsi.slots.free(slot);
            return Err(e);
        }

        state.scsi.disks.insert(
            host_path.to_path_buf(),
            ScsiDisk {
                slot,
                guest_path: guest_path.to_string(),
                read_only,
            },
        );
        tracing::debug!(vm = %self.id(), host_path = %host_path.display(), %slot, "SCSI disk attached");
        Ok(slot)
    }

    /// Hot-removes the virtual disk at `host_path`. The slot stays occupied
    /// if the guest does not acknowledge the removal.
    pub async fn detach_scsi(&self, host_path: impl AsRef<Path>) -> Result<()> {
        let host_path = host_path.as_ref();
        let mut state = self.lock().await;

        let disk = state
            .scsi
            .disks
            .get(host_path)
            .ok_or_else(|| not_found(host_path, self.id()))?;
        let slot = disk.slot;
        let request = ModifyRequest::remove_scsi_disk(
            slot,
            host_path.to_path_buf(),
            &disk.guest_path,
            disk.read_only,
        );
        self.modify(&request, &format!("remove SCSI disk at {slot}"))
            .await?;

        state.scsi.disks.remove(host_path);
        state.scsi.slots.free(slot);
        tracing::debug!(vm = %self.id(), host_path = %host_path.display(), %slot, "SCSI disk detached");
        Ok(())
    }

    pub async fn scsi_slot(&self, host_path: impl AsRef<Path>) -> Result<ScsiSlot> {
        let host_path = host_path.as_ref();
        let state = self.lock().await;
        state
            .scsi
            .disks
            .get(host_path)
            .map(|disk| disk.slot)
            .ok_or_else(|| not_found(host_path, self.id()))
    }

    /// Number of SCSI slots currently holding a disk.
    pub async fn scsi_slots_in_use(&self) -> usize {
        self.lock().await.scsi.slots.occupied_count()
    }
}
