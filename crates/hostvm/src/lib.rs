//! Resource lifecycle for containers hosted in utility VMs.
//!
//! A hosting VM runs one or more containers. Before a container starts, the
//! host folders and disks it needs are attached to the hosting VM; when it
//! exits they are detached again. This crate keeps the bookkeeping that makes
//! that safe when many containers share one VM:
//!
//! - folder shares are ref-counted per host path, so two containers mounting
//!   the same folder share one attachment
//! - SCSI disks are placed in the first free controller/LUN slot
//! - [`allocate`] records everything it attaches in a [`Resources`] manifest,
//!   which [`release_resources`] unwinds
//! - [`tar_to_vhd`] converts a tar stream into a fixed VHD inside the guest
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use hostvm::{allocate, release_resources, GuestOs, HostingVm, Resources};
//!
//! let vm = HostingVm::builder(GuestOs::Linux)
//!     .id("uvm-1")
//!     .control_plane(control_plane)
//!     .build()?;
//!
//! let mut resources = Resources::new("/run/gcs/c/abc");
//! let root = allocate(&mut spec, &mut resources, Some(&vm), &layer_mount).await?;
//! // ... run the container at `root` ...
//! release_resources(&mut resources, Some(&vm), false, &layer_mount).await?;
//! ```
//!
//! The hypervisor itself stays outside the crate: attachments go through a
//! [`ControlPlane`], layer composition through a [`LayerMount`] and guest
//! processes through a [`GuestProcess`].

mod allocate;
mod config;
mod convert;
mod resources;
mod scsi;
mod shares;
mod vm;

#[cfg(feature = "test-utils")]
pub mod test_utils;

// ============================================================================
// Core API
// ============================================================================

pub use allocate::allocate;
pub use config::{DEFAULT_CONVERTER_ARGS, HostingVmBuilder, HostingVmConfig};
pub use convert::tar_to_vhd;
pub use resources::{Resources, release_resources};
pub use shares::VSMB_GUEST_PREFIX;
pub use vm::HostingVm;

// Container description
pub use hostvm_core::{ContainerRoot, ContainerSpec, GuestOs, MountSpec, RootSpec};

// Shares and disks
pub use hostvm_core::{LUNS_PER_CONTROLLER, MAX_SCSI_CONTROLLERS, Plan9Flags, ScsiSlot, ShareInfo, VsmbFlags};

// Errors
pub use hostvm_core::{Error, Result};

// ============================================================================
// Collaborators - Implemented by the embedding runtime
// ============================================================================

pub use hostvm_core::{
    ControlPlane, GuestProcess, LayerMount, MountedLayers, ProcessExit, ProcessHandle,
    ProcessOptions, UnmountOperation, VmRef,
};

/// Wire format of control-plane modifications.
pub mod schema {
    pub use hostvm_core::schema::*;
}
