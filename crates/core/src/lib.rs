pub mod backend;
pub mod error;
pub mod schema;
pub mod types;

pub use backend::{
    ControlPlane, GuestProcess, LayerMount, MountedLayers, ProcessExit, ProcessHandle,
    ProcessOptions, ProcessStdin, ProcessStdout, UnmountOperation, VmRef,
};
pub use error::{Error, Result};
pub use schema::{HostedSettings, ModifyRequest, PLAN9_PORT, RequestType, ResourceSettings, ResourceType};
pub use types::{
    ContainerRoot, ContainerSpec, GuestOs, LUNS_PER_CONTROLLER, MAX_SCSI_CONTROLLERS, MountSpec,
    Plan9Flags, RootSpec, ScsiSlot, ShareInfo, VsmbFlags,
};
