//! Collaborators a hosting VM relies on but does not implement.

use crate::error::Result;
use crate::schema::ModifyRequest;
use crate::types::GuestOs;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncWrite};

/// Sends a modification to a hosting VM and waits for the guest to
/// acknowledge it.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn modify(&self, request: &ModifyRequest) -> Result<()>;
}

/// Identity of a hosting VM as seen by collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmRef {
    pub id: String,
    pub guest_os: GuestOs,
}

/// Result of composing a container's layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountedLayers {
    /// Layers were composed on the host (no hosting VM).
    HostRootPath(PathBuf),
    /// Layers were composed inside the hosting VM.
    GuestCombinedRoot { container_root_path: String },
}

/// Which attachments an unmount should tear down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmountOperation {
    /// Only the scratch disk attached to the hosting VM.
    Scsi,
    /// Everything the mount attached.
    All,
}

/// Composes read-only layers and a scratch layer into a single root.
#[async_trait]
pub trait LayerMount: Send + Sync {
    async fn mount(
        &self,
        layer_folders: &[PathBuf],
        guest_root: &str,
        vm: Option<&VmRef>,
    ) -> Result<MountedLayers>;

    async fn unmount(
        &self,
        layer_folders: &[PathBuf],
        vm: Option<&VmRef>,
        op: UnmountOperation,
    ) -> Result<()>;
}

pub type ProcessStdin = Box<dyn AsyncRead + Send + Unpin>;
pub type ProcessStdout = Box<dyn AsyncWrite + Send + Unpin>;

/// How to launch a process inside a hosting VM.
pub struct ProcessOptions {
    pub args: Vec<String>,
    pub stdin: Option<ProcessStdin>,
    pub stdout: Option<ProcessStdout>,
}

impl ProcessOptions {
    pub fn new(args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            stdin: None,
            stdout: None,
        }
    }

    pub fn stdin(mut self, stdin: impl AsyncRead + Send + Unpin + 'static) -> Self {
        self.stdin = Some(Box::new(stdin));
        self
    }

    pub fn stdout(mut self, stdout: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        self.stdout = Some(Box::new(stdout));
        self
    }
}

/// Exit status and relayed byte counts of a guest process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessExit {
    pub exit_code: i32,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

#[async_trait]
pub trait ProcessHandle: Send {
    /// Waits for the process to exit and its stdio relays to drain.
    async fn wait(&mut self) -> Result<ProcessExit>;
    async fn close(&mut self) -> Result<()>;
}

/// Starts processes inside a hosting VM.
#[async_trait]
pub trait GuestProcess: Send + Sync {
    async fn start(&self, vm_id: &str, options: ProcessOptions) -> Result<Box<dyn ProcessHandle>>;
}
