//! In-memory collaborators for exercising hosting VMs without a hypervisor.
//!
//! ```rust,ignore
//! let control_plane = Arc::new(RecordingControlPlane::new());
//! let vm = test_vm(GuestOs::Linux, control_plane.clone());
//! vm.add_plan9("/host/data", "/run/gcs/c/1/m0", Plan9Flags::NONE).await?;
//! assert_eq!(control_plane.count(ResourceType::Plan9Share, RequestType::Add), 1);
//! ```

use crate::vm::HostingVm;
use async_trait::async_trait;
use hostvm_core::{
    ControlPlane, Error, GuestOs, GuestProcess, LayerMount, ModifyRequest, MountedLayers,
    ProcessExit, ProcessHandle, ProcessOptions, ProcessStdin, ProcessStdout, RequestType,
    ResourceType, Result, UnmountOperation, VmRef,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Builds a running hosting VM on top of `control_plane`.
pub fn test_vm(guest_os: GuestOs, control_plane: Arc<dyn ControlPlane>) -> HostingVm {
    test_vm_builder(guest_os, control_plane)
        .build()
        .unwrap_or_else(|e| panic!("test VM config is valid: {e}"))
}

/// Same as [`test_vm`] but with a guest process launcher attached.
pub fn test_vm_with_process(
    guest_os: GuestOs,
    control_plane: Arc<dyn ControlPlane>,
    guest_process: Arc<dyn GuestProcess>,
) -> HostingVm {
    test_vm_builder(guest_os, control_plane)
        .guest_process(guest_process)
        .build()
        .unwrap_or_else(|e| panic!("test VM config is valid: {e}"))
}

fn test_vm_builder(
    guest_os: GuestOs,
    control_plane: Arc<dyn ControlPlane>,
) -> crate::HostingVmBuilder {
    HostingVm::builder(guest_os)
        .id(format!("uvm-test-{guest_os}"))
        .control_plane(control_plane)
}

type Matcher = Box<dyn Fn(&ModifyRequest) -> bool + Send + Sync>;

struct FailureRule {
    matcher: Matcher,
    /// `None` fails every matching request.
    remaining: Option<usize>,
}

/// Control plane that records every request and fails the ones it is told to.
#[derive(Default)]
pub struct RecordingControlPlane {
    requests: Mutex<Vec<ModifyRequest>>,
    rules: Mutex<Vec<FailureRule>>,
    delay: Option<Duration>,
}

impl RecordingControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps for `delay` before acknowledging each request.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Fails every request matching `matcher`.
    pub fn fail_when(&self, matcher: impl Fn(&ModifyRequest) -> bool + Send + Sync + 'static) {
        self.push_rule(Box::new(matcher), None);
    }

    /// Fails the next `times` requests matching `matcher`.
    pub fn fail_times(
        &self,
        times: usize,
        matcher: impl Fn(&ModifyRequest) -> bool + Send + Sync + 'static,
    ) {
        self.push_rule(Box::new(matcher), Some(times));
    }

    pub fn clear_failures(&self) {
        lock(&self.rules).clear();
    }

    fn push_rule(&self, matcher: Matcher, remaining: Option<usize>) {
        lock(&self.rules).push(FailureRule { matcher, remaining });
    }

    /// Every request received so far, failed ones included.
    pub fn requests(&self) -> Vec<ModifyRequest> {
        lock(&self.requests).clone()
    }

    pub fn count(&self, resource_type: ResourceType, request_type: RequestType) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|r| r.resource_type == resource_type && r.request_type == request_type)
            .count()
    }

    fn should_fail(&self, request: &ModifyRequest) -> bool {
        let mut rules = lock(&self.rules);
        for rule in rules.iter_mut() {
            if !(rule.matcher)(request) {
                continue;
            }
            match rule.remaining.as_mut() {
                None => return true,
                Some(0) => continue,
                Some(n) => {
                    *n -= 1;
                    return true;
                }
            }
        }
        false
    }
}

#[async_trait]
impl ControlPlane for RecordingControlPlane {
    async fn modify(&self, request: &ModifyRequest) -> Result<()> {
        lock(&self.requests).push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.should_fail(request) {
            return Err(Error::Transport(format!("injected failure: {request}")));
        }
        Ok(())
    }
}

/// Matches requests of one resource and request type.
pub fn request_of(
    resource_type: ResourceType,
    request_type: RequestType,
) -> impl Fn(&ModifyRequest) -> bool + Send + Sync + 'static {
    move |r| r.resource_type == resource_type && r.request_type == request_type
}

/// A call observed by [`RecordingLayerMount`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerCall {
    Mount {
        layers: Vec<PathBuf>,
        guest_root: String,
        vm: Option<String>,
    },
    Unmount {
        layers: Vec<PathBuf>,
        vm: Option<String>,
        op: UnmountOperation,
    },
}

/// Layer mounter that composes nothing and records what it was asked.
///
/// Mounting without a VM yields `<guest_root>/rootfs` as a host path;
/// with a VM it yields the same path as a guest combined root.
#[derive(Default)]
pub struct RecordingLayerMount {
    calls: Mutex<Vec<LayerCall>>,
    fail_mount: AtomicBool,
    fail_unmount: AtomicBool,
}

impl RecordingLayerMount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_mount(&self, fail: bool) {
        self.fail_mount.store(fail, Ordering::SeqCst);
    }

    pub fn fail_unmount(&self, fail: bool) {
        self.fail_unmount.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<LayerCall> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl LayerMount for RecordingLayerMount {
    async fn mount(
        &self,
        layer_folders: &[PathBuf],
        guest_root: &str,
        vm: Option<&VmRef>,
    ) -> Result<MountedLayers> {
        lock(&self.calls).push(LayerCall::Mount {
            layers: layer_folders.to_vec(),
            guest_root: guest_root.to_string(),
            vm: vm.map(|v| v.id.clone()),
        });
        if self.fail_mount.load(Ordering::SeqCst) {
            return Err(Error::Transport("injected layer mount failure".into()));
        }
        let root = format!("{}/rootfs", guest_root.trim_end_matches('/'));
        Ok(match vm {
            None => MountedLayers::HostRootPath(PathBuf::from(root)),
            Some(_) => MountedLayers::GuestCombinedRoot {
                container_root_path: root,
            },
        })
    }

    async fn unmount(
        &self,
        layer_folders: &[PathBuf],
        vm: Option<&VmRef>,
        op: UnmountOperation,
    ) -> Result<()> {
        lock(&self.calls).push(LayerCall::Unmount {
            layers: layer_folders.to_vec(),
            vm: vm.map(|v| v.id.clone()),
            op,
        });
        if self.fail_unmount.load(Ordering::SeqCst) {
            return Err(Error::Transport("injected layer unmount failure".into()));
        }
        Ok(())
    }
}

/// Guest process launcher whose processes copy stdin to stdout and exit.
#[derive(Default)]
pub struct EchoProcess {
    fail_start: AtomicBool,
    exit_code: AtomicI32,
    starts: AtomicUsize,
    closes: Arc<AtomicUsize>,
    last_args: Mutex<Vec<String>>,
}

impl EchoProcess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Exit code reported once the copy finishes.
    pub fn exit_code(&self, code: i32) {
        self.exit_code.store(code, Ordering::SeqCst);
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn last_args(&self) -> Vec<String> {
        lock(&self.last_args).clone()
    }
}

#[async_trait]
impl GuestProcess for EchoProcess {
    async fn start(&self, vm_id: &str, options: ProcessOptions) -> Result<Box<dyn ProcessHandle>> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_args) = options.args.clone();
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(Error::GuestProcess(format!(
                "injected start failure in {vm_id}"
            )));
        }

        let mut stdin: ProcessStdin = options
            .stdin
            .unwrap_or_else(|| Box::new(tokio::io::empty()));
        let mut stdout: ProcessStdout = options
            .stdout
            .unwrap_or_else(|| Box::new(tokio::io::sink()));
        let relay = tokio::spawn(async move {
            let copied = tokio::io::copy(&mut stdin, &mut stdout).await?;
            stdout.shutdown().await?;
            Ok::<_, std::io::Error>(copied)
        });

        Ok(Box::new(EchoHandle {
            relay: Some(relay),
            exit_code: self.exit_code.load(Ordering::SeqCst),
            closes: self.closes.clone(),
        }))
    }
}

struct EchoHandle {
    relay: Option<JoinHandle<std::io::Result<u64>>>,
    exit_code: i32,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl ProcessHandle for EchoHandle {
    async fn wait(&mut self) -> Result<ProcessExit> {
        let relay = self
            .relay
            .take()
            .ok_or_else(|| Error::GuestProcess("process already waited on".into()))?;
        let copied = relay
            .await
            .map_err(|e| Error::GuestProcess(format!("stdio relay panicked: {e}")))??;
        Ok(ProcessExit {
            exit_code: self.exit_code,
            bytes_in: copied,
            bytes_out: copied,
        })
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(relay) = self.relay.take() {
            relay.abort();
        }
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
