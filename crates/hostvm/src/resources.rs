//! Per-container resource manifest and its release.

use crate::vm::HostingVm;
use hostvm_core::{Error, LayerMount, Result, UnmountOperation};
use std::future::Future;
use std::path::PathBuf;

/// Everything attached on behalf of one container.
///
/// Allocation appends to the manifest as each resource is attached; release
/// drains it. An entry leaves the manifest only once it has been released,
/// so a manifest is never released twice and a failed release can be retried
/// with whatever is left.
#[derive(Debug, Default)]
pub struct Resources {
    guest_root: String,
    layers: Vec<PathBuf>,
    plan9_mounts: Vec<PathBuf>,
    vsmb_mounts: Vec<PathBuf>,
    scsi_mounts: Vec<PathBuf>,
}

impl Resources {
    /// Starts an empty manifest for a container whose guest-side files live
    /// under `guest_root`.
    pub fn new(guest_root: impl Into<String>) -> Self {
        Self {
            guest_root: guest_root.into(),
            ..Self::default()
        }
    }

    pub fn guest_root(&self) -> &str {
        &self.guest_root
    }

    pub fn layers(&self) -> &[PathBuf] {
        &self.layers
    }

    pub fn plan9_mounts(&self) -> &[PathBuf] {
        &self.plan9_mounts
    }

    pub fn vsmb_mounts(&self) -> &[PathBuf] {
        &self.vsmb_mounts
    }

    pub fn scsi_mounts(&self) -> &[PathBuf] {
        &self.scsi_mounts
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
            && self.plan9_mounts.is_empty()
            && self.vsmb_mounts.is_empty()
            && self.scsi_mounts.is_empty()
    }

    pub(crate) fn set_layers(&mut self, layers: Vec<PathBuf>) {
        self.layers = layers;
    }

    pub(crate) fn push_plan9(&mut self, host_path: PathBuf) {
        self.plan9_mounts.push(host_path);
    }

    pub(crate) fn push_vsmb(&mut self, host_path: PathBuf) {
        self.vsmb_mounts.push(host_path);
    }

    pub(crate) fn push_scsi(&mut self, host_path: PathBuf) {
        self.scsi_mounts.push(host_path);
    }
}

/// Failure bookkeeping for one release pass.
struct Teardown {
    force: bool,
    failures: Vec<Error>,
}

impl Teardown {
    /// Strict mode hands the error back; force mode keeps it and carries on.
    fn absorb(&mut self, error: Error) -> Result<()> {
        if !self.force {
            return Err(error);
        }
        tracing::warn!("release failed, continuing: {}", error);
        self.failures.push(error);
        Ok(())
    }

    fn finish(self) -> Result<()> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(Error::PartialTeardown(self.failures))
        }
    }
}

/// Releases each entry of `entries`, leaving in place those that failed and,
/// after a strict-mode failure, those not yet attempted.
async fn release_each<F, Fut>(
    entries: &mut Vec<PathBuf>,
    teardown: &mut Teardown,
    mut release: F,
) -> Result<()>
where
    F: FnMut(PathBuf) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut pending = std::mem::take(entries).into_iter();
    while let Some(host_path) = pending.next() {
        if let Err(e) = release(host_path.clone()).await {
            entries.push(host_path);
            if let Err(e) = teardown.absorb(e) {
                entries.extend(pending);
                return Err(e);
            }
        }
    }
    Ok(())
}

fn require_vm(vm: Option<&HostingVm>) -> Result<&HostingVm> {
    vm.ok_or_else(|| Error::MissingConfig("hosting VM to release shared resources from".into()))
}

/// Unwinds everything recorded in `resources`.
///
/// With `force` unset the first failure stops the release and is returned;
/// the manifest keeps the failed entry and everything after it. With `force`
/// set every entry is attempted and the failures are reported together as
/// [`Error::PartialTeardown`]; the manifest keeps only the failed entries.
pub async fn release_resources(
    resources: &mut Resources,
    vm: Option<&HostingVm>,
    force: bool,
    layer_mount: &dyn LayerMount,
) -> Result<()> {
    tracing::debug!(
        vm = vm.map(HostingVm::id),
        guest_root = %resources.guest_root,
        force,
        "releasing container resources"
    );
    let mut teardown = Teardown {
        force,
        failures: Vec::new(),
    };

    release_each(&mut resources.plan9_mounts, &mut teardown, |host_path| async move {
        require_vm(vm)?.remove_plan9(&host_path).await
    })
    .await?;

    release_each(&mut resources.vsmb_mounts, &mut teardown, |host_path| async move {
        require_vm(vm)?.remove_vsmb(&host_path).await
    })
    .await?;

    release_each(&mut resources.scsi_mounts, &mut teardown, |host_path| async move {
        require_vm(vm)?.detach_scsi(&host_path).await
    })
    .await?;

    if !resources.layers.is_empty() {
        let op = if force || vm.is_none() {
            UnmountOperation::All
        } else {
            UnmountOperation::Scsi
        };
        let vm_ref = vm.map(HostingVm::vm_ref);
        match layer_mount
            .unmount(&resources.layers, vm_ref.as_ref(), op)
            .await
        {
            Ok(()) => resources.layers.clear(),
            Err(e) => teardown.absorb(e)?,
        }
    }

    teardown.finish()
}
