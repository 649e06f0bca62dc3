//! Ref-counted folder shares.
//!
//! Each hosting VM keeps one registry per share kind, keyed by host path.
//! The first acquire of a host path issues an add request and creates an
//! entry with a ref-count of one; later acquires only bump the count. The
//! remove request is issued when the last reference is released, and the
//! entry is deleted only once the guest has acknowledged the removal.

mod plan9;
mod vsmb;

pub use vsmb::VSMB_GUEST_PREFIX;

use crate::vm::{HostingVm, VmState};
use hostvm_core::{Error, GuestOs, ModifyRequest, Result, ShareInfo};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShareKind {
    Vsmb,
    Plan9,
}

impl ShareKind {
    pub(crate) fn resource(self) -> &'static str {
        match self {
            ShareKind::Vsmb => "SMB share",
            ShareKind::Plan9 => "Plan 9 share",
        }
    }

    fn guest_os(self) -> GuestOs {
        match self {
            ShareKind::Vsmb => GuestOs::Windows,
            ShareKind::Plan9 => GuestOs::Linux,
        }
    }

    fn name_for(self, counter: u64) -> String {
        match self {
            ShareKind::Vsmb => format!("s{counter:x}"),
            ShareKind::Plan9 => counter.to_string(),
        }
    }
}

#[derive(Debug)]
struct Share {
    name: String,
    guest_path: String,
    ref_count: u32,
}

/// Outcome of dropping one reference.
#[derive(Debug, PartialEq, Eq)]
enum Release {
    StillReferenced(u32),
    /// The caller must remove the share from the guest, then call
    /// [`ShareRegistry::remove`]. The entry keeps its last reference until then.
    Last { name: String, guest_path: String },
}

pub(crate) struct ShareRegistry {
    kind: ShareKind,
    shares: HashMap<PathBuf, Share>,
    counter: u64,
}

impl ShareRegistry {
    pub(crate) fn new(kind: ShareKind) -> Self {
        Self {
            kind,
            shares: HashMap::new(),
            counter: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.shares.len()
    }

    fn info(&self, host_path: &Path) -> Option<ShareInfo> {
        self.shares.get(host_path).map(|share| ShareInfo {
            name: share.name.clone(),
            host_path: host_path.to_path_buf(),
            guest_path: share.guest_path.clone(),
            ref_count: share.ref_count,
        })
    }

    fn add_ref(&mut self, host_path: &Path) -> Option<u32> {
        let share = self.shares.get_mut(host_path)?;
        share.ref_count += 1;
        Some(share.ref_count)
    }

    fn next_name(&mut self) -> String {
        self.counter += 1;
        self.kind.name_for(self.counter)
    }

    fn insert(&mut self, host_path: PathBuf, name: String, guest_path: String) {
        self.shares.insert(
            host_path,
            Share {
                name,
                guest_path,
                ref_count: 1,
            },
        );
    }

    fn not_found(&self, host_path: &Path, vm: &str) -> Error {
        Error::NotFound {
            resource: self.kind.resource(),
            host_path: host_path.to_path_buf(),
            vm: vm.to_string(),
        }
    }

    fn begin_release(&mut self, host_path: &Path, vm: &str) -> Result<Release> {
        let Some(share) = self.shares.get_mut(host_path) else {
            return Err(self.not_found(host_path, vm));
        };
        if share.ref_count > 1 {
            share.ref_count -= 1;
            return Ok(Release::StillReferenced(share.ref_count));
        }
        Ok(Release::Last {
            name: share.name.clone(),
            guest_path: share.guest_path.clone(),
        })
    }

    fn remove(&mut self, host_path: &Path) {
        self.shares.remove(host_path);
    }

    fn guest_path(&self, host_path: &Path, vm: &str) -> Result<String> {
        self.shares
            .get(host_path)
            .map(|share| share.guest_path.clone())
            .ok_or_else(|| self.not_found(host_path, vm))
    }

    fn snapshot(&self) -> Vec<ShareInfo> {
        let mut shares: Vec<ShareInfo> = self
            .shares
            .keys()
            .filter_map(|host_path| self.info(host_path))
            .collect();
        shares.sort_by(|a, b| a.host_path.cmp(&b.host_path));
        shares
    }
}

impl VmState {
    fn registry(&mut self, kind: ShareKind) -> &mut ShareRegistry {
        match kind {
            ShareKind::Vsmb => &mut self.vsmb,
            ShareKind::Plan9 => &mut self.plan9,
        }
    }
}

impl HostingVm {
    fn ensure_supports(&self, kind: ShareKind) -> Result<()> {
        if self.guest_os() == kind.guest_os() {
            Ok(())
        } else {
            Err(Error::UnsupportedGuestOs {
                resource: kind.resource(),
                guest_os: self.guest_os(),
            })
        }
    }

    /// Takes a reference on the share for `host_path`, adding it to the guest
    /// if this is the first one. `prepare` receives the generated share name
    /// and returns the add request together with the share's guest path.
    async fn acquire_share<F>(&self, kind: ShareKind, host_path: &Path, prepare: F) -> Result<ShareInfo>
    where
        F: FnOnce(&str) -> (ModifyRequest, String),
    {
        let mut state = self.lock().await;
        // Checked under the lock: terminate flips the flag while holding it.
        self.ensure_running()?;

        let registry = state.registry(kind);
        if let Some(ref_count) = registry.add_ref(host_path) {
            tracing::debug!(
                vm = %self.id(),
                host_path = %host_path.display(),
                ref_count,
                "{} already present, reusing",
                kind.resource()
            );
            return registry
                .info(host_path)
                .ok_or_else(|| registry.not_found(host_path, self.id()));
        }

        let name = registry.next_name();
        let (request, guest_path) = prepare(&name);
        self.modify(&request, &format!("add {} {name}", kind.resource()))
            .await?;

        let registry = state.registry(kind);
        registry.insert(host_path.to_path_buf(), name, guest_path);
        tracing::debug!(
            vm = %self.id(),
            host_path = %host_path.display(),
            "{} added",
            kind.resource()
        );
        registry
            .info(host_path)
            .ok_or_else(|| registry.not_found(host_path, self.id()))
    }

    /// Drops one reference on the share for `host_path`, removing it from the
    /// guest when it was the last. If the remove request fails, the share
    /// stays registered with one reference so the release can be retried.
    async fn release_share<F>(&self, kind: ShareKind, host_path: &Path, prepare: F) -> Result<()>
    where
        F: FnOnce(&str, &str) -> ModifyRequest,
    {
        let mut state = self.lock().await;

        let (name, guest_path) = match state.registry(kind).begin_release(host_path, self.id())? {
            Release::StillReferenced(ref_count) => {
                tracing::debug!(
                    vm = %self.id(),
                    host_path = %host_path.display(),
                    ref_count,
                    "{} still referenced",
                    kind.resource()
                );
                return Ok(());
            }
            Release::Last { name, guest_path } => (name, guest_path),
        };

        tracing::debug!(
            vm = %self.id(),
            host_path = %host_path.display(),
            "zero ref-count, removing {} {name}",
            kind.resource()
        );
        let request = prepare(&name, &guest_path);
        self.modify(&request, &format!("remove {} {name}", kind.resource()))
            .await?;
        state.registry(kind).remove(host_path);
        Ok(())
    }

    async fn share_guest_path(&self, kind: ShareKind, host_path: &Path) -> Result<String> {
        if host_path.as_os_str().is_empty() {
            return Err(Error::InvalidConfig(format!(
                "no host path passed to {} lookup",
                kind.resource()
            )));
        }
        let mut state = self.lock().await;
        state.registry(kind).guest_path(host_path, self.id())
    }

    async fn share_snapshot(&self, kind: ShareKind) -> Vec<ShareInfo> {
        let mut state = self.lock().await;
        state.registry(kind).snapshot()
    }
}
