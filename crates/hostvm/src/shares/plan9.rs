//! Plan 9 shares for Linux guests.

use super::ShareKind;
use crate::vm::HostingVm;
use hostvm_core::{Error, ModifyRequest, Plan9Flags, Result, ShareInfo};
use std::path::Path;

impl HostingVm {
    /// Shares `host_path` with the guest over Plan 9, mounted at
    /// `guest_path`, or takes another reference on the existing share.
    ///
    /// A share that already exists keeps its original guest path and flags;
    /// the returned [`ShareInfo`] says where it is mounted.
    pub async fn add_plan9(
        &self,
        host_path: impl AsRef<Path>,
        guest_path: &str,
        flags: Plan9Flags,
    ) -> Result<ShareInfo> {
        self.ensure_supports(ShareKind::Plan9)?;
        let host_path = host_path.as_ref();
        if guest_path.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "Plan 9 share of {} needs a guest path",
                host_path.display()
            )));
        }
        tracing::debug!(
            vm = %self.id(),
            host_path = %host_path.display(),
            guest_path,
            flags = flags.bits(),
            "add Plan 9 share"
        );

        self.acquire_share(ShareKind::Plan9, host_path, |name| {
            (
                ModifyRequest::add_plan9_share(name, host_path.to_path_buf(), guest_path, flags),
                guest_path.to_string(),
            )
        })
        .await
    }

    /// Drops one reference on the Plan 9 share of `host_path`.
    pub async fn remove_plan9(&self, host_path: impl AsRef<Path>) -> Result<()> {
        self.ensure_supports(ShareKind::Plan9)?;
        self.release_share(ShareKind::Plan9, host_path.as_ref(), |name, guest_path| {
            ModifyRequest::remove_plan9_share(name, guest_path)
        })
        .await
    }

    pub async fn plan9_guest_path(&self, host_path: impl AsRef<Path>) -> Result<String> {
        self.ensure_supports(ShareKind::Plan9)?;
        self.share_guest_path(ShareKind::Plan9, host_path.as_ref())
            .await
    }

    pub async fn plan9_shares(&self) -> Result<Vec<ShareInfo>> {
        self.ensure_supports(ShareKind::Plan9)?;
        Ok(self.share_snapshot(ShareKind::Plan9).await)
    }
}
