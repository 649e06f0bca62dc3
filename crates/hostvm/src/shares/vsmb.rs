//! SMB shares for Windows guests.

use super::ShareKind;
use crate::vm::HostingVm;
use hostvm_core::{Error, ModifyRequest, Result, ShareInfo, VsmbFlags};
use std::path::Path;

/// Prefix of every SMB share path as seen from inside the guest.
pub const VSMB_GUEST_PREFIX: &str = r"\\?\VMSMB\VSMB-{dcc079ae-60ba-4d07-847c-3493609c0870}\";

fn guest_path_for(name: &str) -> String {
    format!("{VSMB_GUEST_PREFIX}{name}")
}

impl HostingVm {
    /// Shares `host_path` with the guest over SMB, or takes another reference
    /// on the existing share.
    ///
    /// The share is reachable inside the guest at a path derived from its
    /// generated name. Mapping it to a caller-chosen `guest_path` is not
    /// supported yet; a non-empty `guest_path` is refused.
    pub async fn add_vsmb(
        &self,
        host_path: impl AsRef<Path>,
        guest_path: &str,
        flags: VsmbFlags,
    ) -> Result<ShareInfo> {
        self.ensure_supports(ShareKind::Vsmb)?;
        let host_path = host_path.as_ref();
        if !guest_path.is_empty() {
            return Err(Error::UnsupportedFeature(format!(
                "mapping SMB share of {} to guest path {guest_path}",
                host_path.display()
            )));
        }
        tracing::debug!(vm = %self.id(), host_path = %host_path.display(), flags = flags.bits(), "add SMB share");

        self.acquire_share(ShareKind::Vsmb, host_path, |name| {
            (
                ModifyRequest::add_vsmb_share(name, host_path.to_path_buf(), flags),
                guest_path_for(name),
            )
        })
        .await
    }

    /// Drops one reference on the SMB share of `host_path`.
    pub async fn remove_vsmb(&self, host_path: impl AsRef<Path>) -> Result<()> {
        self.ensure_supports(ShareKind::Vsmb)?;
        self.release_share(ShareKind::Vsmb, host_path.as_ref(), |name, _| {
            ModifyRequest::remove_vsmb_share(name)
        })
        .await
    }

    /// Returns where the guest sees the SMB share of `host_path`.
    pub async fn vsmb_guest_path(&self, host_path: impl AsRef<Path>) -> Result<String> {
        self.ensure_supports(ShareKind::Vsmb)?;
        self.share_guest_path(ShareKind::Vsmb, host_path.as_ref())
            .await
    }

    pub async fn vsmb_shares(&self) -> Result<Vec<ShareInfo>> {
        self.ensure_supports(ShareKind::Vsmb)?;
        Ok(self.share_snapshot(ShareKind::Vsmb).await)
    }
}
