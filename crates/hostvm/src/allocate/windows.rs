use super::{
    declared_root, guest_join, mount_layers, set_root, validate_bind_mount, validate_mount,
};
use crate::resources::Resources;
use crate::vm::HostingVm;
use hostvm_core::{ContainerRoot, ContainerSpec, LayerMount, Result, VsmbFlags};
use std::path::PathBuf;

const MOUNT_PATH_PREFIX: &str = "m";
const DISK_MOUNT_TYPES: &[&str] = &["virtual-disk", "physical-disk"];

pub(super) async fn allocate_windows_resources(
    spec: &mut ContainerSpec,
    resources: &mut Resources,
    vm: &HostingVm,
    layer_mount: &dyn LayerMount,
) -> Result<ContainerRoot> {
    let root = match declared_root(spec) {
        None => mount_layers(spec, resources, Some(vm), layer_mount).await?,
        Some(root) => {
            tracing::debug!(vm = %vm.id(), host_path = %root.path, "sharing container root over SMB");
            let share = vm
                .add_vsmb(&root.path, "", VsmbFlags::read_only_if(root.read_only))
                .await?;
            resources.push_vsmb(PathBuf::from(&root.path));
            ContainerRoot::Guest(share.guest_path)
        }
    };
    set_root(spec, &root);

    for (i, mount) in spec.mounts.iter_mut().enumerate() {
        if mount.is_bind() {
            validate_bind_mount(mount)?;
        } else {
            validate_mount(mount)?;
        }
        let read_only = mount.is_read_only();

        if DISK_MOUNT_TYPES.contains(&mount.mount_type.as_str()) {
            let guest_path = guest_join(
                resources.guest_root(),
                &format!("{MOUNT_PATH_PREFIX}{i}"),
                '\\',
            );
            tracing::debug!(vm = %vm.id(), source = %mount.source, %guest_path, "hot-adding SCSI disk for mount");
            vm.attach_scsi(&mount.source, &guest_path, read_only).await?;
            resources.push_scsi(PathBuf::from(&mount.source));
            mount.source = guest_path;
        } else if mount.mount_type.is_empty() || mount.is_bind() {
            tracing::debug!(vm = %vm.id(), source = %mount.source, "hot-adding SMB share for mount");
            let share = vm
                .add_vsmb(&mount.source, "", VsmbFlags::read_only_if(read_only))
                .await?;
            resources.push_vsmb(PathBuf::from(&mount.source));
            mount.source = share.guest_path;
        }
    }

    Ok(root)
}
