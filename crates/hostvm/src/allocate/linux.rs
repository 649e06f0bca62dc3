use super::{declared_root, guest_join, mount_layers, set_root, validate_bind_mount};
use crate::resources::Resources;
use crate::vm::HostingVm;
use hostvm_core::{ContainerRoot, ContainerSpec, LayerMount, Plan9Flags, Result};
use std::path::PathBuf;

const ROOTFS_PATH: &str = "rootfs";
const MOUNT_PATH_PREFIX: &str = "m";

pub(super) async fn allocate_linux_resources(
    spec: &mut ContainerSpec,
    resources: &mut Resources,
    vm: Option<&HostingVm>,
    layer_mount: &dyn LayerMount,
) -> Result<ContainerRoot> {
    let root = match (declared_root(spec), vm) {
        (None, _) => mount_layers(spec, resources, vm, layer_mount).await?,
        (Some(root), Some(vm)) => {
            let guest_path = guest_join(resources.guest_root(), ROOTFS_PATH, '/');
            tracing::debug!(vm = %vm.id(), host_path = %root.path, %guest_path, "sharing container root");
            let share = vm
                .add_plan9(&root.path, &guest_path, Plan9Flags::read_only_if(root.read_only))
                .await?;
            resources.push_plan9(PathBuf::from(&root.path));
            ContainerRoot::Guest(share.guest_path)
        }
        (Some(root), None) => ContainerRoot::Host(PathBuf::from(root.path)),
    };
    set_root(spec, &root);

    for (i, mount) in spec.mounts.iter_mut().enumerate() {
        if !mount.is_bind() {
            continue;
        }
        validate_bind_mount(mount)?;

        let Some(vm) = vm else {
            continue;
        };
        let guest_path = guest_join(
            resources.guest_root(),
            &format!("{MOUNT_PATH_PREFIX}{i}"),
            '/',
        );
        tracing::debug!(vm = %vm.id(), source = %mount.source, %guest_path, "hot-adding Plan 9 share for mount");
        let share = vm
            .add_plan9(
                &mount.source,
                &guest_path,
                Plan9Flags::read_only_if(mount.is_read_only()),
            )
            .await?;
        resources.push_plan9(PathBuf::from(&mount.source));
        mount.source = share.guest_path;
    }

    Ok(root)
}
