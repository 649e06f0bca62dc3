//! Maps a container's root filesystem and mounts onto hosting-VM resources.
//!
//! Allocation records every resource it attaches in the caller's
//! [`Resources`] manifest as it goes. It does not roll back on failure: the
//! manifest then describes exactly what was attached before the failing
//! step, and the caller hands it to
//! [`release_resources`](crate::release_resources).

mod linux;
mod windows;

use crate::resources::Resources;
use crate::vm::HostingVm;
use hostvm_core::{
    ContainerRoot, ContainerSpec, Error, GuestOs, LayerMount, MountSpec, MountedLayers, Result,
    RootSpec,
};

/// Allocates the resources `spec` needs, rewriting its root path and mount
/// sources to the paths the container will see.
///
/// Without a hosting VM the container runs on the host: layers are composed
/// on the host and mounts are left untouched.
pub async fn allocate(
    spec: &mut ContainerSpec,
    resources: &mut Resources,
    vm: Option<&HostingVm>,
    layer_mount: &dyn LayerMount,
) -> Result<ContainerRoot> {
    match vm {
        Some(vm) if vm.guest_os() == GuestOs::Windows => {
            windows::allocate_windows_resources(spec, resources, vm, layer_mount).await
        }
        _ => linux::allocate_linux_resources(spec, resources, vm, layer_mount).await,
    }
}

/// Declared root, if the container brings one.
fn declared_root(spec: &ContainerSpec) -> Option<RootSpec> {
    spec.root.clone().filter(|root| !root.path.is_empty())
}

fn set_root(spec: &mut ContainerSpec, root: &ContainerRoot) {
    let read_only = spec.root.as_ref().is_some_and(|r| r.read_only);
    spec.root = Some(RootSpec {
        path: root.as_path_string(),
        read_only,
    });
}

/// Composes the container's layers into its root.
async fn mount_layers(
    spec: &ContainerSpec,
    resources: &mut Resources,
    vm: Option<&HostingVm>,
    layer_mount: &dyn LayerMount,
) -> Result<ContainerRoot> {
    if spec.layer_folders.is_empty() {
        return Err(Error::InvalidConfig(
            "container has neither a root path nor layer folders".into(),
        ));
    }
    tracing::debug!(
        vm = vm.map(HostingVm::id),
        layers = spec.layer_folders.len(),
        "mounting container layers"
    );

    let vm_ref = vm.map(HostingVm::vm_ref);
    let mounted = layer_mount
        .mount(&spec.layer_folders, resources.guest_root(), vm_ref.as_ref())
        .await?;
    resources.set_layers(spec.layer_folders.clone());

    match (mounted, vm) {
        (MountedLayers::HostRootPath(path), None) => Ok(ContainerRoot::Host(path)),
        (MountedLayers::GuestCombinedRoot { container_root_path }, Some(_)) => {
            Ok(ContainerRoot::Guest(container_root_path))
        }
        (mounted, vm) => Err(Error::InvalidConfig(format!(
            "layer mount returned {mounted:?} for a {} container",
            if vm.is_some() { "hosted" } else { "host" }
        ))),
    }
}

fn validate_mount(mount: &MountSpec) -> Result<()> {
    if mount.source.is_empty() || mount.destination.is_empty() {
        return Err(Error::InvalidConfig(format!(
            "a mount must have both a source and a destination: {mount:?}"
        )));
    }
    Ok(())
}

fn validate_bind_mount(mount: &MountSpec) -> Result<()> {
    validate_mount(mount)?;
    if mount.has_conflicting_type() {
        return Err(Error::InvalidConfig(format!(
            "bind mount to {} must not set type '{}'",
            mount.destination, mount.mount_type
        )));
    }
    Ok(())
}

/// Joins `leaf` onto a guest directory using the guest's separator.
fn guest_join(root: &str, leaf: &str, separator: char) -> String {
    format!("{}{separator}{leaf}", root.trim_end_matches(separator))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guest_join_handles_trailing_separator() {
        assert_eq!(guest_join("/run/gcs/c/1", "rootfs", '/'), "/run/gcs/c/1/rootfs");
        assert_eq!(guest_join("/run/gcs/c/1/", "m0", '/'), "/run/gcs/c/1/m0");
        assert_eq!(guest_join(r"C:\c\1\", "m2", '\\'), r"C:\c\1\m2");
    }

    #[test]
    fn declared_root_ignores_empty_path() {
        let mut spec = ContainerSpec::default();
        assert!(declared_root(&spec).is_none());
        spec.root = Some(RootSpec::new(""));
        assert!(declared_root(&spec).is_none());
        spec.root = Some(RootSpec::new("/host/base"));
        assert_eq!(declared_root(&spec).unwrap().path, "/host/base");
    }

    #[test]
    fn set_root_keeps_read_only() {
        let mut spec = ContainerSpec {
            root: Some(RootSpec::new("/host/base").read_only()),
            ..ContainerSpec::default()
        };
        set_root(&mut spec, &ContainerRoot::Guest("/run/gcs/c/1/rootfs".into()));
        let root = spec.root.unwrap();
        assert_eq!(root.path, "/run/gcs/c/1/rootfs");
        assert!(root.read_only);
    }

    #[test]
    fn validate_bind_mount_rejects_missing_fields() {
        assert!(validate_bind_mount(&MountSpec::bind("", "/data")).unwrap_err().is_caller_error());
        assert!(validate_bind_mount(&MountSpec::bind("/host", "")).unwrap_err().is_caller_error());
        assert!(validate_bind_mount(&MountSpec::bind("/host", "/data")).is_ok());
    }

    #[test]
    fn validate_bind_mount_rejects_conflicting_type() {
        let mount = MountSpec::with_type("tmpfs", "/host", "/data").option("rbind");
        assert!(validate_bind_mount(&mount).unwrap_err().is_caller_error());
    }
}
