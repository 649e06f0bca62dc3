use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const BIND_TYPE: &str = "bind";

/// A mount requested by a container.
///
/// A mount is a bind mount when its type is `bind` or when its options carry
/// `bind`/`rbind` with no type set. Read-only comes from the `ro` option.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountSpec {
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub mount_type: String,
    pub source: String,
    pub destination: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl MountSpec {
    pub fn bind(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            mount_type: BIND_TYPE.to_string(),
            source: source.into(),
            destination: destination.into(),
            options: Vec::new(),
        }
    }

    pub fn with_type(
        mount_type: impl Into<String>,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            mount_type: mount_type.into(),
            source: source.into(),
            destination: destination.into(),
            options: Vec::new(),
        }
    }

    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    pub fn read_only(self) -> Self {
        self.option("ro")
    }

    fn has_bind_option(&self) -> bool {
        self.options.iter().any(|o| o == "bind" || o == "rbind")
    }

    pub fn is_bind(&self) -> bool {
        self.mount_type == BIND_TYPE || self.has_bind_option()
    }

    /// Bind options combined with a non-bind type tag.
    pub fn has_conflicting_type(&self) -> bool {
        self.has_bind_option() && !self.mount_type.is_empty() && self.mount_type != BIND_TYPE
    }

    pub fn is_read_only(&self) -> bool {
        self.options.iter().any(|o| o == "ro")
    }
}

/// The root filesystem a container declares.
///
/// An empty path asks for the root to be composed from the container's
/// layer folders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootSpec {
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
}

impl RootSpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            read_only: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

/// The subset of a container's configuration that drives resource allocation.
///
/// Allocation rewrites `root.path` and bind mount sources in place so the
/// spec afterwards refers to guest-visible paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerSpec {
    #[serde(default)]
    pub root: Option<RootSpec>,
    #[serde(default)]
    pub mounts: Vec<MountSpec>,
    /// Read-only layers followed by the writable scratch layer.
    #[serde(default)]
    pub layer_folders: Vec<PathBuf>,
}

/// Root path a container ends up with after allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerRoot {
    /// Visible on the host; the container is not hosted in a VM.
    Host(PathBuf),
    /// Visible inside the hosting VM's guest.
    Guest(String),
}

impl ContainerRoot {
    pub fn as_path_string(&self) -> String {
        match self {
            ContainerRoot::Host(path) => path.to_string_lossy().into_owned(),
            ContainerRoot::Guest(path) => path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod mount_spec {
        use super::*;

        #[test]
        fn bind_type_is_bind() {
            let mount = MountSpec::bind("/host/data", "/data");
            assert!(mount.is_bind());
            assert!(!mount.has_conflicting_type());
            assert!(!mount.is_read_only());
        }

        #[test]
        fn bind_option_without_type_is_bind() {
            let mount = MountSpec::with_type("", "/host/data", "/data").option("rbind");
            assert!(mount.is_bind());
            assert!(!mount.has_conflicting_type());
        }

        #[test]
        fn bind_option_with_other_type_conflicts() {
            let mount = MountSpec::with_type("tmpfs", "/host/data", "/data").option("bind");
            assert!(mount.is_bind());
            assert!(mount.has_conflicting_type());
        }

        #[test]
        fn tmpfs_is_not_bind() {
            let mount = MountSpec::with_type("tmpfs", "tmpfs", "/tmp");
            assert!(!mount.is_bind());
        }

        #[test]
        fn ro_option_marks_read_only() {
            let mount = MountSpec::bind("/host/data", "/data").read_only();
            assert!(mount.is_read_only());
        }

        #[test]
        fn deserializes_oci_shape() {
            let json = r#"{"type":"bind","source":"/a","destination":"/b","options":["rbind","ro"]}"#;
            let mount: MountSpec = serde_json::from_str(json).unwrap();
            assert_eq!(mount.mount_type, "bind");
            assert!(mount.is_read_only());
        }
    }

    mod container_root {
        use super::*;

        #[test]
        fn path_string_for_each_variant() {
            assert_eq!(
                ContainerRoot::Host(PathBuf::from("/var/lib/c1")).as_path_string(),
                "/var/lib/c1"
            );
            assert_eq!(
                ContainerRoot::Guest("/run/gcs/c/c1/rootfs".into()).as_path_string(),
                "/run/gcs/c/c1/rootfs"
            );
        }
    }

    #[test]
    fn root_spec_omits_read_only_when_false() {
        let json = serde_json::to_string(&RootSpec::new("/host/base")).unwrap();
        assert!(!json.contains("read_only"));
        let json = serde_json::to_string(&RootSpec::new("/host/base").read_only()).unwrap();
        assert!(json.contains("\"read_only\":true"));
    }
}
