//! Modification requests sent to a hosting VM's control plane.
//!
//! Only the fields this crate populates are modelled. Field names follow the
//! control plane's `PascalCase` convention.

use crate::types::{Plan9Flags, ScsiSlot, VsmbFlags};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Port the guest's Plan 9 client connects to.
pub const PLAN9_PORT: u32 = 564;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceType {
    VSmbShare,
    Plan9Share,
    MappedVirtualDisk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    Add,
    Remove,
}

/// Host-side settings of a modification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceSettings {
    VsmbShare {
        #[serde(rename = "Name")]
        name: String,
        #[serde(rename = "Flags", skip_serializing_if = "Option::is_none")]
        flags: Option<VsmbFlags>,
        #[serde(rename = "Path", skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
    },
    Plan9Share {
        #[serde(rename = "Name")]
        name: String,
        #[serde(rename = "AccessName")]
        access_name: String,
        #[serde(rename = "Path", skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
        #[serde(rename = "Port")]
        port: u32,
        #[serde(rename = "Flags")]
        flags: Plan9Flags,
    },
    Attachment {
        #[serde(rename = "Path")]
        path: PathBuf,
        #[serde(rename = "Type")]
        attachment_type: String,
        #[serde(rename = "ReadOnly", default)]
        read_only: bool,
    },
}

/// Guest-side settings of a modification, interpreted by the guest agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostedSettings {
    MappedDirectory {
        #[serde(rename = "MountPath")]
        mount_path: String,
        #[serde(rename = "Port")]
        port: u32,
        #[serde(rename = "ShareName")]
        share_name: String,
        #[serde(rename = "ReadOnly")]
        read_only: bool,
    },
    MappedVirtualDisk {
        #[serde(rename = "ContainerPath")]
        container_path: String,
        #[serde(rename = "Lun")]
        lun: u8,
        #[serde(rename = "Controller")]
        controller: u8,
        #[serde(rename = "ReadOnly")]
        read_only: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyRequest {
    pub resource_type: ResourceType,
    pub request_type: RequestType,
    pub settings: ResourceSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosted_settings: Option<HostedSettings>,
    pub resource_uri: String,
}

impl ModifyRequest {
    pub fn add_vsmb_share(name: &str, host_path: PathBuf, flags: VsmbFlags) -> Self {
        Self {
            resource_type: ResourceType::VSmbShare,
            request_type: RequestType::Add,
            settings: ResourceSettings::VsmbShare {
                name: name.to_string(),
                flags: Some(flags),
                path: Some(host_path),
            },
            hosted_settings: None,
            resource_uri: vsmb_uri(name),
        }
    }

    pub fn remove_vsmb_share(name: &str) -> Self {
        Self {
            resource_type: ResourceType::VSmbShare,
            request_type: RequestType::Remove,
            settings: ResourceSettings::VsmbShare {
                name: name.to_string(),
                flags: None,
                path: None,
            },
            hosted_settings: None,
            resource_uri: vsmb_uri(name),
        }
    }

    pub fn add_plan9_share(
        name: &str,
        host_path: PathBuf,
        guest_path: &str,
        flags: Plan9Flags,
    ) -> Self {
        Self {
            resource_type: ResourceType::Plan9Share,
            request_type: RequestType::Add,
            settings: ResourceSettings::Plan9Share {
                name: name.to_string(),
                access_name: name.to_string(),
                path: Some(host_path),
                port: PLAN9_PORT,
                flags,
            },
            hosted_settings: Some(HostedSettings::MappedDirectory {
                mount_path: guest_path.to_string(),
                port: PLAN9_PORT,
                share_name: name.to_string(),
                read_only: flags.contains(Plan9Flags::READ_ONLY),
            }),
            resource_uri: PLAN9_URI.to_string(),
        }
    }

    pub fn remove_plan9_share(name: &str, guest_path: &str) -> Self {
        Self {
            resource_type: ResourceType::Plan9Share,
            request_type: RequestType::Remove,
            settings: ResourceSettings::Plan9Share {
                name: name.to_string(),
                access_name: name.to_string(),
                path: None,
                port: PLAN9_PORT,
                flags: Plan9Flags::NONE,
            },
            hosted_settings: Some(HostedSettings::MappedDirectory {
                mount_path: guest_path.to_string(),
                port: PLAN9_PORT,
                share_name: name.to_string(),
                read_only: false,
            }),
            resource_uri: PLAN9_URI.to_string(),
        }
    }

    pub fn add_scsi_disk(
        slot: ScsiSlot,
        host_path: PathBuf,
        guest_path: &str,
        read_only: bool,
    ) -> Self {
        Self {
            resource_type: ResourceType::MappedVirtualDisk,
            request_type: RequestType::Add,
            settings: ResourceSettings::Attachment {
                path: host_path,
                attachment_type: "VirtualDisk".to_string(),
                read_only,
            },
            hosted_settings: Some(HostedSettings::MappedVirtualDisk {
                container_path: guest_path.to_string(),
                lun: slot.lun,
                controller: slot.controller,
                read_only,
            }),
            resource_uri: scsi_uri(slot),
        }
    }

    pub fn remove_scsi_disk(
        slot: ScsiSlot,
        host_path: PathBuf,
        guest_path: &str,
        read_only: bool,
    ) -> Self {
        Self {
            request_type: RequestType::Remove,
            ..Self::add_scsi_disk(slot, host_path, guest_path, read_only)
        }
    }
}

impl fmt::Display for ModifyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {:?} {}",
            self.request_type, self.resource_type, self.resource_uri
        )
    }
}

const PLAN9_URI: &str = "virtualmachine/devices/plan9/shares";

fn vsmb_uri(name: &str) -> String {
    format!("virtualmachine/devices/virtualsmbshares/{name}")
}

fn scsi_uri(slot: ScsiSlot) -> String {
    format!(
        "virtualmachine/devices/scsi/{}/attachments/{}",
        slot.controller, slot.lun
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vsmb_add_encodes_name_flags_and_path() {
        let request =
            ModifyRequest::add_vsmb_share("s1", PathBuf::from(r"C:\layers\base"), VsmbFlags::READ_ONLY);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["ResourceType"], "VSmbShare");
        assert_eq!(json["RequestType"], "Add");
        assert_eq!(json["Settings"]["Name"], "s1");
        assert_eq!(json["Settings"]["Flags"], 1);
        assert_eq!(json["Settings"]["Path"], r"C:\layers\base");
        assert_eq!(json["ResourceUri"], "virtualmachine/devices/virtualsmbshares/s1");
        assert!(json.get("HostedSettings").is_none());
    }

    #[test]
    fn vsmb_remove_carries_only_the_name() {
        let request = ModifyRequest::remove_vsmb_share("sa");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["RequestType"], "Remove");
        assert_eq!(json["Settings"], serde_json::json!({ "Name": "sa" }));
    }

    #[test]
    fn plan9_add_sets_guest_mount() {
        let request = ModifyRequest::add_plan9_share(
            "3",
            PathBuf::from("/host/base"),
            "/run/gcs/c/c1/rootfs",
            Plan9Flags::READ_ONLY,
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["ResourceType"], "Plan9Share");
        assert_eq!(json["Settings"]["AccessName"], "3");
        assert_eq!(json["Settings"]["Port"], 564);
        assert_eq!(json["HostedSettings"]["MountPath"], "/run/gcs/c/c1/rootfs");
        assert_eq!(json["HostedSettings"]["ReadOnly"], true);
    }

    #[test]
    fn scsi_uri_names_controller_and_lun() {
        let request = ModifyRequest::add_scsi_disk(
            ScsiSlot::new(0, 5),
            PathBuf::from("/disks/data.vhdx"),
            "/mnt/data",
            false,
        );
        assert_eq!(
            request.resource_uri,
            "virtualmachine/devices/scsi/0/attachments/5"
        );
        let remove = ModifyRequest::remove_scsi_disk(
            ScsiSlot::new(0, 5),
            PathBuf::from("/disks/data.vhdx"),
            "/mnt/data",
            false,
        );
        assert_eq!(remove.request_type, RequestType::Remove);
        assert_eq!(remove.resource_uri, request.resource_uri);
    }

    #[test]
    fn display_is_short_summary() {
        let request = ModifyRequest::remove_vsmb_share("s2");
        assert_eq!(
            request.to_string(),
            "Remove VSmbShare virtualmachine/devices/virtualsmbshares/s2"
        );
    }
}
