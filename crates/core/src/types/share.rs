use serde::{Deserialize, Serialize};
use std::ops::BitOr;
use std::path::PathBuf;

/// Flags carried by a Plan 9 share add request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan9Flags(u32);

impl Plan9Flags {
    pub const NONE: Self = Self(0);
    pub const READ_ONLY: Self = Self(0x0000_0001);
    pub const LINUX_METADATA: Self = Self(0x0000_0004);
    pub const CASE_SENSITIVE: Self = Self(0x0000_0008);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// `READ_ONLY` when `read_only` is set, otherwise no flags.
    pub fn read_only_if(read_only: bool) -> Self {
        if read_only { Self::READ_ONLY } else { Self::NONE }
    }
}

impl BitOr for Plan9Flags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Flags carried by an SMB share add request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VsmbFlags(u32);

impl VsmbFlags {
    pub const NONE: Self = Self(0);
    pub const READ_ONLY: Self = Self(0x0000_0001);
    pub const SHARE_READ: Self = Self(0x0000_0002);
    pub const CACHE_IO: Self = Self(0x0000_0004);
    pub const NO_OPLOCKS: Self = Self(0x0000_0008);
    pub const TAKE_BACKUP_PRIVILEGE: Self = Self(0x0000_0010);
    pub const USE_SHARE_ROOT_IDENTITY: Self = Self(0x0000_0020);
    pub const NO_DIRECTMAP: Self = Self(0x0000_0040);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn read_only_if(read_only: bool) -> Self {
        if read_only { Self::READ_ONLY } else { Self::NONE }
    }
}

impl BitOr for VsmbFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Point-in-time view of one share held by a hosting VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareInfo {
    pub name: String,
    pub host_path: PathBuf,
    pub guest_path: String,
    pub ref_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan9_flags_combine() {
        let flags = Plan9Flags::READ_ONLY | Plan9Flags::LINUX_METADATA;
        assert_eq!(flags.bits(), 0x5);
        assert!(flags.contains(Plan9Flags::READ_ONLY));
        assert!(!flags.contains(Plan9Flags::CASE_SENSITIVE));
    }

    #[test]
    fn read_only_if() {
        assert_eq!(Plan9Flags::read_only_if(true), Plan9Flags::READ_ONLY);
        assert_eq!(Plan9Flags::read_only_if(false), Plan9Flags::NONE);
        assert_eq!(VsmbFlags::read_only_if(true), VsmbFlags::READ_ONLY);
    }

    #[test]
    fn flags_serialize_as_plain_integers() {
        let flags = VsmbFlags::READ_ONLY | VsmbFlags::CACHE_IO | VsmbFlags::NO_OPLOCKS;
        assert_eq!(serde_json::to_string(&flags).unwrap(), "13");
    }
}
