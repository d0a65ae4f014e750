//! # Memory Types
//!
//! This module defines the memory vocabulary shared by the kernel and the
//! syscall surface.
//!
//! ## Key Types
//!
//! - [`VAddr`]: A guest virtual address
//! - [`MemoryPermission`]: Raw permission bits exactly as the guest passed them
//! - [`TransferMemoryPermission`]: The narrowed set a transfer memory may grant
//! - [`AddressSpaceType`]: The width and geometry of a process address space

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Guest virtual address
pub type VAddr = u64;

/// log2 of the page size
pub const PAGE_BITS: u32 = 12;

/// Page size used by the address-space manager
pub const PAGE_SIZE: u64 = 1 << PAGE_BITS;

/// Returns true if `value` is a multiple of [`PAGE_SIZE`]
pub const fn is_page_aligned(value: u64) -> bool {
    value & (PAGE_SIZE - 1) == 0
}

bitflags! {
    /// Memory permission bits as encoded in syscall arguments
    ///
    /// Guests may pass any 32-bit pattern, so values are built with
    /// [`MemoryPermission::from_bits_retain`] and validated afterwards.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryPermission: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXECUTE = 1 << 2;
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
        const READ_EXECUTE = Self::READ.bits() | Self::EXECUTE.bits();
        const DONT_CARE = 1 << 28;
    }
}

impl MemoryPermission {
    /// No access
    pub const NONE: Self = Self::empty();

    /// Wraps a raw guest-supplied value, keeping unknown bits
    pub const fn from_raw(raw: u32) -> Self {
        Self::from_bits_retain(raw)
    }
}

impl fmt::Display for MemoryPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            if self.contains(Self::READ) { "R" } else { "-" },
            if self.contains(Self::WRITE) { "W" } else { "-" },
            if self.contains(Self::EXECUTE) { "X" } else { "-" }
        )?;
        let unknown = self.bits() & !(Self::READ_WRITE | Self::EXECUTE).bits();
        if unknown != 0 {
            write!(f, "+{:#x}", unknown)?;
        }
        Ok(())
    }
}

/// Permission a transfer memory grants while it is shared
///
/// Only these three values are ever accepted; execute and write-only
/// patterns are rejected when converting from [`MemoryPermission`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferMemoryPermission {
    None,
    Read,
    ReadWrite,
}

impl TransferMemoryPermission {
    /// Returns the raw permission bits for this value
    pub fn as_memory_permission(&self) -> MemoryPermission {
        match self {
            Self::None => MemoryPermission::NONE,
            Self::Read => MemoryPermission::READ,
            Self::ReadWrite => MemoryPermission::READ_WRITE,
        }
    }
}

impl TryFrom<MemoryPermission> for TransferMemoryPermission {
    type Error = InvalidPermission;

    fn try_from(perm: MemoryPermission) -> Result<Self, Self::Error> {
        if perm == MemoryPermission::NONE {
            Ok(Self::None)
        } else if perm == MemoryPermission::READ {
            Ok(Self::Read)
        } else if perm == MemoryPermission::READ_WRITE {
            Ok(Self::ReadWrite)
        } else {
            Err(InvalidPermission(perm.bits()))
        }
    }
}

impl From<TransferMemoryPermission> for MemoryPermission {
    fn from(perm: TransferMemoryPermission) -> Self {
        perm.as_memory_permission()
    }
}

impl fmt::Display for TransferMemoryPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_memory_permission())
    }
}

/// Raw permission bits outside the transfer-memory set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("permission bits {0:#x} are not valid for transfer memory")]
pub struct InvalidPermission(pub u32);

/// Address space geometry of a process
///
/// The kernel only hands out addresses inside
/// `[address_space_start, address_space_end)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressSpaceType {
    Is32Bit,
    Is36Bit,
    Is32BitNoMap,
    #[default]
    Is39Bit,
}

impl AddressSpaceType {
    /// Address width in bits
    pub fn width(&self) -> u32 {
        match self {
            Self::Is32Bit | Self::Is32BitNoMap => 32,
            Self::Is36Bit => 36,
            Self::Is39Bit => 39,
        }
    }

    /// Base of the address space
    ///
    /// Every layout begins at zero; code and map regions are carved out of
    /// the space, they do not bound it.
    pub fn start(&self) -> VAddr {
        0
    }

    /// One past the last usable address
    pub fn end(&self) -> VAddr {
        1u64 << self.width()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_page_alignment() {
        assert!(is_page_aligned(0));
        assert!(is_page_aligned(0x1000));
        assert!(is_page_aligned(0xFFFF_F000));
        assert!(!is_page_aligned(0x1001));
        assert!(!is_page_aligned(0xFFF));
    }

    #[test]
    fn test_transfer_permission_accepts_subset() {
        assert_eq!(
            TransferMemoryPermission::try_from(MemoryPermission::NONE),
            Ok(TransferMemoryPermission::None)
        );
        assert_eq!(
            TransferMemoryPermission::try_from(MemoryPermission::READ),
            Ok(TransferMemoryPermission::Read)
        );
        assert_eq!(
            TransferMemoryPermission::try_from(MemoryPermission::READ_WRITE),
            Ok(TransferMemoryPermission::ReadWrite)
        );
    }

    #[test]
    fn test_transfer_permission_rejects_others() {
        for raw in [
            MemoryPermission::WRITE,
            MemoryPermission::EXECUTE,
            MemoryPermission::READ_EXECUTE,
            MemoryPermission::DONT_CARE,
            MemoryPermission::from_raw(0x8),
            MemoryPermission::from_raw(u32::MAX),
        ] {
            assert_eq!(
                TransferMemoryPermission::try_from(raw),
                Err(InvalidPermission(raw.bits()))
            );
        }
    }

    #[test]
    fn test_permission_display() {
        assert_eq!(MemoryPermission::READ_WRITE.to_string(), "RW-");
        assert_eq!(MemoryPermission::NONE.to_string(), "---");
        assert_eq!(MemoryPermission::from_raw(0x11).to_string(), "R--+0x10");
        assert_eq!(TransferMemoryPermission::Read.to_string(), "R--");
    }

    #[test]
    fn test_address_space_geometry() {
        assert_eq!(AddressSpaceType::Is32Bit.end(), 0x1_0000_0000);
        assert_eq!(AddressSpaceType::Is32BitNoMap.end(), 0x1_0000_0000);
        assert_eq!(AddressSpaceType::Is36Bit.end(), 1 << 36);
        assert_eq!(AddressSpaceType::Is39Bit.end(), 1 << 39);
        assert_eq!(AddressSpaceType::default(), AddressSpaceType::Is39Bit);

        for space in [
            AddressSpaceType::Is32Bit,
            AddressSpaceType::Is36Bit,
            AddressSpaceType::Is32BitNoMap,
            AddressSpaceType::Is39Bit,
        ] {
            assert_eq!(space.start(), 0);
        }
    }

    #[test]
    fn test_transfer_permission_serde() {
        let json = serde_json::to_string(&TransferMemoryPermission::ReadWrite).unwrap();
        assert_eq!(json, "\"ReadWrite\"");
        let back: TransferMemoryPermission = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TransferMemoryPermission::ReadWrite);
    }

    proptest! {
        #[test]
        fn only_three_raw_values_are_transfer_permissions(raw in any::<u32>()) {
            let accepted = TransferMemoryPermission::try_from(MemoryPermission::from_raw(raw)).is_ok();
            prop_assert_eq!(accepted, matches!(raw, 0 | 1 | 3));
        }

        #[test]
        fn alignment_matches_modulo(value in any::<u64>()) {
            prop_assert_eq!(is_page_aligned(value), value % PAGE_SIZE == 0);
        }
    }
}
