//! Process page table geometry
//!
//! The simulation does not track individual mappings. A page table only
//! knows the bounds of its process's address space and answers whether a
//! range lies inside them.

use core_types::{AddressSpaceType, VAddr};
use serde::{Deserialize, Serialize};

/// Address space bounds of one process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTable {
    address_space_type: AddressSpaceType,
    address_space_start: VAddr,
    address_space_end: VAddr,
}

impl PageTable {
    /// Creates a page table covering the whole space for `address_space_type`
    pub fn new(address_space_type: AddressSpaceType) -> Self {
        Self {
            address_space_type,
            address_space_start: address_space_type.start(),
            address_space_end: address_space_type.end(),
        }
    }

    /// Checks that `[address, address + size)` lies inside the address space
    ///
    /// Empty and wrapping ranges are never contained.
    pub fn contains(&self, address: VAddr, size: u64) -> bool {
        let Some(end) = address.checked_add(size) else {
            return false;
        };
        self.address_space_start <= address
            && address < end
            && end - 1 <= self.address_space_end - 1
    }

    /// Geometry this table was built for
    pub fn address_space_type(&self) -> AddressSpaceType {
        self.address_space_type
    }

    /// First usable address
    pub fn address_space_start(&self) -> VAddr {
        self.address_space_start
    }

    /// One past the last usable address
    pub fn address_space_end(&self) -> VAddr {
        self.address_space_end
    }

    /// Address width in bits
    pub fn address_space_width(&self) -> u32 {
        self.address_space_type.width()
    }
}

impl Default for PageTable {
    fn default() -> Self {
        Self::new(AddressSpaceType::default())
    }
}
