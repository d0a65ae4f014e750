//! Opaque process-scoped handles
//!
//! A handle packs a handle-table slot index and the linear id the slot had
//! when the handle was issued:
//!
//! ```text
//!  31 30 29            15 14             0
//! [ rsv ][   linear id   ][     index     ]
//! ```
//!
//! The linear id lets the table reject a stale handle whose slot has since
//! been reused.

use serde::{Deserialize, Serialize};
use std::fmt;

const INDEX_BITS: u32 = 15;
const LINEAR_ID_BITS: u32 = 15;
const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;
const LINEAR_ID_MASK: u32 = (1 << LINEAR_ID_BITS) - 1;
const RESERVED_MASK: u32 = !((1 << (INDEX_BITS + LINEAR_ID_BITS)) - 1);

/// Opaque integer naming a kernel object within one process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Handle(u32);

impl Handle {
    /// The null handle, never issued by a handle table
    pub const INVALID: Handle = Handle(0);

    /// Pseudo-handle for the calling thread
    pub const CURRENT_THREAD: Handle = Handle(0xFFFF_8000);

    /// Pseudo-handle for the calling process
    pub const CURRENT_PROCESS: Handle = Handle(0xFFFF_8001);

    /// Smallest linear id a table hands out
    pub const MIN_LINEAR_ID: u16 = 1;

    /// Largest linear id a table hands out
    pub const MAX_LINEAR_ID: u16 = LINEAR_ID_MASK as u16;

    /// Builds a handle from a slot index and linear id
    pub const fn encode(index: u16, linear_id: u16) -> Self {
        Self((index as u32 & INDEX_MASK) | ((linear_id as u32 & LINEAR_ID_MASK) << INDEX_BITS))
    }

    /// Wraps a raw guest-supplied value
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw value passed across the syscall boundary
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Slot index within the handle table
    pub const fn index(&self) -> u16 {
        (self.0 & INDEX_MASK) as u16
    }

    /// Linear id the slot had when this handle was issued
    pub const fn linear_id(&self) -> u16 {
        ((self.0 >> INDEX_BITS) & LINEAR_ID_MASK) as u16
    }

    /// True for the current-thread and current-process pseudo-handles
    pub const fn is_pseudo(&self) -> bool {
        self.0 == Self::CURRENT_THREAD.0 || self.0 == Self::CURRENT_PROCESS.0
    }

    /// True if the reserved bits are clear and the linear id is non-zero
    pub const fn is_well_formed(&self) -> bool {
        self.0 & RESERVED_MASK == 0 && self.linear_id() != 0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:#010x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_invalid_handle_is_not_well_formed() {
        assert!(!Handle::INVALID.is_well_formed());
    }

    #[test]
    fn test_pseudo_handles() {
        assert!(Handle::CURRENT_PROCESS.is_pseudo());
        assert!(Handle::CURRENT_THREAD.is_pseudo());
        assert!(!Handle::CURRENT_PROCESS.is_well_formed());
        assert!(!Handle::encode(1, 1).is_pseudo());
    }

    #[test]
    fn test_encode_layout() {
        let handle = Handle::encode(3, 2);
        assert_eq!(handle.raw(), (2 << 15) | 3);
        assert_eq!(handle.to_string(), "Handle(0x00010003)");
    }

    proptest! {
        #[test]
        fn encode_preserves_fields(index in 0u16..0x8000, linear_id in Handle::MIN_LINEAR_ID..=Handle::MAX_LINEAR_ID) {
            let handle = Handle::encode(index, linear_id);
            prop_assert_eq!(handle.index(), index);
            prop_assert_eq!(handle.linear_id(), linear_id);
            prop_assert!(handle.is_well_formed());
        }
    }
}
