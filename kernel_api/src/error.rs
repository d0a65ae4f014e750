//! Kernel error types
//!
//! Each error carries the result code a guest would observe. Codes follow the
//! kernel module layout: `raw = module | description << 9`.

use core_types::InvalidPermission;
use resources::ResourceError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw result code as returned to the guest
pub type ResultCode = u32;

/// Module number of kernel result codes
pub const KERNEL_MODULE: u32 = 1;

/// Result code for success
pub const RESULT_SUCCESS: ResultCode = 0;

/// Errors that can occur when servicing a kernel call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum KernelError {
    /// Size is not page-aligned or is zero
    #[error("Invalid size")]
    InvalidSize,

    /// Address is not page-aligned
    #[error("Invalid address")]
    InvalidAddress,

    /// Kernel object storage is exhausted
    #[error("Out of kernel object resources")]
    OutOfResource,

    /// Requested table or buffer exceeds what the kernel can back
    #[error("Out of memory")]
    OutOfMemory,

    /// The handle table has no free slot
    #[error("Out of handles")]
    OutOfHandles,

    /// The range wraps or is not inside the caller's address space
    #[error("Invalid current memory range")]
    InvalidCurrentMemory,

    /// Requested permission is not allowed for this object
    #[error("Invalid new memory permission")]
    InvalidNewMemoryPermission,

    /// Handle does not name a live object of the expected type
    #[error("Invalid handle")]
    InvalidHandle,

    /// Referenced entity does not exist
    #[error("Not found")]
    NotFound,

    /// Object is not in a state that allows the operation
    #[error("Invalid state")]
    InvalidState,

    /// Per-process resource limit reached
    #[error("Resource limit reached")]
    LimitReached,
}

impl KernelError {
    /// Every error, for exhaustive table checks
    pub const ALL: [KernelError; 11] = [
        KernelError::InvalidSize,
        KernelError::InvalidAddress,
        KernelError::OutOfResource,
        KernelError::OutOfMemory,
        KernelError::OutOfHandles,
        KernelError::InvalidCurrentMemory,
        KernelError::InvalidNewMemoryPermission,
        KernelError::InvalidHandle,
        KernelError::NotFound,
        KernelError::InvalidState,
        KernelError::LimitReached,
    ];

    /// Description field of the result code
    pub const fn description(&self) -> u32 {
        match self {
            Self::InvalidSize => 101,
            Self::InvalidAddress => 102,
            Self::OutOfResource => 103,
            Self::OutOfMemory => 104,
            Self::OutOfHandles => 105,
            Self::InvalidCurrentMemory => 106,
            Self::InvalidNewMemoryPermission => 108,
            Self::InvalidHandle => 114,
            Self::NotFound => 121,
            Self::InvalidState => 125,
            Self::LimitReached => 132,
        }
    }

    /// Raw result code
    pub const fn raw(&self) -> ResultCode {
        KERNEL_MODULE | (self.description() << 9)
    }

    /// Decodes a raw result code, `None` for success or unknown codes
    pub fn from_raw(raw: ResultCode) -> Option<Self> {
        Self::ALL.into_iter().find(|err| err.raw() == raw)
    }

    /// Collapses a kernel call result into the raw code the guest sees
    pub fn to_result_code<T>(result: &Result<T, KernelError>) -> ResultCode {
        match result {
            Ok(_) => RESULT_SUCCESS,
            Err(err) => err.raw(),
        }
    }
}

impl From<ResourceError> for KernelError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::LimitReached { .. } => KernelError::LimitReached,
        }
    }
}

impl From<InvalidPermission> for KernelError {
    fn from(_: InvalidPermission) -> Self {
        KernelError::InvalidNewMemoryPermission
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resources::LimitableResource;

    #[test]
    fn test_raw_codes() {
        assert_eq!(KernelError::InvalidSize.raw(), 0xCA01);
        assert_eq!(KernelError::InvalidAddress.raw(), 0xCC01);
        assert_eq!(KernelError::OutOfResource.raw(), 0xCE01);
        assert_eq!(KernelError::OutOfMemory.raw(), 0xD001);
        assert_eq!(KernelError::OutOfHandles.raw(), 0xD201);
        assert_eq!(KernelError::InvalidCurrentMemory.raw(), 0xD401);
        assert_eq!(KernelError::InvalidNewMemoryPermission.raw(), 0xD801);
        assert_eq!(KernelError::InvalidHandle.raw(), 0xE401);
        assert_eq!(KernelError::LimitReached.raw(), 0x10801);
    }

    #[test]
    fn test_codes_are_distinct_and_decode() {
        for err in KernelError::ALL {
            assert_eq!(KernelError::from_raw(err.raw()), Some(err));
        }
        assert_eq!(KernelError::from_raw(RESULT_SUCCESS), None);
    }

    #[test]
    fn test_to_result_code() {
        let ok: Result<u32, KernelError> = Ok(7);
        let err: Result<u32, KernelError> = Err(KernelError::LimitReached);
        assert_eq!(KernelError::to_result_code(&ok), RESULT_SUCCESS);
        assert_eq!(KernelError::to_result_code(&err), KernelError::LimitReached.raw());
    }

    #[test]
    fn test_from_resource_error() {
        let err = ResourceError::LimitReached {
            resource: LimitableResource::TransferMemoryCountMax,
            limit: 1,
            current: 1,
            requested: 1,
        };
        assert_eq!(KernelError::from(err), KernelError::LimitReached);
    }

    #[test]
    fn test_from_invalid_permission() {
        assert_eq!(
            KernelError::from(InvalidPermission(4)),
            KernelError::InvalidNewMemoryPermission
        );
    }

    #[test]
    fn test_error_serde() {
        let json = serde_json::to_string(&KernelError::OutOfHandles).unwrap();
        let back: KernelError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, KernelError::OutOfHandles);
    }
}
