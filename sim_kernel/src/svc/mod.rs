//! Kernel call implementations
//!
//! Argument checks shared by calls live here; each call that builds an
//! object has its own submodule.

pub(crate) mod transfer_memory;

use core_types::{is_page_aligned, MemoryPermission, TransferMemoryPermission, VAddr};
use kernel_api::KernelError;

/// Checks that `[address, address + size)` is a well-formed page range
///
/// Errors are reported in argument order: address alignment first, then
/// size, then wrap-around.
pub fn validate_range(address: VAddr, size: u64) -> Result<(), KernelError> {
    if !is_page_aligned(address) {
        return Err(KernelError::InvalidAddress);
    }
    if size == 0 || !is_page_aligned(size) {
        return Err(KernelError::InvalidSize);
    }
    match address.checked_add(size) {
        Some(end) if address < end => Ok(()),
        _ => Err(KernelError::InvalidCurrentMemory),
    }
}

/// Narrows raw permission bits to a transfer memory permission
pub fn validate_transfer_permission(
    permission: MemoryPermission,
) -> Result<TransferMemoryPermission, KernelError> {
    Ok(TransferMemoryPermission::try_from(permission)?)
}
