//! Kernel API trait

use crate::KernelError;
use core_types::{Handle, MemoryPermission, ProcessId, VAddr};

/// The kernel API trait
///
/// This defines the calls a guest process can make into the kernel.
/// Multiple implementations are possible:
/// - Simulated kernel (for testing)
/// - A recompiler or interpreter front end dispatching real syscalls
///
/// # Design Principles
///
/// **All or nothing**: A call that fails leaves no object, no resource
/// charge and no handle behind.
///
/// **Handles, not references**: Created objects are only reachable through
/// the handle returned to the caller.
///
/// # Example
///
/// ```
/// use core_types::{Handle, MemoryPermission, ProcessId};
/// use kernel_api::{KernelApi, KernelError};
///
/// fn share_page<K: KernelApi>(kernel: &K, process: ProcessId) -> Result<Handle, KernelError> {
///     kernel.create_transfer_memory(process, 0x1000, 0x1000, MemoryPermission::READ)
/// }
/// ```
pub trait KernelApi {
    /// Creates a transfer memory over `[address, address + size)`
    ///
    /// The range must be page-aligned, non-empty and inside the calling
    /// process's address space; `permission` must be none, read or
    /// read-write. On success the returned handle is the only reference the
    /// caller holds to the new object.
    ///
    /// # Errors
    ///
    /// - `InvalidAddress` if `address` is not page-aligned
    /// - `InvalidSize` if `size` is zero or not page-aligned
    /// - `InvalidCurrentMemory` if the range wraps or is outside the address space
    /// - `InvalidNewMemoryPermission` if `permission` is not allowed
    /// - `LimitReached` if the process has no transfer memory quota left
    /// - `OutOfResource` if the kernel cannot allocate the object
    /// - `OutOfHandles` if the process handle table is full
    /// - `InvalidState` if the process was destroyed before the handle was published
    fn create_transfer_memory(
        &self,
        process: ProcessId,
        address: VAddr,
        size: u64,
        permission: MemoryPermission,
    ) -> Result<Handle, KernelError>;

    /// 32-bit variant of [`KernelApi::create_transfer_memory`]
    ///
    /// Arguments are zero-extended and forwarded unchanged.
    fn create_transfer_memory32(
        &self,
        process: ProcessId,
        address: u32,
        size: u32,
        permission: MemoryPermission,
    ) -> Result<Handle, KernelError> {
        self.create_transfer_memory(process, u64::from(address), u64::from(size), permission)
    }

    /// Closes a handle in the calling process
    ///
    /// When the handle held the last reference, the object is destroyed and
    /// its resource charge is returned.
    fn close_handle(&self, process: ProcessId, handle: Handle) -> Result<(), KernelError>;
}
