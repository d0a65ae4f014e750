//! Transfer memory creation
//!
//! Every step either succeeds or unwinds what the earlier steps acquired:
//!
//! 1. validate the range arguments
//! 2. validate the permission
//! 3. reserve one transfer memory on the caller's resource limit
//! 4. allocate the object
//! 5. check the range against the caller's address space
//! 6. initialize the object
//! 7. commit the reservation
//! 8. register the object
//! 9. publish a handle
//!
//! Steps 3 to 5 unwind through `Drop`: the reservation releases its charge
//! and the uninitialized object frees its slab slot. After step 7 the charge
//! belongs to the object, so a failed step 9 (full table, or a table already
//! finalized because the process is being destroyed) tears the object down,
//! which unregisters it and returns the charge.

use super::{validate_range, validate_transfer_permission};
use crate::object::KernelObject;
use crate::object_audit::KernelEvent;
use crate::process::SimulatedProcess;
use crate::transfer_memory::TransferMemory;
use crate::SimulatedKernel;
use core_types::{Handle, MemoryPermission, VAddr};
use kernel_api::KernelError;
use resources::LimitableResource;
use std::sync::Arc;

pub(crate) fn create_transfer_memory(
    kernel: &SimulatedKernel,
    process: &SimulatedProcess,
    address: VAddr,
    size: u64,
    permission: MemoryPermission,
) -> Result<Handle, KernelError> {
    validate_range(address, size)?;
    let permission = validate_transfer_permission(permission)?;

    let resource_limit = process.resource_limit();
    let reservation = resource_limit.reserve(LimitableResource::TransferMemoryCountMax, 1)?;

    let slot = kernel.allocate_object_slot()?;
    let transfer_memory = TransferMemory::create(slot, kernel.object_context().clone());

    if !process.page_table().contains(address, size) {
        log::debug!(
            "{}: {:#x}+{:#x} outside address space of {}",
            transfer_memory.object_id(),
            address,
            size,
            process.id()
        );
        return Err(KernelError::InvalidCurrentMemory);
    }

    transfer_memory.initialize(
        process.id(),
        Arc::clone(resource_limit),
        address,
        size,
        permission,
    )?;
    reservation.commit();

    let object_id = transfer_memory.object_id();
    kernel.object_context().registry.register(&transfer_memory);
    kernel
        .object_context()
        .audit
        .lock()
        .record_event(KernelEvent::ObjectRegistered { object_id });

    let object: Arc<dyn KernelObject> = transfer_memory;
    let handle = publish_handle(kernel, process, &object)?;

    kernel
        .object_context()
        .audit
        .lock()
        .record_event(KernelEvent::HandlePublished {
            process: process.id(),
            handle,
            object_id,
        });
    log::debug!("{} published as {} in {}", object_id, handle, process.id());
    Ok(handle)
}

fn publish_handle(
    kernel: &SimulatedKernel,
    process: &SimulatedProcess,
    object: &Arc<dyn KernelObject>,
) -> Result<Handle, KernelError> {
    if kernel.should_fail_handle_add(process.id()) {
        log::debug!("injected handle table failure for {}", process.id());
        return Err(KernelError::OutOfHandles);
    }

    let mut handle_table = process.handle_table().lock();
    Ok(handle_table.add(object)?)
}
