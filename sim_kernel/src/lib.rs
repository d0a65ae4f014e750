//! # Simulated Kernel
//!
//! This crate provides a simulated implementation of the kernel API.
//!
//! ## Purpose
//!
//! The simulated kernel services guest kernel calls in-process:
//! - Runs under `cargo test`
//! - Thread-safe: calls may arrive from many guest threads at once
//! - Inspectable (objects, quotas and handle tables are all reachable)
//!
//! ## Object model
//!
//! Kernel objects are reference counted. A process handle table owns the
//! references its handles name; the global [`registry::ObjectRegistry`]
//! only observes them. An object is destroyed when its last handle closes
//! or its owning process is destroyed, and destruction returns whatever
//! resource charge the object held.
//!
//! No lock is held across a whole kernel call. Resource limits, handle
//! tables, the registry and the audit log each synchronize on their own.

pub mod fault_injection;
pub mod handle_table;
pub mod object;
pub mod object_audit;
pub mod page_table;
pub mod process;
pub mod registry;
pub mod slab;
pub mod svc;
pub mod test_utils;
pub mod transfer_memory;

use core_types::{Handle, MemoryPermission, ProcessId, VAddr};
use fault_injection::{FaultInjector, FaultPlan};
use kernel_api::{KernelApi, KernelError};
use object::ObjectContext;
use object_audit::{KernelEvent, SharedAuditLog};
use parking_lot::{Mutex, RwLock};
use process::{ProcessConfig, SimulatedProcess};
use registry::ObjectRegistry;
use serde::{Deserialize, Serialize};
use slab::{ObjectSlab, SlabSlot};
use std::collections::HashMap;
use std::sync::Arc;
use transfer_memory::TransferMemory;

/// Kernel-wide sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Number of transfer memory objects that can exist at once
    pub transfer_memory_slab_capacity: usize,
}

impl KernelConfig {
    /// Default transfer memory slab size
    pub const DEFAULT_TRANSFER_MEMORY_SLAB_CAPACITY: usize = 200;

    pub fn with_transfer_memory_slab_capacity(mut self, capacity: usize) -> Self {
        self.transfer_memory_slab_capacity = capacity;
        self
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            transfer_memory_slab_capacity: Self::DEFAULT_TRANSFER_MEMORY_SLAB_CAPACITY,
        }
    }
}

/// Simulated kernel state
///
/// This maintains all the state needed to simulate a kernel.
/// Unlike a real kernel, this state is directly accessible for testing.
pub struct SimulatedKernel {
    config: KernelConfig,
    processes: RwLock<HashMap<ProcessId, Arc<SimulatedProcess>>>,
    context: ObjectContext,
    transfer_memory_slab: Arc<ObjectSlab>,
    /// Fault injector (optional, for testing)
    fault_injector: Mutex<Option<FaultInjector>>,
}

impl SimulatedKernel {
    /// Creates a new simulated kernel with default sizing
    pub fn new() -> Self {
        Self::with_config(KernelConfig::default())
    }

    /// Creates a new simulated kernel
    pub fn with_config(config: KernelConfig) -> Self {
        Self {
            config,
            processes: RwLock::new(HashMap::new()),
            context: ObjectContext::new(),
            transfer_memory_slab: ObjectSlab::new(
                TransferMemory::TYPE_NAME,
                config.transfer_memory_slab_capacity,
            ),
            fault_injector: Mutex::new(None),
        }
    }

    /// Sets the fault injector for this kernel
    ///
    /// The injector is consulted on every object allocation and every
    /// handle publication.
    pub fn with_fault_injector(self, injector: FaultInjector) -> Self {
        *self.fault_injector.lock() = Some(injector);
        self
    }

    /// Convenience wrapper around [`SimulatedKernel::with_fault_injector`]
    pub fn with_fault_plan(self, plan: FaultPlan) -> Self {
        self.with_fault_injector(FaultInjector::new(plan))
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Creates a process and returns its id
    ///
    /// Fails with `OutOfMemory` if the requested handle table is larger
    /// than the kernel supports.
    pub fn create_process(&self, config: ProcessConfig) -> Result<ProcessId, KernelError> {
        let process = SimulatedProcess::new(config)?;
        let id = process.id();
        log::debug!("created {} ({})", id, process.name());

        self.processes.write().insert(id, Arc::new(process));
        Ok(id)
    }

    /// Destroys a process, closing every handle it holds
    ///
    /// Objects only the process referenced are destroyed and give back
    /// their resource charges.
    pub fn destroy_process(&self, id: ProcessId) -> Result<(), KernelError> {
        let process = self
            .processes
            .write()
            .remove(&id)
            .ok_or(KernelError::NotFound)?;

        let objects = process.handle_table().lock().finalize();
        log::debug!("destroying {} with {} open handles", id, objects.len());
        drop(objects);
        Ok(())
    }

    /// Looks up a live process
    pub fn process(&self, id: ProcessId) -> Result<Arc<SimulatedProcess>, KernelError> {
        self.processes
            .read()
            .get(&id)
            .cloned()
            .ok_or(KernelError::NotFound)
    }

    /// Number of live processes
    pub fn process_count(&self) -> usize {
        self.processes.read().len()
    }

    /// Resolves a handle to the transfer memory it names
    pub fn get_transfer_memory(
        &self,
        process: ProcessId,
        handle: Handle,
    ) -> Result<Arc<TransferMemory>, KernelError> {
        let process = self.process(process)?;
        let handle_table = process.handle_table().lock();
        Ok(handle_table.get_typed::<TransferMemory>(handle)?)
    }

    /// Every transfer memory that is still alive, in object id order
    pub fn live_transfer_memories(&self) -> Vec<Arc<TransferMemory>> {
        self.context.registry.live_objects_of::<TransferMemory>()
    }

    pub fn registry(&self) -> &Arc<ObjectRegistry> {
        &self.context.registry
    }

    pub fn slab(&self) -> &Arc<ObjectSlab> {
        &self.transfer_memory_slab
    }

    pub fn audit_log(&self) -> &SharedAuditLog {
        &self.context.audit
    }

    pub(crate) fn object_context(&self) -> &ObjectContext {
        &self.context
    }

    /// Reserves storage for one transfer memory
    pub(crate) fn allocate_object_slot(&self) -> Result<SlabSlot, KernelError> {
        let injected = self
            .fault_injector
            .lock()
            .as_mut()
            .is_some_and(|injector| injector.should_fail_allocation());
        if injected {
            log::debug!("injected allocation failure");
            return Err(KernelError::OutOfResource);
        }

        self.transfer_memory_slab
            .allocate()
            .ok_or(KernelError::OutOfResource)
    }

    pub(crate) fn should_fail_handle_add(&self, process: ProcessId) -> bool {
        self.fault_injector
            .lock()
            .as_mut()
            .is_some_and(|injector| injector.should_fail_handle_add(process))
    }

    fn record_failure<T>(
        &self,
        process: ProcessId,
        call: &str,
        result: &Result<T, KernelError>,
    ) {
        if let Err(error) = result {
            log::debug!("{} failed for {}: {}", call, process, error);
            self.context.audit.lock().record_event(KernelEvent::CallFailed {
                process,
                call: call.to_string(),
                error: *error,
            });
        }
    }
}

impl Default for SimulatedKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelApi for SimulatedKernel {
    fn create_transfer_memory(
        &self,
        process: ProcessId,
        address: VAddr,
        size: u64,
        permission: MemoryPermission,
    ) -> Result<Handle, KernelError> {
        let result = self.process(process).and_then(|owner| {
            svc::transfer_memory::create_transfer_memory(self, &owner, address, size, permission)
        });
        self.record_failure(process, "CreateTransferMemory", &result);
        result
    }

    fn close_handle(&self, process: ProcessId, handle: Handle) -> Result<(), KernelError> {
        let result = self.process(process).and_then(|owner| {
            let object = owner.handle_table().lock().remove(handle)?;
            self.context.audit.lock().record_event(KernelEvent::HandleClosed {
                process,
                handle,
                object_id: object.object_id(),
            });
            drop(object);
            Ok(())
        });
        self.record_failure(process, "CloseHandle", &result);
        result
    }
}
