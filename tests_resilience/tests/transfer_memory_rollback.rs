//! Transfer Memory Rollback Integration Tests
//!
//! Every failure after an acquisition must give back exactly what was
//! acquired:
//! - Quota exhaustion allocates nothing
//! - Allocation failure returns the reservation
//! - Out-of-range addresses destroy the unregistered object
//! - Handle publication failure tears down a committed, registered object
//!
//! Faults are injected deterministically via FaultPlan.

use core_types::{MemoryPermission, PAGE_SIZE};
use kernel_api::{KernelApi, KernelError};
use resources::ResourceLimitConfig;
use sim_kernel::fault_injection::{FaultPlan, HandleFault, ObjectFault};
use sim_kernel::object_audit::KernelEvent;
use sim_kernel::process::ProcessConfig;
use sim_kernel::test_utils::{page, transfer_memory_in_use, with_fault_plan};
use sim_kernel::{KernelConfig, SimulatedKernel};
use tests_resilience::snapshot;

fn limited(limit: u64) -> ProcessConfig {
    ProcessConfig::new("guest")
        .with_resource_limits(ResourceLimitConfig::unlimited().with_transfer_memory_count(limit))
}

// ============================================================================
// Before commit
// ============================================================================

#[test]
fn test_quota_exhaustion_allocates_nothing() {
    let kernel = SimulatedKernel::new();
    let pid = kernel.create_process(limited(2)).unwrap();

    for i in 0..2 {
        kernel
            .create_transfer_memory(pid, page(i), PAGE_SIZE, MemoryPermission::READ)
            .unwrap();
    }
    let before = snapshot(&kernel, pid).unwrap();

    let result = kernel.create_transfer_memory(pid, page(2), PAGE_SIZE, MemoryPermission::READ);

    assert_eq!(result, Err(KernelError::LimitReached));
    assert_eq!(snapshot(&kernel, pid).unwrap(), before);
    assert_eq!(
        kernel
            .audit_log()
            .lock()
            .count_events(|e| matches!(e, KernelEvent::ObjectCreated { .. })),
        2
    );
}

#[test]
fn test_slab_exhaustion_returns_reservation() {
    let kernel = SimulatedKernel::with_config(KernelConfig::default().with_transfer_memory_slab_capacity(2));
    let a = kernel.create_process(limited(4)).unwrap();
    let b = kernel.create_process(limited(4)).unwrap();

    kernel
        .create_transfer_memory(a, page(0), PAGE_SIZE, MemoryPermission::READ)
        .unwrap();
    kernel
        .create_transfer_memory(a, page(1), PAGE_SIZE, MemoryPermission::READ)
        .unwrap();

    // The slab is shared kernel-wide, so process b runs out too.
    let result = kernel.create_transfer_memory(b, page(0), PAGE_SIZE, MemoryPermission::READ);

    assert_eq!(result, Err(KernelError::OutOfResource));
    assert_eq!(transfer_memory_in_use(&kernel, b), Ok(0));
    assert_eq!(kernel.slab().peak(), 2);
}

#[test]
fn test_injected_allocation_failures() {
    let plan = FaultPlan::new().with_object_fault(ObjectFault::FailAfterAllocations { successes: 1 });

    with_fault_plan(plan, |kernel| {
        let pid = kernel.create_process(limited(4)).unwrap();

        assert!(kernel
            .create_transfer_memory(pid, page(0), PAGE_SIZE, MemoryPermission::READ)
            .is_ok());
        for i in 1..4 {
            assert_eq!(
                kernel.create_transfer_memory(pid, page(i), PAGE_SIZE, MemoryPermission::READ),
                Err(KernelError::OutOfResource)
            );
        }
        assert_eq!(transfer_memory_in_use(kernel, pid), Ok(1));
    });
}

#[test]
fn test_out_of_range_destroys_uninitialized_object() {
    let kernel = SimulatedKernel::new();
    let pid = kernel.create_process(limited(1)).unwrap();

    let result = kernel.create_transfer_memory(pid, 1 << 39, PAGE_SIZE, MemoryPermission::READ);
    assert_eq!(result, Err(KernelError::InvalidCurrentMemory));

    let audit = kernel.audit_log().lock();
    let created = audit
        .get_entries()
        .iter()
        .find_map(|entry| match &entry.event {
            KernelEvent::ObjectCreated { object_id, .. } => Some(*object_id),
            _ => None,
        })
        .unwrap();
    let history = audit.events_for_object(created);
    assert_eq!(history.len(), 2);
    assert!(matches!(history[1], KernelEvent::ObjectDestroyed { owner: None, .. }));
    drop(audit);

    // The charge came back, so the next valid call succeeds.
    assert!(kernel
        .create_transfer_memory(pid, page(0), PAGE_SIZE, MemoryPermission::READ)
        .is_ok());
}

// ============================================================================
// After commit
// ============================================================================

#[test]
fn test_handle_fault_tears_down_registered_object() {
    let kernel = SimulatedKernel::new();
    let pid = kernel.create_process(limited(1)).unwrap();
    let kernel = kernel.with_fault_plan(
        FaultPlan::new().with_handle_fault(HandleFault::FailNextAddsForProcess { process: pid, count: 1 }),
    );

    let result = kernel.create_transfer_memory(pid, page(0), PAGE_SIZE, MemoryPermission::READ);
    assert_eq!(result, Err(KernelError::OutOfHandles));

    let after = snapshot(&kernel, pid).unwrap();
    assert_eq!(after.quota_in_use, 0);
    assert_eq!(after.live_objects, 0);
    assert_eq!(after.slab_allocated, 0);
    assert_eq!(after.handles, 0);
    assert!(kernel.registry().is_empty());

    let audit = kernel.audit_log().lock();
    assert!(audit.has_event(|e| matches!(e, KernelEvent::ObjectRegistered { .. })));
    assert!(!audit.has_event(|e| matches!(e, KernelEvent::HandlePublished { .. })));
    assert!(audit.has_event(|e| matches!(
        e,
        KernelEvent::CallFailed { error: KernelError::OutOfHandles, .. }
    )));
    drop(audit);

    // The quota of one is usable again.
    assert!(kernel
        .create_transfer_memory(pid, page(0), PAGE_SIZE, MemoryPermission::READ)
        .is_ok());
}

#[test]
fn test_handle_fault_only_hits_target_process() {
    let kernel = SimulatedKernel::new();
    let victim = kernel.create_process(limited(1)).unwrap();
    let bystander = kernel.create_process(limited(1)).unwrap();
    let kernel = kernel.with_fault_plan(
        FaultPlan::new().with_handle_fault(HandleFault::FailNextAddsForProcess {
            process: victim,
            count: 1,
        }),
    );

    assert!(kernel
        .create_transfer_memory(bystander, page(0), PAGE_SIZE, MemoryPermission::READ)
        .is_ok());
    assert_eq!(
        kernel.create_transfer_memory(victim, page(0), PAGE_SIZE, MemoryPermission::READ),
        Err(KernelError::OutOfHandles)
    );
}

#[test]
fn test_full_handle_table_tears_down_registered_object() {
    let kernel = SimulatedKernel::new();
    let pid = kernel
        .create_process(limited(8).with_handle_table_size(2))
        .unwrap();

    for i in 0..2 {
        kernel
            .create_transfer_memory(pid, page(i), PAGE_SIZE, MemoryPermission::READ)
            .unwrap();
    }
    let before = snapshot(&kernel, pid).unwrap();

    let result = kernel.create_transfer_memory(pid, page(2), PAGE_SIZE, MemoryPermission::READ);

    assert_eq!(result, Err(KernelError::OutOfHandles));
    assert_eq!(snapshot(&kernel, pid).unwrap(), before);
    assert_eq!(before.quota_in_use, 2);
}
