//! Test utilities for resilience testing
//!
//! This module provides helper functions and utilities for writing
//! resilience and integration tests.

use crate::fault_injection::FaultPlan;
use crate::process::ProcessConfig;
use crate::SimulatedKernel;
use core_types::{ProcessId, PAGE_SIZE};
use kernel_api::KernelError;
use resources::{LimitableResource, ResourceLimitConfig};

/// Page the test helpers start placing ranges at
pub const DEFAULT_BASE: u64 = 0x800_0000;

/// Runs a test with a fault plan applied
///
/// This is a convenience helper that creates a kernel with the given
/// fault plan and passes it to the test closure.
///
/// # Example
///
/// ```
/// use sim_kernel::test_utils::with_fault_plan;
/// use sim_kernel::fault_injection::{FaultPlan, ObjectFault};
///
/// with_fault_plan(
///     FaultPlan::new().with_object_fault(ObjectFault::FailNextAllocations { count: 1 }),
///     |kernel| {
///         assert_eq!(kernel.process_count(), 0);
///     }
/// );
/// ```
pub fn with_fault_plan<F>(plan: FaultPlan, f: F)
where
    F: FnOnce(&SimulatedKernel),
{
    let kernel = SimulatedKernel::new().with_fault_plan(plan);
    f(&kernel);
}

/// Creates a kernel with one process limited to `limit` transfer memories
pub fn kernel_with_transfer_memory_quota(limit: u64) -> Result<(SimulatedKernel, ProcessId), KernelError> {
    let kernel = SimulatedKernel::new();
    let process = kernel.create_process(
        ProcessConfig::new("guest")
            .with_resource_limits(ResourceLimitConfig::unlimited().with_transfer_memory_count(limit)),
    )?;
    Ok((kernel, process))
}

/// Transfer memory charges currently held by a process
pub fn transfer_memory_in_use(kernel: &SimulatedKernel, process: ProcessId) -> Result<u64, KernelError> {
    Ok(kernel
        .process(process)?
        .resource_limit()
        .current_value(LimitableResource::TransferMemoryCountMax))
}

/// Address of the `index`-th page after [`DEFAULT_BASE`]
pub fn page(index: u64) -> u64 {
    DEFAULT_BASE + index * PAGE_SIZE
}
