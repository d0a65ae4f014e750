//! Resilience Test Utilities
//!
//! This crate provides shared utilities for resilience and integration tests.
//!
//! ## Test Philosophy
//!
//! - **All or nothing**: A failed kernel call leaves no object, charge or handle behind
//! - **Deterministic failures**: All faults are reproducible via FaultPlan
//! - **No leaks**: Every object is destroyed once its last handle is gone
//! - **Consistency**: Quota counters, registry and slab agree after any sequence of calls

use core_types::ProcessId;
use kernel_api::KernelError;
use resources::LimitableResource;
use sim_kernel::process::ProcessConfig;
use sim_kernel::{KernelConfig, SimulatedKernel};

/// Bootstrap helper for tests
///
/// Builds a kernel and a process from JSON configuration, the way a
/// front end would load them.
pub fn test_bootstrap(
    kernel_json: &str,
    process_json: &str,
) -> Result<(SimulatedKernel, ProcessId), String> {
    let kernel_config: KernelConfig =
        serde_json::from_str(kernel_json).map_err(|e| format!("kernel config: {}", e))?;
    let process_config: ProcessConfig =
        serde_json::from_str(process_json).map_err(|e| format!("process config: {}", e))?;

    let kernel = SimulatedKernel::with_config(kernel_config);
    let process = kernel
        .create_process(process_config)
        .map_err(|e| format!("create process: {}", e))?;
    Ok((kernel, process))
}

/// Snapshot of every counter a transfer memory touches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelSnapshot {
    pub quota_in_use: u64,
    pub live_objects: usize,
    pub slab_allocated: usize,
    pub handles: usize,
}

/// Captures the counters for one process
pub fn snapshot(kernel: &SimulatedKernel, process: ProcessId) -> Result<KernelSnapshot, KernelError> {
    let owner = kernel.process(process)?;
    let handles = owner.handle_table().lock().len();

    Ok(KernelSnapshot {
        quota_in_use: owner
            .resource_limit()
            .current_value(LimitableResource::TransferMemoryCountMax),
        live_objects: kernel.live_transfer_memories().len(),
        slab_allocated: kernel.slab().allocated(),
        handles,
    })
}
