//! Deterministic fault injection for testing
//!
//! This module provides a composable fault injection framework that allows
//! tests to force failures at the points of object creation that cannot be
//! reached through argument validation alone: object allocation and handle
//! publication.
//!
//! ## Design Philosophy
//!
//! - **Deterministic**: Faults fire on exact call counts, never randomly
//! - **Composable**: Multiple faults can be combined in one plan
//! - **Test-focused**: Not intended for production use
//!
//! ## Example
//!
//! ```
//! use sim_kernel::fault_injection::{FaultPlan, HandleFault, ObjectFault};
//!
//! let plan = FaultPlan::new()
//!     .with_object_fault(ObjectFault::FailNextAllocations { count: 1 })
//!     .with_handle_fault(HandleFault::FailNextAdds { count: 2 });
//! ```

use core_types::ProcessId;
use std::collections::HashMap;

/// A fault to inject into kernel object allocation
#[derive(Debug, Clone)]
pub enum ObjectFault {
    /// Fail the next N allocations
    FailNextAllocations { count: usize },

    /// Let N allocations succeed, then fail every later one
    FailAfterAllocations { successes: usize },
}

/// A fault to inject into handle publication
#[derive(Debug, Clone)]
pub enum HandleFault {
    /// Fail the next N handle-table insertions in any process
    FailNextAdds { count: usize },

    /// Fail the next N handle-table insertions in one process
    FailNextAddsForProcess { process: ProcessId, count: usize },
}

/// A plan describing all faults to inject
///
/// This is configured per-test and provides a deterministic way to
/// drive the kernel down its unwind paths.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    object_faults: Vec<ObjectFault>,
    handle_faults: Vec<HandleFault>,
}

impl FaultPlan {
    /// Creates a new empty fault plan
    pub fn new() -> Self {
        Self {
            object_faults: Vec::new(),
            handle_faults: Vec::new(),
        }
    }

    /// Adds an object allocation fault to the plan
    pub fn with_object_fault(mut self, fault: ObjectFault) -> Self {
        self.object_faults.push(fault);
        self
    }

    /// Adds a handle publication fault to the plan
    pub fn with_handle_fault(mut self, fault: HandleFault) -> Self {
        self.handle_faults.push(fault);
        self
    }

    /// Returns the object faults
    pub fn object_faults(&self) -> &[ObjectFault] {
        &self.object_faults
    }

    /// Returns the handle faults
    pub fn handle_faults(&self) -> &[HandleFault] {
        &self.handle_faults
    }
}

/// Fault injector that decides, call by call, whether a fault fires
#[derive(Debug)]
pub struct FaultInjector {
    allocations_attempted: usize,
    fail_next_allocations: usize,
    fail_after_allocations: Option<usize>,
    fail_next_adds: usize,
    fail_next_adds_for_process: HashMap<ProcessId, usize>,
    faults_fired: usize,
}

impl FaultInjector {
    /// Creates a new fault injector with the given plan
    pub fn new(plan: FaultPlan) -> Self {
        let mut injector = Self {
            allocations_attempted: 0,
            fail_next_allocations: 0,
            fail_after_allocations: None,
            fail_next_adds: 0,
            fail_next_adds_for_process: HashMap::new(),
            faults_fired: 0,
        };

        for fault in plan.object_faults() {
            match fault {
                ObjectFault::FailNextAllocations { count } => {
                    injector.fail_next_allocations += *count;
                }
                ObjectFault::FailAfterAllocations { successes } => {
                    injector.fail_after_allocations = Some(*successes);
                }
            }
        }

        for fault in plan.handle_faults() {
            match fault {
                HandleFault::FailNextAdds { count } => {
                    injector.fail_next_adds += *count;
                }
                HandleFault::FailNextAddsForProcess { process, count } => {
                    *injector.fail_next_adds_for_process.entry(*process).or_insert(0) += *count;
                }
            }
        }

        injector
    }

    /// Checks if the next object allocation should fail
    pub fn should_fail_allocation(&mut self) -> bool {
        self.allocations_attempted += 1;

        let fire = if self.fail_next_allocations > 0 {
            self.fail_next_allocations -= 1;
            true
        } else {
            matches!(self.fail_after_allocations, Some(successes) if self.allocations_attempted > successes)
        };

        if fire {
            self.faults_fired += 1;
        }
        fire
    }

    /// Checks if the next handle insertion into `process` should fail
    pub fn should_fail_handle_add(&mut self, process: ProcessId) -> bool {
        if self.fail_next_adds > 0 {
            self.fail_next_adds -= 1;
            self.faults_fired += 1;
            return true;
        }

        if let Some(count) = self.fail_next_adds_for_process.get_mut(&process) {
            if *count > 0 {
                *count -= 1;
                self.faults_fired += 1;
                return true;
            }
        }

        false
    }

    /// Returns the number of allocation checks made
    pub fn allocations_attempted(&self) -> usize {
        self.allocations_attempted
    }

    /// Returns the number of faults that fired
    pub fn faults_fired(&self) -> usize {
        self.faults_fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_plan_creation() {
        let plan = FaultPlan::new();
        assert_eq!(plan.object_faults().len(), 0);
        assert_eq!(plan.handle_faults().len(), 0);
    }

    #[test]
    fn test_fault_plan_with_faults() {
        let plan = FaultPlan::new()
            .with_object_fault(ObjectFault::FailNextAllocations { count: 1 })
            .with_handle_fault(HandleFault::FailNextAdds { count: 1 });
        assert_eq!(plan.object_faults().len(), 1);
        assert_eq!(plan.handle_faults().len(), 1);
    }

    #[test]
    fn test_fail_next_allocations() {
        let plan = FaultPlan::new().with_object_fault(ObjectFault::FailNextAllocations { count: 2 });
        let mut injector = FaultInjector::new(plan);

        assert!(injector.should_fail_allocation());
        assert!(injector.should_fail_allocation());
        assert!(!injector.should_fail_allocation());
        assert_eq!(injector.allocations_attempted(), 3);
        assert_eq!(injector.faults_fired(), 2);
    }

    #[test]
    fn test_fail_after_allocations() {
        let plan =
            FaultPlan::new().with_object_fault(ObjectFault::FailAfterAllocations { successes: 2 });
        let mut injector = FaultInjector::new(plan);

        assert!(!injector.should_fail_allocation());
        assert!(!injector.should_fail_allocation());
        assert!(injector.should_fail_allocation());
        assert!(injector.should_fail_allocation());
    }

    #[test]
    fn test_fail_next_adds() {
        let plan = FaultPlan::new().with_handle_fault(HandleFault::FailNextAdds { count: 1 });
        let mut injector = FaultInjector::new(plan);
        let process = ProcessId::new();

        assert!(injector.should_fail_handle_add(process));
        assert!(!injector.should_fail_handle_add(process));
    }

    #[test]
    fn test_fail_adds_for_one_process() {
        let target = ProcessId::new();
        let other = ProcessId::new();
        let plan = FaultPlan::new().with_handle_fault(HandleFault::FailNextAddsForProcess {
            process: target,
            count: 1,
        });
        let mut injector = FaultInjector::new(plan);

        assert!(!injector.should_fail_handle_add(other));
        assert!(injector.should_fail_handle_add(target));
        assert!(!injector.should_fail_handle_add(target));
    }

    #[test]
    fn test_empty_plan_never_fires() {
        let mut injector = FaultInjector::new(FaultPlan::new());
        for _ in 0..10 {
            assert!(!injector.should_fail_allocation());
            assert!(!injector.should_fail_handle_add(ProcessId::new()));
        }
        assert_eq!(injector.faults_fired(), 0);
    }
}
