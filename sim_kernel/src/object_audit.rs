//! Kernel object audit log
//!
//! Tracks the lifecycle of kernel objects and the handles that name them.
//!
//! This module provides test-visible auditing of:
//! - Object construction, initialization, registration and destruction
//! - Handle publication and closing
//! - Kernel calls that failed, with the error returned to the guest
//!
//! Audit logs are deterministic and queryable in tests but do not affect
//! correctness or enforcement logic.

use core_types::{Handle, ObjectId, ProcessId, TransferMemoryPermission, VAddr};
use kernel_api::KernelError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Kernel object lifecycle event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KernelEvent {
    /// Object storage allocated, object not yet initialized
    ObjectCreated { object_id: ObjectId, type_name: String },

    /// Transfer memory bound to a range and owner
    TransferMemoryInitialized {
        object_id: ObjectId,
        owner: ProcessId,
        address: VAddr,
        size: u64,
        permission: TransferMemoryPermission,
    },

    /// Object added to the global registry
    ObjectRegistered { object_id: ObjectId },

    /// Last reference dropped
    ObjectDestroyed {
        object_id: ObjectId,
        /// Set when the object had been initialized and held a resource charge
        owner: Option<ProcessId>,
    },

    /// Handle added to a process handle table
    HandlePublished {
        process: ProcessId,
        handle: Handle,
        object_id: ObjectId,
    },

    /// Handle removed from a process handle table
    HandleClosed {
        process: ProcessId,
        handle: Handle,
        object_id: ObjectId,
    },

    /// A kernel call returned an error
    CallFailed {
        process: ProcessId,
        call: String,
        error: KernelError,
    },
}

impl KernelEvent {
    /// Object the event refers to, if any
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            Self::ObjectCreated { object_id, .. }
            | Self::TransferMemoryInitialized { object_id, .. }
            | Self::ObjectRegistered { object_id }
            | Self::ObjectDestroyed { object_id, .. }
            | Self::HandlePublished { object_id, .. }
            | Self::HandleClosed { object_id, .. } => Some(*object_id),
            Self::CallFailed { .. } => None,
        }
    }
}

/// Audit entry with sequence number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelAuditEntry {
    pub sequence: u64,
    pub event: KernelEvent,
}

/// Kernel audit log
///
/// Test-visible log of object lifecycle events, in the order they happened.
#[derive(Debug, Default)]
pub struct KernelAuditLog {
    entries: Vec<KernelAuditEntry>,
    next_sequence: u64,
}

/// Audit log shared between the kernel and the objects it creates
pub type SharedAuditLog = Arc<Mutex<KernelAuditLog>>;

impl KernelAuditLog {
    /// Creates a new empty audit log
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_sequence: 0,
        }
    }

    /// Creates a new empty audit log ready for sharing
    pub fn shared() -> SharedAuditLog {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Records an event
    pub fn record_event(&mut self, event: KernelEvent) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.push(KernelAuditEntry { sequence, event });
    }

    /// Returns the number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks if the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns all entries
    pub fn get_entries(&self) -> &[KernelAuditEntry] {
        &self.entries
    }

    /// Checks if any entry matches a predicate
    pub fn has_event<F>(&self, predicate: F) -> bool
    where
        F: Fn(&KernelEvent) -> bool,
    {
        self.entries.iter().any(|entry| predicate(&entry.event))
    }

    /// Counts events matching a predicate
    pub fn count_events<F>(&self, predicate: F) -> usize
    where
        F: Fn(&KernelEvent) -> bool,
    {
        self.entries
            .iter()
            .filter(|entry| predicate(&entry.event))
            .count()
    }

    /// Returns the events for one object, in order
    pub fn events_for_object(&self, object_id: ObjectId) -> Vec<&KernelEvent> {
        self.entries
            .iter()
            .map(|entry| &entry.event)
            .filter(|event| event.object_id() == Some(object_id))
            .collect()
    }

    /// Clears all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
