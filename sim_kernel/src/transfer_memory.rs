//! Transfer memory kernel object
//!
//! A transfer memory marks a page-aligned range the owning process already
//! has mapped as shareable with a restricted permission.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized --initialize--> Initialized --last reference dropped--> Destroyed
//! ```
//!
//! Transitions only move forward. The range, permission and owner exist
//! only inside the `Initialized` state, so an object that was never
//! initialized (or has been destroyed) has no attributes to misuse.
//!
//! An initialized transfer memory owns one `TransferMemoryCountMax` charge on
//! its owner's resource limit and gives it back when destroyed.

use crate::object::{KernelObject, ObjectContext};
use crate::object_audit::KernelEvent;
use crate::slab::SlabSlot;
use core_types::{ObjectId, ProcessId, TransferMemoryPermission, VAddr};
use kernel_api::KernelError;
use parking_lot::Mutex;
use resources::{LimitableResource, ResourceLimit};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Observable lifecycle state of a transfer memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferMemoryState {
    Uninitialized,
    Initialized,
    Destroyed,
}

impl TransferMemoryState {
    /// Checks if moving from `self` to `next` is allowed
    pub fn can_transition_to(self, next: TransferMemoryState) -> bool {
        matches!(
            (self, next),
            (Self::Uninitialized, Self::Initialized) | (Self::Initialized, Self::Destroyed)
        )
    }

    /// Returns `next` if the transition is allowed
    pub fn transition_to(self, next: TransferMemoryState) -> Result<TransferMemoryState, KernelError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(KernelError::InvalidState)
        }
    }
}

impl fmt::Display for TransferMemoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Initialized => write!(f, "Initialized"),
            Self::Destroyed => write!(f, "Destroyed"),
        }
    }
}

/// Snapshot of an initialized transfer memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferMemoryInfo {
    pub object_id: ObjectId,
    pub owner: ProcessId,
    pub address: VAddr,
    pub size: u64,
    pub permission: TransferMemoryPermission,
}

#[derive(Debug)]
struct Binding {
    owner: ProcessId,
    resource_limit: Arc<ResourceLimit>,
    address: VAddr,
    size: u64,
    permission: TransferMemoryPermission,
}

#[derive(Debug)]
enum Lifecycle {
    Uninitialized,
    Initialized(Binding),
    Destroyed,
}

impl Lifecycle {
    fn state(&self) -> TransferMemoryState {
        match self {
            Self::Uninitialized => TransferMemoryState::Uninitialized,
            Self::Initialized(_) => TransferMemoryState::Initialized,
            Self::Destroyed => TransferMemoryState::Destroyed,
        }
    }
}

/// Transfer memory object
#[derive(Debug)]
pub struct TransferMemory {
    object_id: ObjectId,
    lifecycle: Mutex<Lifecycle>,
    context: ObjectContext,
    _slot: SlabSlot,
}

impl TransferMemory {
    /// Type name used in audit events
    pub const TYPE_NAME: &'static str = "TransferMemory";

    /// Creates an uninitialized transfer memory in a reserved slab slot
    ///
    /// The object is not registered anywhere; dropping the returned `Arc`
    /// frees it without trace beyond the audit log.
    pub fn create(slot: SlabSlot, context: ObjectContext) -> Arc<Self> {
        let object_id = ObjectId::new();
        context.audit.lock().record_event(KernelEvent::ObjectCreated {
            object_id,
            type_name: Self::TYPE_NAME.to_string(),
        });

        Arc::new(Self {
            object_id,
            lifecycle: Mutex::new(Lifecycle::Uninitialized),
            context,
            _slot: slot,
        })
    }

    /// Binds the object to a range and owner
    ///
    /// This is a one-shot transition: calling it on an object that is not
    /// `Uninitialized` fails with `InvalidState`. From here on the object
    /// owns one `TransferMemoryCountMax` charge on `resource_limit`, which the
    /// caller must already have committed.
    pub fn initialize(
        &self,
        owner: ProcessId,
        resource_limit: Arc<ResourceLimit>,
        address: VAddr,
        size: u64,
        permission: TransferMemoryPermission,
    ) -> Result<(), KernelError> {
        let mut lifecycle = self.lifecycle.lock();
        lifecycle
            .state()
            .transition_to(TransferMemoryState::Initialized)?;

        *lifecycle = Lifecycle::Initialized(Binding {
            owner,
            resource_limit,
            address,
            size,
            permission,
        });
        drop(lifecycle);

        self.context
            .audit
            .lock()
            .record_event(KernelEvent::TransferMemoryInitialized {
                object_id: self.object_id,
                owner,
                address,
                size,
                permission,
            });
        log::debug!(
            "{} initialized: {:#x}+{:#x} {} for {}",
            self.object_id,
            address,
            size,
            permission,
            owner
        );
        Ok(())
    }

    /// Current lifecycle state
    pub fn state(&self) -> TransferMemoryState {
        self.lifecycle.lock().state()
    }

    /// Checks if the object has been initialized
    pub fn is_initialized(&self) -> bool {
        self.state() == TransferMemoryState::Initialized
    }

    /// Returns the bound attributes, or `InvalidState` if not initialized
    pub fn info(&self) -> Result<TransferMemoryInfo, KernelError> {
        match &*self.lifecycle.lock() {
            Lifecycle::Initialized(binding) => Ok(TransferMemoryInfo {
                object_id: self.object_id,
                owner: binding.owner,
                address: binding.address,
                size: binding.size,
                permission: binding.permission,
            }),
            _ => Err(KernelError::InvalidState),
        }
    }

    /// Start of the shared range
    pub fn address(&self) -> Option<VAddr> {
        self.info().ok().map(|info| info.address)
    }

    /// Length of the shared range
    pub fn size(&self) -> Option<u64> {
        self.info().ok().map(|info| info.size)
    }

    /// Permission granted while shared
    pub fn permission(&self) -> Option<TransferMemoryPermission> {
        self.info().ok().map(|info| info.permission)
    }

    /// Process that created the object
    pub fn owner(&self) -> Option<ProcessId> {
        self.info().ok().map(|info| info.owner)
    }
}

impl KernelObject for TransferMemory {
    fn object_id(&self) -> ObjectId {
        self.object_id
    }

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl Drop for TransferMemory {
    fn drop(&mut self) {
        let lifecycle = self.lifecycle.get_mut();

        // Never-initialized objects hold no charge and stay Uninitialized.
        let owner = if let Lifecycle::Initialized(_) = lifecycle {
            match std::mem::replace(lifecycle, Lifecycle::Destroyed) {
                Lifecycle::Initialized(binding) => {
                    binding
                        .resource_limit
                        .release(LimitableResource::TransferMemoryCountMax, 1);
                    Some(binding.owner)
                }
                _ => None,
            }
        } else {
            None
        };

        self.context.registry.unregister(self.object_id);
        self.context
            .audit
            .lock()
            .record_event(KernelEvent::ObjectDestroyed {
                object_id: self.object_id,
                owner,
            });
        log::trace!("{} destroyed", self.object_id);
    }
}
