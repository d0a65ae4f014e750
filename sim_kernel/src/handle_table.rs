//! Per-process handle table
//!
//! Maps guest-visible [`Handle`] values to owned kernel object references.
//! A handle encodes the slot index in its low 15 bits and a linear id above
//! it; the linear id changes every time a slot is reused, so a closed handle
//! never resolves to the object that later takes its slot.

use crate::object::{downcast_object, KernelObject};
use core_types::Handle;
use kernel_api::KernelError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Largest number of entries a handle table can hold
pub const MAX_TABLE_SIZE: usize = 1024;

/// Errors produced by handle table operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HandleTableError {
    #[error("Handle table size {requested} exceeds maximum {max}")]
    TableTooLarge { requested: usize, max: usize },

    #[error("Handle table full ({capacity} entries)")]
    Full { capacity: usize },

    #[error("Handle table has been finalized")]
    Finalized,

    #[error("Invalid handle: {0}")]
    InvalidHandle(Handle),

    #[error("{handle} does not refer to a {expected}")]
    TypeMismatch {
        handle: Handle,
        expected: &'static str,
    },
}

impl From<HandleTableError> for KernelError {
    fn from(err: HandleTableError) -> Self {
        match err {
            HandleTableError::TableTooLarge { .. } => KernelError::OutOfMemory,
            HandleTableError::Full { .. } => KernelError::OutOfHandles,
            HandleTableError::Finalized => KernelError::InvalidState,
            HandleTableError::InvalidHandle(_) | HandleTableError::TypeMismatch { .. } => {
                KernelError::InvalidHandle
            }
        }
    }
}

struct Entry {
    linear_id: u16,
    object: Arc<dyn KernelObject>,
}

/// Handle table owned by a single process
pub struct HandleTable {
    entries: Vec<Option<Entry>>,
    /// Freed slot indices, reused most-recent first
    free_list: Vec<u16>,
    capacity: usize,
    next_linear_id: u16,
    count: usize,
    peak: usize,
    finalized: bool,
}

impl HandleTable {
    /// Creates a table with room for `size` entries (`0` selects the maximum)
    pub fn new(size: usize) -> Result<Self, HandleTableError> {
        if size > MAX_TABLE_SIZE {
            return Err(HandleTableError::TableTooLarge {
                requested: size,
                max: MAX_TABLE_SIZE,
            });
        }
        let capacity = if size == 0 { MAX_TABLE_SIZE } else { size };

        Ok(Self {
            entries: Vec::new(),
            free_list: Vec::new(),
            capacity,
            next_linear_id: Handle::MIN_LINEAR_ID,
            count: 0,
            peak: 0,
            finalized: false,
        })
    }

    /// Publishes `object` and returns its new handle
    ///
    /// The table takes its own reference only on success; on failure the
    /// caller's reference is untouched. A finalized table accepts nothing.
    pub fn add(&mut self, object: &Arc<dyn KernelObject>) -> Result<Handle, HandleTableError> {
        if self.finalized {
            return Err(HandleTableError::Finalized);
        }
        let index = self.allocate_index()?;
        let linear_id = self.allocate_linear_id();

        self.entries[usize::from(index)] = Some(Entry {
            linear_id,
            object: Arc::clone(object),
        });
        self.count += 1;
        self.peak = self.peak.max(self.count);

        Ok(Handle::encode(index, linear_id))
    }

    /// Resolves a handle to the object it names
    pub fn get(&self, handle: Handle) -> Result<Arc<dyn KernelObject>, HandleTableError> {
        let index = self.resolve(handle)?;
        match &self.entries[index] {
            Some(entry) => Ok(Arc::clone(&entry.object)),
            None => Err(HandleTableError::InvalidHandle(handle)),
        }
    }

    /// Resolves a handle and checks the object's concrete type
    pub fn get_typed<T: KernelObject>(&self, handle: Handle) -> Result<Arc<T>, HandleTableError> {
        let object = self.get(handle)?;
        let expected = std::any::type_name::<T>();
        downcast_object::<T>(object).ok_or(HandleTableError::TypeMismatch { handle, expected })
    }

    /// Removes a handle and hands back the reference the table held
    ///
    /// Dropping the returned reference may destroy the object, so callers
    /// should do that after releasing any lock guarding this table.
    pub fn remove(&mut self, handle: Handle) -> Result<Arc<dyn KernelObject>, HandleTableError> {
        let index = self.resolve(handle)?;
        let entry = self.entries[index]
            .take()
            .ok_or(HandleTableError::InvalidHandle(handle))?;

        self.free_list.push(handle.index());
        self.count -= 1;
        Ok(entry.object)
    }

    /// Empties and closes the table, returning every reference it held
    ///
    /// Later calls to [`HandleTable::add`] fail with
    /// [`HandleTableError::Finalized`].
    pub fn finalize(&mut self) -> Vec<Arc<dyn KernelObject>> {
        self.finalized = true;
        let objects = self
            .entries
            .drain(..)
            .flatten()
            .map(|entry| entry.object)
            .collect();
        self.free_list.clear();
        self.count = 0;
        objects
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.count
    }

    /// Checks if the table holds no handles
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Checks if the table has been finalized
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Maximum number of live handles
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Highest number of live handles seen at once
    pub fn peak(&self) -> usize {
        self.peak
    }

    fn allocate_index(&mut self) -> Result<u16, HandleTableError> {
        if let Some(index) = self.free_list.pop() {
            return Ok(index);
        }
        if self.entries.len() >= self.capacity {
            return Err(HandleTableError::Full {
                capacity: self.capacity,
            });
        }
        let index = u16::try_from(self.entries.len()).map_err(|_| HandleTableError::Full {
            capacity: self.capacity,
        })?;
        self.entries.push(None);
        Ok(index)
    }

    fn allocate_linear_id(&mut self) -> u16 {
        let id = self.next_linear_id;
        self.next_linear_id = if id >= Handle::MAX_LINEAR_ID {
            Handle::MIN_LINEAR_ID
        } else {
            id + 1
        };
        id
    }

    fn resolve(&self, handle: Handle) -> Result<usize, HandleTableError> {
        if handle.is_pseudo() || !handle.is_well_formed() {
            return Err(HandleTableError::InvalidHandle(handle));
        }
        let index = usize::from(handle.index());
        match self.entries.get(index) {
            Some(Some(entry)) if entry.linear_id == handle.linear_id() => Ok(index),
            _ => Err(HandleTableError::InvalidHandle(handle)),
        }
    }
}

impl fmt::Debug for HandleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleTable")
            .field("count", &self.count)
            .field("capacity", &self.capacity)
            .field("peak", &self.peak)
            .field("finalized", &self.finalized)
            .finish()
    }
}
