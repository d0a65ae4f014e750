//! Fixed-capacity object storage accounting
//!
//! The kernel sizes storage for each object type up front. An
//! [`ObjectSlab`] counts live objects of one type; each live object holds a
//! [`SlabSlot`] and returns it when dropped.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Slab counter for one object type
#[derive(Debug)]
pub struct ObjectSlab {
    name: &'static str,
    capacity: usize,
    allocated: AtomicUsize,
    peak: AtomicUsize,
}

impl ObjectSlab {
    /// Creates a slab with room for `capacity` live objects
    pub fn new(name: &'static str, capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            name,
            capacity,
            allocated: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    /// Takes one slot, or `None` if the slab is full
    pub fn allocate(self: &Arc<Self>) -> Option<SlabSlot> {
        let previous = self
            .allocated
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.capacity).then_some(n + 1)
            })
            .ok();

        match previous {
            Some(n) => {
                self.peak.fetch_max(n + 1, Ordering::Relaxed);
                Some(SlabSlot {
                    slab: Arc::clone(self),
                })
            }
            None => {
                log::warn!("{} slab exhausted ({} slots)", self.name, self.capacity);
                None
            }
        }
    }

    /// Object type this slab stores
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Maximum number of live objects
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live objects
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Acquire)
    }

    /// Highest number of live objects seen
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }
}

/// One occupied slab slot, freed on drop
#[derive(Debug)]
pub struct SlabSlot {
    slab: Arc<ObjectSlab>,
}

impl Drop for SlabSlot {
    fn drop(&mut self) {
        self.slab.allocated.fetch_sub(1, Ordering::AcqRel);
    }
}
