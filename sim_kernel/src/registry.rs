//! Global object registry
//!
//! The registry lets the kernel enumerate live objects (for shutdown sweeps
//! and diagnostics) without keeping any of them alive. Entries are `Weak`;
//! an object removes its own entry when it is destroyed.

use crate::object::{downcast_object, KernelObject};
use core_types::ObjectId;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

/// Process-wide set of live kernel objects
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    objects: Mutex<BTreeMap<ObjectId, Weak<dyn KernelObject>>>,
}

impl ObjectRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
        }
    }

    /// Adds a non-owning entry for `object`
    pub fn register<T: KernelObject>(&self, object: &Arc<T>) {
        let weak: Weak<T> = Arc::downgrade(object);
        let weak: Weak<dyn KernelObject> = weak;
        self.objects.lock().insert(object.object_id(), weak);
    }

    /// Removes the entry for `object_id`, returning whether one existed
    pub fn unregister(&self, object_id: ObjectId) -> bool {
        self.objects.lock().remove(&object_id).is_some()
    }

    /// Checks if an entry exists for `object_id`
    pub fn contains(&self, object_id: ObjectId) -> bool {
        self.objects.lock().contains_key(&object_id)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    /// Checks if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    /// Returns strong references to every object still alive, oldest first
    ///
    /// Objects whose last reference is being dropped are skipped.
    pub fn live_objects(&self) -> Vec<Arc<dyn KernelObject>> {
        let objects = self.objects.lock();
        objects.values().filter_map(Weak::upgrade).collect()
    }

    /// Returns every live object of type `T`
    pub fn live_objects_of<T: KernelObject>(&self) -> Vec<Arc<T>> {
        self.live_objects()
            .into_iter()
            .filter_map(downcast_object::<T>)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;

    #[derive(Debug)]
    struct Dummy {
        id: ObjectId,
    }

    impl KernelObject for Dummy {
        fn object_id(&self) -> ObjectId {
            self.id
        }

        fn type_name(&self) -> &'static str {
            "Dummy"
        }

        fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    fn dummy() -> Arc<Dummy> {
        Arc::new(Dummy { id: ObjectId::new() })
    }

    #[test]
    fn test_register_and_unregister() {
        let registry = ObjectRegistry::new();
        let object = dummy();

        registry.register(&object);
        assert!(registry.contains(object.id));
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister(object.id));
        assert!(!registry.unregister(object.id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_does_not_extend_lifetime() {
        let registry = ObjectRegistry::new();
        let object = dummy();
        registry.register(&object);

        assert_eq!(Arc::strong_count(&object), 1);
        drop(object);

        // Dummy does not unregister itself; the dead entry is skipped.
        assert_eq!(registry.len(), 1);
        assert!(registry.live_objects().is_empty());
    }

    #[test]
    fn test_live_objects_of_type() {
        let registry = ObjectRegistry::new();
        let a = dummy();
        let b = dummy();
        registry.register(&a);
        registry.register(&b);

        let live = registry.live_objects_of::<Dummy>();
        assert_eq!(live.len(), 2);
        assert!(live.iter().any(|o| o.id == a.id));
    }

    #[test]
    fn test_live_objects_in_creation_order() {
        let registry = ObjectRegistry::new();
        let older = dummy();
        let newer = dummy();
        registry.register(&newer);
        registry.register(&older);

        let ids: Vec<ObjectId> = registry.live_objects().iter().map(|o| o.object_id()).collect();
        assert_eq!(ids, vec![older.id, newer.id]);
    }
}
