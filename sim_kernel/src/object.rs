//! Kernel object trait and shared object bookkeeping

use crate::object_audit::SharedAuditLog;
use crate::registry::ObjectRegistry;
use core_types::ObjectId;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// An object a handle can name
///
/// Handle tables store `Arc<dyn KernelObject>`; typed lookups go through
/// [`downcast_object`].
pub trait KernelObject: Any + Send + Sync + fmt::Debug {
    /// Stable identity of this object
    fn object_id(&self) -> ObjectId;

    /// Human-readable type name, used in logs and audit events
    fn type_name(&self) -> &'static str;

    /// Upcast for downcasting
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Recovers the concrete type of a kernel object
///
/// Returns `None` if the object is not a `T`.
pub fn downcast_object<T: KernelObject>(object: Arc<dyn KernelObject>) -> Option<Arc<T>> {
    object.into_any().downcast::<T>().ok()
}

/// Kernel-wide state every object needs at destruction time
#[derive(Debug, Clone)]
pub struct ObjectContext {
    pub registry: Arc<ObjectRegistry>,
    pub audit: SharedAuditLog,
}

impl ObjectContext {
    /// Creates a context with an empty registry and audit log
    pub fn new() -> Self {
        Self {
            registry: Arc::new(ObjectRegistry::new()),
            audit: crate::object_audit::KernelAuditLog::shared(),
        }
    }
}

impl Default for ObjectContext {
    fn default() -> Self {
        Self::new()
    }
}
