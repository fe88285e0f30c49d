//! Type-erased service instances and the callback aliases used throughout the
//! container. Instances are shared pointers, so cloning one clones a handle,
//! not the underlying value.

use crate::binding::BindingRecord;
use crate::container::Container;
use crate::error::ResolveError;
use crate::introspection::TypeHandle;
use derivative::Derivative;
use std::any::{type_name, Any};
use std::sync::Arc;

/// A resolved service instance: a shared, type-erased value together with the
/// name of the concrete type it was created from. The captured type name
/// exists purely for diagnostics, since `dyn Any` cannot name itself.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct ServiceInstance {
    #[derivative(Debug = "ignore")]
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl ServiceInstance {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: type_name::<T>(),
        }
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            value,
            type_name: type_name::<T>(),
        }
    }

    /// Name of the concrete type captured at creation time.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: Any>(&self) -> bool {
        (*self.value).is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }

    /// Returns a shared pointer to the underlying value, if it is a `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast().ok()
    }

    /// Identity comparison: do both handles point at the same value?
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

/// Recipe stored in a binding: produces an instance from the container and the
/// user-supplied arguments of the current `make_with` call.
pub type ServiceFactory =
    Arc<dyn Fn(&mut Container, Vec<ServiceInstance>) -> Result<ServiceInstance, ResolveError> + Send + Sync>;

/// Decorator applied to resolved instances; returns the (possibly replaced)
/// instance to use from then on.
pub type ResolvingHook = Arc<dyn Fn(&BindingRecord, ServiceInstance) -> ServiceInstance + Send + Sync>;

/// Side-effecting hook invoked when a cached instance is released.
pub type ReleaseHook = Arc<dyn Fn(&BindingRecord, &ServiceInstance) + Send + Sync>;

/// Callback fired when an already-resolved service receives a new cached
/// instance. Receives the container and a freshly made instance.
pub type ReboundCallback = Arc<dyn Fn(&mut Container, ServiceInstance) + Send + Sync>;

/// Callback consulted when an unbound name needs a backing type.
pub type TypeFinder = Arc<dyn Fn(&str) -> Option<TypeHandle> + Send + Sync>;
