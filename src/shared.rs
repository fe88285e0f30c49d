//! Cross-thread sharing for a container. A single exclusive lock guards the
//! whole registry: each outermost operation acquires it once, and nested
//! resolution recurses through the `&mut Container` it already holds, so the
//! lock never needs to be reentrant. Other threads block until the outermost
//! call finishes and never observe partially-updated state.

use crate::container::Container;
use crate::error::{RegistryError, ResolveError};
use crate::instance::ServiceInstance;
use crate::introspection::TypeHandle;
use std::sync::{Arc, Mutex, PoisonError};

/// A cloneable, thread-safe handle to a [Container].
#[derive(Clone, Default)]
pub struct SharedContainer {
    inner: Arc<Mutex<Container>>,
}

impl SharedContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs an operation against the container under the registry lock. Use
    /// this for anything without a direct forwarding method, including
    /// post-bind configuration of a [BindingRecord](crate::BindingRecord).
    pub fn with<R>(&self, operation: impl FnOnce(&mut Container) -> R) -> R {
        // a panicking hook cannot leave the tables half-updated in a way a
        // later flush would not clear, so poisoning is recovered
        let mut container = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        operation(&mut container)
    }

    pub fn make(&self, service: &str) -> Result<ServiceInstance, ResolveError> {
        self.with(|container| container.make(service))
    }

    pub fn make_with(
        &self,
        service: &str,
        arguments: Vec<ServiceInstance>,
    ) -> Result<ServiceInstance, ResolveError> {
        self.with(|container| container.make_with(service, arguments))
    }

    pub fn bind<F>(&self, service: &str, factory: F, is_static: bool) -> Result<(), RegistryError>
    where
        F: Fn(&mut Container, Vec<ServiceInstance>) -> Result<ServiceInstance, ResolveError>
            + Send
            + Sync
            + 'static,
    {
        self.with(|container| container.bind(service, factory, is_static).map(|_| ()))
    }

    pub fn bind_type(
        &self,
        service: &str,
        ty: TypeHandle,
        is_static: bool,
    ) -> Result<(), RegistryError> {
        self.with(|container| container.bind_type(service, ty, is_static).map(|_| ()))
    }

    pub fn instance(
        &self,
        service: &str,
        value: ServiceInstance,
    ) -> Result<ServiceInstance, RegistryError> {
        self.with(|container| container.instance(service, value))
    }

    pub fn alias(&self, alias: &str, service: &str) -> Result<(), RegistryError> {
        self.with(|container| container.alias(alias, service))
    }

    pub fn tag(&self, tag: &str, services: &[&str]) -> Result<(), RegistryError> {
        self.with(|container| container.tag(tag, services))
    }

    pub fn tagged(&self, tag: &str) -> Result<Vec<ServiceInstance>, ResolveError> {
        self.with(|container| container.tagged(tag))
    }

    pub fn release(&self, service: &str) -> bool {
        self.with(|container| container.release(service))
    }

    pub fn unbind(&self, service: &str) {
        self.with(|container| container.unbind(service));
    }

    pub fn flush(&self) {
        self.with(|container| container.flush());
    }

    pub fn has_bind(&self, service: &str) -> bool {
        self.with(|container| container.has_bind(service))
    }

    pub fn has_instance(&self, service: &str) -> bool {
        self.with(|container| container.has_instance(service))
    }

    pub fn can_make(&self, service: &str) -> bool {
        self.with(|container| container.can_make(service))
    }
}

impl From<Container> for SharedContainer {
    fn from(container: Container) -> Self {
        Self {
            inner: Arc::new(Mutex::new(container)),
        }
    }
}
