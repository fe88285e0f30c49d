//! Builder for containers with pre-registered lifecycle hooks and type
//! finders, for hosts that assemble their registry up front.

use crate::binding::BindingRecord;
use crate::container::Container;
use crate::instance::ServiceInstance;
use crate::introspection::TypeHandle;
use crate::shared::SharedContainer;

/// Builder for [Container] with hooks and finders installed before any
/// service is registered.
#[derive(Default)]
pub struct ContainerBuilder {
    container: Container,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-registers a global resolving decorator.
    pub fn with_resolving(
        mut self,
        hook: impl Fn(&BindingRecord, ServiceInstance) -> ServiceInstance + Send + Sync + 'static,
    ) -> Self {
        self.container.on_resolving(hook);
        self
    }

    /// Pre-registers a global release decorator.
    pub fn with_release(
        mut self,
        hook: impl Fn(&BindingRecord, &ServiceInstance) + Send + Sync + 'static,
    ) -> Self {
        self.container.on_release(hook);
        self
    }

    /// Pre-registers a type finder; `None` priority runs it last.
    pub fn with_type_finder(
        mut self,
        priority: Option<i32>,
        finder: impl Fn(&str) -> Option<TypeHandle> + Send + Sync + 'static,
    ) -> Self {
        self.container.on_find_type(finder, priority);
        self
    }

    pub fn build(self) -> Container {
        self.container
    }

    /// Builds and wraps the container for cross-thread sharing.
    pub fn build_shared(self) -> SharedContainer {
        SharedContainer::from(self.build())
    }
}
