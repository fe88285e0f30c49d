//! Binding records: the per-service recipe plus its mutable configuration
//! (contextual overrides and per-binding hooks). Identity — name, factory,
//! static flag — is fixed when the record is created; configuration is added
//! afterwards through the record returned by the `bind*` family.

use crate::instance::{ReleaseHook, ResolvingHook, ServiceFactory, ServiceInstance};
use crate::introspection::TypeHandle;
use derivative::Derivative;
use fxhash::FxHashMap;
use std::sync::Arc;

/// Registered recipe for producing a service. Cloning a record is cheap: the
/// factory and hooks are shared pointers, copied so hooks can run while the
/// container is mutably borrowed by the resolution in flight.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct BindingRecord {
    service: String,
    #[derivative(Debug = "ignore")]
    factory: Option<ServiceFactory>,
    #[derivative(Debug = "ignore")]
    concrete: Option<TypeHandle>,
    is_static: bool,
    contextual: FxHashMap<String, String>,
    #[derivative(Debug = "ignore")]
    resolving_hooks: Vec<ResolvingHook>,
    #[derivative(Debug = "ignore")]
    release_hooks: Vec<ReleaseHook>,
}

impl BindingRecord {
    pub(crate) fn new(
        service: String,
        factory: Option<ServiceFactory>,
        concrete: Option<TypeHandle>,
        is_static: bool,
    ) -> Self {
        Self {
            service,
            factory,
            concrete,
            is_static,
            contextual: FxHashMap::default(),
            resolving_hooks: Vec::new(),
            release_hooks: Vec::new(),
        }
    }

    /// An empty, non-static record synthesized for names resolved without an
    /// explicit bind.
    pub(crate) fn empty(service: &str) -> Self {
        Self::new(service.to_string(), None, None, false)
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn concrete(&self) -> Option<&TypeHandle> {
        self.concrete.as_ref()
    }

    pub(crate) fn factory(&self) -> Option<&ServiceFactory> {
        self.factory.as_ref()
    }

    /// Starts a contextual override: when this binding needs `service`, give
    /// it something else instead.
    ///
    /// ```
    /// # use armature::Container;
    /// # let mut container = Container::new();
    /// # let record = container
    /// #     .bind("mailer", |_, _| Ok(armature::ServiceInstance::new(0i64)), false)
    /// #     .unwrap();
    /// record.needs("transport").given("transport.smtp");
    /// ```
    pub fn needs(&mut self, service: impl Into<String>) -> ContextualBinding<'_> {
        ContextualBinding {
            record: self,
            needs: service.into(),
        }
    }

    /// Adds a per-binding resolving hook, run on every resolution of this
    /// service before the global decorator chain.
    pub fn extend(
        &mut self,
        hook: impl Fn(&BindingRecord, ServiceInstance) -> ServiceInstance + Send + Sync + 'static,
    ) -> &mut Self {
        self.resolving_hooks.push(Arc::new(hook));
        self
    }

    /// Adds a per-binding release hook, run before the global release
    /// decorators when this service's cached instance is released.
    pub fn on_release(
        &mut self,
        hook: impl Fn(&BindingRecord, &ServiceInstance) + Send + Sync + 'static,
    ) -> &mut Self {
        self.release_hooks.push(Arc::new(hook));
        self
    }

    /// Applies the contextual map to a needed service name.
    pub(crate) fn contextual_for(&self, needed: &str) -> String {
        self.contextual
            .get(needed)
            .cloned()
            .unwrap_or_else(|| needed.to_string())
    }

    pub(crate) fn resolving_hooks(&self) -> &[ResolvingHook] {
        &self.resolving_hooks
    }

    pub(crate) fn release_hooks(&self) -> &[ReleaseHook] {
        &self.release_hooks
    }
}

/// Fluent half of a contextual override; see [BindingRecord::needs].
pub struct ContextualBinding<'a> {
    record: &'a mut BindingRecord,
    needs: String,
}

impl<'a> ContextualBinding<'a> {
    /// Completes the override: the needed service is remapped to `service`.
    pub fn given(self, service: impl Into<String>) -> &'a mut BindingRecord {
        self.record.contextual.insert(self.needs, service.into());
        self.record
    }
}

#[cfg(test)]
mod tests {
    use crate::binding::BindingRecord;

    #[test]
    fn should_remap_contextual_needs() {
        let mut record = BindingRecord::empty("mailer");
        record.needs("transport").given("transport.smtp");

        assert_eq!(record.contextual_for("transport"), "transport.smtp");
        assert_eq!(record.contextual_for("logger"), "logger");
    }

    #[test]
    fn should_chain_contextual_overrides() {
        let mut record = BindingRecord::empty("mailer");
        record
            .needs("transport")
            .given("transport.smtp")
            .needs("@retries")
            .given("config.retries");

        assert_eq!(record.contextual_for("transport"), "transport.smtp");
        assert_eq!(record.contextual_for("@retries"), "config.retries");
    }

    #[test]
    fn should_accumulate_hooks() {
        let mut record = BindingRecord::empty("mailer");
        record
            .extend(|_, instance| instance)
            .extend(|_, instance| instance)
            .on_release(|_, _| {});

        assert_eq!(record.resolving_hooks().len(), 2);
        assert_eq!(record.release_hooks().len(), 1);
    }
}
