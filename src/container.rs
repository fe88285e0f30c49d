//! The container: registry store, resolution engine and lifecycle pipeline.
//!
//! Every operation takes `&mut self`; factories, hooks and rebind callbacks
//! receive the same `&mut Container`, so nested resolution recurses through
//! the borrow instead of re-acquiring a lock. Wrap the container in
//! [SharedContainer](crate::shared::SharedContainer) to share it between
//! threads under a single per-operation lock.

use crate::binding::BindingRecord;
use crate::error::{RegistryError, ResolveError};
use crate::instance::{ServiceFactory, ServiceInstance};
use crate::introspection::TypeHandle;
use crate::registry::RegistryTables;
use itertools::Itertools;
use std::sync::Arc;
use tracing::debug;

/// Ceiling on user-supplied arguments per call, bounding the injector's
/// argument-pool scan.
pub const MAX_USER_ARGUMENTS: usize = 255;

/// An inversion-of-control service registry: register how named services are
/// produced, then request fully-constructed instances by name.
#[derive(Default)]
pub struct Container {
    pub(crate) tables: RegistryTables,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    fn normalized(name: &str) -> Result<String, RegistryError> {
        let name = name.trim();
        if name.is_empty() {
            Err(RegistryError::EmptyServiceName)
        } else {
            Ok(name.to_string())
        }
    }

    // --- registry store ---

    /// Registers a factory for `service`. Fails if the name is already a
    /// binding, an alias or a cached instance. The returned record accepts
    /// contextual overrides and per-binding hooks.
    pub fn bind<F>(
        &mut self,
        service: &str,
        factory: F,
        is_static: bool,
    ) -> Result<&mut BindingRecord, RegistryError>
    where
        F: Fn(&mut Container, Vec<ServiceInstance>) -> Result<ServiceInstance, ResolveError>
            + Send
            + Sync
            + 'static,
    {
        let service = Self::normalized(service)?;
        let record = BindingRecord::new(service.clone(), Some(Arc::new(factory)), None, is_static);
        self.bind_record(service, record, false)
    }

    /// Registers a type descriptor for `service`. The generated factory
    /// performs raw construction of the type through the engine; decoration
    /// and caching still happen exactly once, at the outermost `make`.
    pub fn bind_type(
        &mut self,
        service: &str,
        ty: TypeHandle,
        is_static: bool,
    ) -> Result<&mut BindingRecord, RegistryError> {
        let service = Self::normalized(service)?;
        let record = Self::type_record(service.clone(), ty, is_static);
        self.bind_record(service, record, false)
    }

    /// Non-throwing `bind` variant: returns the existing record if the name
    /// is already bound, otherwise binds.
    pub fn bind_if<F>(
        &mut self,
        service: &str,
        factory: F,
        is_static: bool,
    ) -> Result<&mut BindingRecord, RegistryError>
    where
        F: Fn(&mut Container, Vec<ServiceInstance>) -> Result<ServiceInstance, ResolveError>
            + Send
            + Sync
            + 'static,
    {
        let service = Self::normalized(service)?;
        let record = BindingRecord::new(service.clone(), Some(Arc::new(factory)), None, is_static);
        self.bind_record(service, record, true)
    }

    /// Non-throwing `bind_type` variant; see [bind_if](Container::bind_if).
    pub fn bind_type_if(
        &mut self,
        service: &str,
        ty: TypeHandle,
        is_static: bool,
    ) -> Result<&mut BindingRecord, RegistryError> {
        let service = Self::normalized(service)?;
        let record = Self::type_record(service.clone(), ty, is_static);
        self.bind_record(service, record, true)
    }

    /// A record whose generated factory raw-builds the bound type.
    fn type_record(service: String, ty: TypeHandle, is_static: bool) -> BindingRecord {
        let adapter_service = service.clone();
        let factory: ServiceFactory = Arc::new(move |container, arguments| {
            let binding = container.binding_snapshot(&adapter_service);
            match binding.concrete().cloned() {
                Some(ty) => container.construct(&binding, &ty, arguments),
                None => Err(ResolveError::Unresolvable {
                    service: adapter_service.clone(),
                    build_stack: container.build_stack().to_vec(),
                }),
            }
        });
        BindingRecord::new(service, Some(factory), Some(ty), is_static)
    }

    /// Registers a static (singleton) factory binding.
    pub fn singleton<F>(&mut self, service: &str, factory: F) -> Result<&mut BindingRecord, RegistryError>
    where
        F: Fn(&mut Container, Vec<ServiceInstance>) -> Result<ServiceInstance, ResolveError>
            + Send
            + Sync
            + 'static,
    {
        self.bind(service, factory, true)
    }

    /// Registers a static (singleton) type binding.
    pub fn singleton_type(
        &mut self,
        service: &str,
        ty: TypeHandle,
    ) -> Result<&mut BindingRecord, RegistryError> {
        self.bind_type(service, ty, true)
    }

    fn bind_record(
        &mut self,
        service: String,
        record: BindingRecord,
        reuse_existing: bool,
    ) -> Result<&mut BindingRecord, RegistryError> {
        if self.tables.aliases.contains_key(&service) {
            return Err(RegistryError::AliasRegistered(service));
        }

        let occupied = self.tables.bindings.contains_key(&service);
        if occupied && !reuse_existing {
            return Err(RegistryError::ServiceRegistered(service));
        }
        if !occupied && self.tables.instances.contains_key(&service) {
            return Err(RegistryError::ServiceRegistered(service));
        }

        debug!("binding service '{service}'");
        Ok(self.tables.bindings.entry(service).or_insert(record))
    }

    /// Registers `alias` as an alternate name for `service`. The target must
    /// already have a binding or a cached instance; aliases never chain.
    pub fn alias(&mut self, alias: &str, service: &str) -> Result<(), RegistryError> {
        let alias = Self::normalized(alias)?;
        let service = Self::normalized(service)?;

        if alias == service {
            return Err(RegistryError::SelfAlias(alias));
        }
        if self.tables.aliases.contains_key(&alias) {
            return Err(RegistryError::AliasRegistered(alias));
        }
        if self.tables.bindings.contains_key(&alias) || self.tables.instances.contains_key(&alias) {
            return Err(RegistryError::ServiceRegistered(alias));
        }
        if !self.tables.bindings.contains_key(&service)
            && !self.tables.instances.contains_key(&service)
        {
            return Err(RegistryError::MissingAliasTarget {
                alias,
                target: service,
            });
        }

        self.tables.aliases.insert(alias.clone(), service.clone());
        self.tables
            .aliases_reverse
            .entry(service)
            .or_default()
            .push(alias);
        Ok(())
    }

    /// Appends services to a tag's member list. Members are not validated
    /// until [tagged](Container::tagged) resolves them.
    pub fn tag(&mut self, tag: &str, services: &[&str]) -> Result<(), RegistryError> {
        let tag = Self::normalized(tag)?;
        let members: Vec<String> = services
            .iter()
            .map(|service| Self::normalized(service))
            .try_collect()?;
        self.tables.tags.entry(tag).or_default().extend(members);
        Ok(())
    }

    /// Resolves every member of a tag, in list order. Individual `make`
    /// failures propagate; an unknown tag is a configuration error.
    pub fn tagged(&mut self, tag: &str) -> Result<Vec<ServiceInstance>, ResolveError> {
        let tag = Self::normalized(tag)?;
        let members = self
            .tables
            .tags
            .get(&tag)
            .cloned()
            .ok_or(RegistryError::UnknownTag(tag))?;
        members.iter().map(|service| self.make(service)).try_collect()
    }

    /// Removes a binding: releases its cached instance, strips aliases
    /// pointing at it and drops the record. Unknown names are a no-op.
    pub fn unbind(&mut self, service: &str) {
        let service = self.alias_target(service);
        if service.is_empty() {
            return;
        }

        self.release_canonical(&service);
        if let Some(aliases) = self.tables.aliases_reverse.remove(&service) {
            for alias in aliases {
                self.tables.aliases.remove(&alias);
            }
        }
        self.tables.bindings.remove(&service);
    }

    /// Releases every cached instance (hooks fire through the normal release
    /// path), then clears every table, including the decorator lists, the
    /// type-finder chain and its cache, and both resolution stacks.
    pub fn flush(&mut self) {
        debug!("flushing container");
        let services: Vec<String> = self.tables.instances.keys().cloned().collect();
        for service in services {
            self.release_canonical(&service);
        }
        self.tables.clear();
    }

    /// Caches `value` as the instance for `service`, running the resolving
    /// decoration pipeline on it. The name is de-aliased first. An existing
    /// binding must be static; an unbound name gets an empty record. Returns
    /// the decorated instance actually cached.
    pub fn instance(
        &mut self,
        service: &str,
        value: ServiceInstance,
    ) -> Result<ServiceInstance, RegistryError> {
        let service = Self::normalized(service)?;
        let service = self.tables.alias_target(&service);
        self.put_instance(&service, value)
    }

    /// Drops the cached instance for `service`, firing per-binding release
    /// hooks and then the global release decorators. Returns whether an
    /// instance was actually released.
    pub fn release(&mut self, service: &str) -> bool {
        let service = self.alias_target(service);
        !service.is_empty() && self.release_canonical(&service)
    }

    // --- queries ---

    /// Trims and de-aliases a name, exactly once. Non-aliases map to
    /// themselves; an all-whitespace name maps to the empty string.
    pub fn alias_target(&self, name: &str) -> String {
        self.tables.alias_target(name.trim())
    }

    pub fn has_bind(&self, service: &str) -> bool {
        self.tables.bindings.contains_key(&self.alias_target(service))
    }

    pub fn has_instance(&self, service: &str) -> bool {
        self.tables.instances.contains_key(&self.alias_target(service))
    }

    /// Whether the service has been produced at least once through the full
    /// resolution path, or currently holds a cached instance.
    pub fn is_resolved(&self, service: &str) -> bool {
        let service = self.alias_target(service);
        self.tables.resolved.contains(&service) || self.tables.instances.contains_key(&service)
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.tables.aliases.contains_key(name.trim())
    }

    /// Whether resolving the service yields a cached (singleton) instance:
    /// either its binding is static, or an instance has been force-cached.
    pub fn is_static(&self, service: &str) -> bool {
        let service = self.alias_target(service);
        self.tables.instances.contains_key(&service)
            || self
                .tables
                .bindings
                .get(&service)
                .map(BindingRecord::is_static)
                .unwrap_or(false)
    }

    /// Whether `make` has any chance of succeeding: a binding, a cached
    /// instance, or a type the finder chain can supply.
    pub fn can_make(&mut self, service: &str) -> bool {
        let service = self.alias_target(service);
        if service.is_empty() {
            return false;
        }
        self.tables.bindings.contains_key(&service)
            || self.tables.instances.contains_key(&service)
            || self.service_type_canonical(&service).is_some()
    }

    /// The de-aliased binding record for a service, if any.
    pub fn binding(&self, service: &str) -> Option<&BindingRecord> {
        self.tables.bindings.get(&self.alias_target(service))
    }

    /// Mutable access to a binding record, for post-bind configuration.
    pub fn binding_mut(&mut self, service: &str) -> Option<&mut BindingRecord> {
        let service = self.alias_target(service);
        self.tables.bindings.get_mut(&service)
    }

    /// The build stack of resolutions currently in flight, outermost first.
    pub fn build_stack(&self) -> &[String] {
        &self.tables.build_stack
    }

    // --- resolution engine ---

    /// Resolves a service by name. See [make_with](Container::make_with).
    pub fn make(&mut self, service: &str) -> Result<ServiceInstance, ResolveError> {
        self.make_with(service, Vec::new())
    }

    /// Resolves a service by name with user-supplied arguments. The name is
    /// trimmed and de-aliased once; a cached instance is returned as-is
    /// (decorators are not re-applied). A name already on the build stack
    /// fails with a circular-dependency error carrying the active stack.
    pub fn make_with(
        &mut self,
        service: &str,
        arguments: Vec<ServiceInstance>,
    ) -> Result<ServiceInstance, ResolveError> {
        if arguments.len() > MAX_USER_ARGUMENTS {
            return Err(RegistryError::TooManyArguments(arguments.len()).into());
        }

        let service = Self::normalized(service)?;
        let service = self.tables.alias_target(&service);

        if let Some(cached) = self.tables.instances.get(&service) {
            return Ok(cached.clone());
        }
        if self.tables.build_stack.iter().any(|active| *active == service) {
            return Err(ResolveError::CircularDependency {
                service,
                stack: self.tables.build_stack.clone(),
            });
        }

        self.tables.build_stack.push(service.clone());
        self.tables.argument_stack.push(arguments);
        let result = self.resolve(&service);
        self.tables.argument_stack.pop();
        self.tables.build_stack.pop();
        result
    }

    /// The full resolution path for a canonical name already on the build
    /// stack: build, inject properties, cache or decorate, mark resolved.
    fn resolve(&mut self, service: &str) -> Result<ServiceInstance, ResolveError> {
        debug!("resolving service '{service}'");

        let binding = self.binding_snapshot(service);
        let arguments = self
            .tables
            .argument_stack
            .last()
            .cloned()
            .unwrap_or_default();

        let built = match binding.factory().cloned() {
            Some(factory) => factory(self, arguments)?,
            None => match self.service_type_canonical(service) {
                Some(ty) => self.construct(&binding, &ty, arguments)?,
                None => {
                    return Err(ResolveError::Unresolvable {
                        service: service.to_string(),
                        build_stack: self.tables.build_stack.clone(),
                    })
                }
            },
        };

        if let Some(ty) = self.service_type_canonical(service) {
            self.inject_properties(&binding, &ty, &built)?;
        }

        let value = if binding.is_static() {
            self.put_instance(service, built)?
        } else {
            self.fire_resolving(&binding, built)
        };

        self.tables.resolved.insert(service.to_string());
        Ok(value)
    }

    /// Raw construction of a type: constructor selection, dependency
    /// resolution, instantiation. No decorators, no caching, no
    /// resolved-marker update; those belong to the outermost `make`.
    pub fn construct(
        &mut self,
        binding: &BindingRecord,
        ty: &TypeHandle,
        arguments: Vec<ServiceInstance>,
    ) -> Result<ServiceInstance, ResolveError> {
        if !ty.instantiable() {
            return Err(ResolveError::BuildFailed {
                service: binding.service().to_string(),
                type_name: Some(ty.name().to_string()),
                build_stack: self.tables.build_stack.clone(),
                source: crate::introspection::IntrospectionError::NotInstantiable(
                    ty.name().to_string(),
                )
                .into(),
            });
        }

        // last-declared constructor wins; none at all means default
        // instantiation
        let constructors = ty.constructors();
        let (selected, dependencies) = match constructors.last() {
            Some(constructor) => (
                Some(constructors.len() - 1),
                self.resolve_parameters(binding, &constructor.parameters, arguments)?,
            ),
            None => (None, Vec::new()),
        };

        ty.construct(selected, dependencies)
            .map_err(|source| ResolveError::BuildFailed {
                service: binding.service().to_string(),
                type_name: Some(ty.name().to_string()),
                build_stack: self.tables.build_stack.clone(),
                source,
            })
    }

    /// The backing type for a service: the binding's concrete descriptor if
    /// it has one, otherwise the type-finder chain. Finder results — hits and
    /// misses both — are memoized until flush.
    pub fn service_type(&mut self, service: &str) -> Option<TypeHandle> {
        let service = self.alias_target(service);
        if service.is_empty() {
            return None;
        }
        self.service_type_canonical(&service)
    }

    fn service_type_canonical(&mut self, service: &str) -> Option<TypeHandle> {
        if let Some(ty) = self
            .tables
            .bindings
            .get(service)
            .and_then(|binding| binding.concrete().cloned())
        {
            return Some(ty);
        }
        if let Some(cached) = self.tables.finder_cache.get(service) {
            return cached.clone();
        }

        let found = self.tables.finders.iter().find_map(|finder| finder(service));
        self.tables
            .finder_cache
            .insert(service.to_string(), found.clone());
        found
    }

    // --- lifecycle & event pipeline ---

    /// Registers a global resolving decorator. It is immediately re-applied,
    /// in place, to every already-cached instance, so late registration
    /// still reaches existing singletons.
    pub fn on_resolving(
        &mut self,
        hook: impl Fn(&BindingRecord, ServiceInstance) -> ServiceInstance + Send + Sync + 'static,
    ) {
        let hook: crate::instance::ResolvingHook = Arc::new(hook);

        let cached: Vec<String> = self.tables.instances.keys().cloned().collect();
        for service in cached {
            let binding = self.binding_snapshot(&service);
            if let Some(value) = self.tables.instances.get(&service).cloned() {
                let value = hook(&binding, value);
                self.tables.instances.insert(service, value);
            }
        }

        self.tables.resolving.push(hook);
    }

    /// Registers a global release decorator, invoked after per-binding
    /// release hooks whenever a cached instance is released.
    pub fn on_release(
        &mut self,
        hook: impl Fn(&BindingRecord, &ServiceInstance) + Send + Sync + 'static,
    ) {
        self.tables.release.push(Arc::new(hook));
    }

    /// Registers a callback fired when `service` — already resolved at least
    /// once — receives a new cached instance. The callback gets the container
    /// and a freshly made instance.
    pub fn on_rebound(
        &mut self,
        service: &str,
        callback: impl Fn(&mut Container, ServiceInstance) + Send + Sync + 'static,
    ) -> Result<(), RegistryError> {
        let service = Self::normalized(service)?;
        let service = self.tables.alias_target(&service);
        self.tables
            .rebound
            .entry(service)
            .or_default()
            .push(Arc::new(callback));
        Ok(())
    }

    /// Registers a type finder. Lower priorities run first; omitting the
    /// priority runs the finder last.
    pub fn on_find_type(
        &mut self,
        finder: impl Fn(&str) -> Option<TypeHandle> + Send + Sync + 'static,
        priority: Option<i32>,
    ) {
        self.tables
            .finders
            .push(priority.unwrap_or(i32::MAX), Arc::new(finder));
    }

    // --- internals ---

    /// A clone of the binding for a canonical name, or a synthesized empty
    /// non-static record. This is the record to hand to
    /// [dependencies](Container::dependencies) when resolving arguments for
    /// an arbitrary callable.
    pub fn binding_snapshot(&self, service: &str) -> BindingRecord {
        self.tables
            .bindings
            .get(service)
            .cloned()
            .unwrap_or_else(|| BindingRecord::empty(service))
    }

    /// Runs the per-binding resolving hooks, then the global decorator
    /// chain, each in registration order.
    fn fire_resolving(&mut self, binding: &BindingRecord, value: ServiceInstance) -> ServiceInstance {
        let mut value = value;
        for hook in binding.resolving_hooks().to_vec() {
            value = hook(binding, value);
        }
        for hook in self.tables.resolving.clone() {
            value = hook(binding, value);
        }
        value
    }

    fn put_instance(
        &mut self,
        service: &str,
        value: ServiceInstance,
    ) -> Result<ServiceInstance, RegistryError> {
        if let Some(binding) = self.tables.bindings.get(service) {
            if !binding.is_static() {
                return Err(RegistryError::NonStaticInstance(service.to_string()));
            }
        }

        debug!("caching instance for '{service}'");

        // unbound names get a synthesized empty record for hook dispatch
        // only; the record is never registered
        let binding = self.binding_snapshot(service);
        let value = self.fire_resolving(&binding, value);

        let was_resolved = self.tables.resolved.contains(service)
            || self.tables.instances.contains_key(service);
        if self.tables.instances.contains_key(service) {
            self.release_canonical(service);
        }
        self.tables.instances.insert(service.to_string(), value.clone());

        if was_resolved {
            self.fire_rebound(service);
        }

        Ok(value)
    }

    fn fire_rebound(&mut self, service: &str) {
        let callbacks = self.tables.rebound.get(service).cloned().unwrap_or_default();
        if callbacks.is_empty() {
            return;
        }

        debug!("rebinding '{service}'");
        // the instance was just cached, so this hits the fast path
        if let Ok(fresh) = self.make(service) {
            for callback in callbacks {
                callback(self, fresh.clone());
            }
        }
    }

    fn release_canonical(&mut self, service: &str) -> bool {
        let value = match self.tables.instances.remove(service) {
            Some(value) => value,
            None => return false,
        };

        debug!("releasing cached instance for '{service}'");

        let binding = self.binding_snapshot(service);
        for hook in binding.release_hooks().to_vec() {
            hook(&binding, &value);
        }
        for hook in self.tables.release.clone() {
            hook(&binding, &value);
        }
        true
    }
}
