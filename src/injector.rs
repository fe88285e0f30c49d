//! The dependency injector: decides how a single dependency slot — a
//! constructor/method parameter or an injection-marked property — gets its
//! value. The strategy order is fixed: user-supplied arguments, the
//! contextual/explicit service name, `@name` speculation, the declared
//! default, failure.

use crate::binding::BindingRecord;
use crate::container::{Container, MAX_USER_ARGUMENTS};
use crate::error::{RegistryError, ResolveError};
use crate::instance::ServiceInstance;
use crate::introspection::{ParameterSpec, PropertySpec, TypeHandle, TypeToken};
use tracing::trace;

/// Common view over parameters and properties; properties carry no default.
struct Slot<'a> {
    name: &'a str,
    ty: &'a TypeToken,
    needs: Option<&'a str>,
    default: Option<&'a ServiceInstance>,
}

impl<'a> From<&'a ParameterSpec> for Slot<'a> {
    fn from(parameter: &'a ParameterSpec) -> Self {
        Self {
            name: &parameter.name,
            ty: &parameter.ty,
            needs: parameter.needs.as_deref(),
            default: parameter.default.as_ref(),
        }
    }
}

impl<'a> From<&'a PropertySpec> for Slot<'a> {
    fn from(property: &'a PropertySpec) -> Self {
        Self {
            name: &property.name,
            ty: &property.ty,
            needs: property.needs.as_deref(),
            default: None,
        }
    }
}

/// Takes the first argument matching the slot type out of the pool. Primitive
/// slots additionally accept the first convertible argument, coerced.
fn take_argument(ty: &TypeToken, pool: &mut Vec<ServiceInstance>) -> Option<ServiceInstance> {
    if let Some(position) = pool.iter().position(|candidate| ty.matches(candidate)) {
        return Some(pool.remove(position));
    }
    if ty.is_primitive() {
        let coerced = pool
            .iter()
            .enumerate()
            .find_map(|(position, candidate)| ty.coerce(candidate).map(|value| (position, value)));
        if let Some((position, value)) = coerced {
            pool.remove(position);
            return Some(value);
        }
    }
    None
}

impl Container {
    /// Resolves an argument list for an arbitrary callable's parameters, on
    /// behalf of the given binding. This is the entry point method-invocation
    /// helpers build on.
    pub fn dependencies(
        &mut self,
        binding: &BindingRecord,
        parameters: &[ParameterSpec],
        arguments: Vec<ServiceInstance>,
    ) -> Result<Vec<ServiceInstance>, ResolveError> {
        if arguments.len() > MAX_USER_ARGUMENTS {
            return Err(RegistryError::TooManyArguments(arguments.len()).into());
        }
        self.resolve_parameters(binding, parameters, arguments)
    }

    pub(crate) fn resolve_parameters(
        &mut self,
        binding: &BindingRecord,
        parameters: &[ParameterSpec],
        arguments: Vec<ServiceInstance>,
    ) -> Result<Vec<ServiceInstance>, ResolveError> {
        let mut pool = arguments;
        let mut resolved = Vec::with_capacity(parameters.len());
        for parameter in parameters {
            let slot = Slot::from(parameter);
            if let Some(value) = take_argument(slot.ty, &mut pool) {
                trace!(
                    "slot '{}' of '{}' filled from user arguments",
                    slot.name,
                    binding.service()
                );
                resolved.push(self.guard_slot(binding, &slot, value, "<argument>")?);
                continue;
            }
            resolved.push(self.resolve_slot(binding, &slot)?);
        }
        Ok(resolved)
    }

    /// Injects every marked property of the descriptor onto the instance.
    pub(crate) fn inject_properties(
        &mut self,
        binding: &BindingRecord,
        ty: &TypeHandle,
        instance: &ServiceInstance,
    ) -> Result<(), ResolveError> {
        for property in ty.properties() {
            let value = {
                let slot = Slot::from(&property);
                self.resolve_slot(binding, &slot)?
            };
            ty.set_property(instance, &property.name, value).map_err(|source| {
                ResolveError::BuildFailed {
                    service: binding.service().to_string(),
                    type_name: Some(ty.name().to_string()),
                    build_stack: self.tables.build_stack.clone(),
                    source,
                }
            })?;
        }
        Ok(())
    }

    fn resolve_slot(
        &mut self,
        binding: &BindingRecord,
        slot: &Slot<'_>,
    ) -> Result<ServiceInstance, ResolveError> {
        let needed = binding.contextual_for(slot.needs.unwrap_or_else(|| slot.ty.name()));
        let (value, produced_by) = if slot.ty.is_primitive() {
            self.resolve_primitive_slot(binding, slot, &needed)?
        } else {
            self.resolve_class_slot(binding, slot, &needed)?
        };
        self.guard_slot(binding, slot, value, &produced_by)
    }

    fn resolve_primitive_slot(
        &mut self,
        binding: &BindingRecord,
        slot: &Slot<'_>,
        needed: &str,
    ) -> Result<(ServiceInstance, String), ResolveError> {
        if self.can_make(needed) {
            return self.make(needed).map(|value| (value, needed.to_string()));
        }
        if let Some(found) = self.speculate(binding, slot.name)? {
            return Ok(found);
        }
        if let Some(default) = slot.default {
            trace!("slot '{}' of '{}' using declared default", slot.name, binding.service());
            return Ok((default.clone(), "<default>".to_string()));
        }
        Err(ResolveError::UnresolvablePrimitive {
            slot: slot.name.to_string(),
            service: binding.service().to_string(),
        })
    }

    fn resolve_class_slot(
        &mut self,
        binding: &BindingRecord,
        slot: &Slot<'_>,
        needed: &str,
    ) -> Result<(ServiceInstance, String), ResolveError> {
        let failure = match self.make(needed) {
            Ok(value) => return Ok((value, needed.to_string())),
            Err(error) if error.is_unresolvable() => error,
            Err(error) => return Err(error),
        };

        trace!(
            "service '{needed}' for slot '{}' of '{}' is unresolvable, speculating",
            slot.name,
            binding.service()
        );
        if let Some(found) = self.speculate(binding, slot.name)? {
            return Ok(found);
        }
        if let Some(default) = slot.default {
            return Ok((default.clone(), "<default>".to_string()));
        }
        Err(failure)
    }

    /// Looks up a service named after the slot itself (`@name`), through the
    /// binding's contextual map.
    fn speculate(
        &mut self,
        binding: &BindingRecord,
        slot_name: &str,
    ) -> Result<Option<(ServiceInstance, String)>, ResolveError> {
        let speculative = binding.contextual_for(&format!("@{slot_name}"));
        if self.can_make(&speculative) {
            let value = self.make(&speculative)?;
            Ok(Some((value, speculative)))
        } else {
            Ok(None)
        }
    }

    fn guard_slot(
        &self,
        binding: &BindingRecord,
        slot: &Slot<'_>,
        value: ServiceInstance,
        produced_by: &str,
    ) -> Result<ServiceInstance, ResolveError> {
        if slot.ty.matches(&value) {
            Ok(value)
        } else {
            Err(ResolveError::TypeMismatch {
                service: binding.service().to_string(),
                slot: slot.name.to_string(),
                expected: slot.ty.name().to_string(),
                actual: value.type_name().to_string(),
                produced_by: produced_by.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::container::Container;
    use crate::error::ResolveError;
    use crate::instance::ServiceInstance;
    use crate::introspection::{ParameterSpec, TypeDefinition, TypeToken};

    struct Transport {
        url: String,
    }

    struct Mailer {
        transport_url: String,
        retries: i64,
    }

    fn mailer_type() -> crate::introspection::TypeHandle {
        TypeDefinition::of::<Mailer>()
            .with_constructor(
                vec![
                    ParameterSpec::new("transport", TypeToken::of::<Transport>()),
                    ParameterSpec::new("retries", TypeToken::primitive::<i64>())
                        .with_default(ServiceInstance::new(3i64)),
                ],
                |arguments| {
                    let transport_url = arguments[0]
                        .downcast_ref::<Transport>()
                        .ok_or("transport expected")?
                        .url
                        .clone();
                    let retries = *arguments[1].downcast_ref::<i64>().ok_or("retries expected")?;
                    Ok(ServiceInstance::new(Mailer {
                        transport_url,
                        retries,
                    }))
                },
            )
            .into_handle()
    }

    fn bind_transport(container: &mut Container, service: &str, url: &str) {
        let url = url.to_string();
        container
            .bind(
                service,
                move |_, _| {
                    Ok(ServiceInstance::new(Transport { url: url.clone() }))
                },
                false,
            )
            .unwrap();
    }

    #[test]
    fn should_resolve_constructor_dependencies_by_type_name() {
        let mut container = Container::new();
        bind_transport(
            &mut container,
            crate::introspection::service_name_of::<Transport>(),
            "smtp://default",
        );
        container.bind_type("mailer", mailer_type(), false).unwrap();

        let mailer = container.make("mailer").unwrap();
        let mailer = mailer.downcast_ref::<Mailer>().unwrap();
        assert_eq!(mailer.transport_url, "smtp://default");
        assert_eq!(mailer.retries, 3);
    }

    #[test]
    fn should_consume_each_argument_at_most_once() {
        let mut container = Container::new();
        container.bind_type("mailer", mailer_type(), false).unwrap();

        let mailer = container
            .make_with(
                "mailer",
                vec![
                    ServiceInstance::new(9i64),
                    ServiceInstance::new(Transport {
                        url: "smtp://supplied".to_string(),
                    }),
                    ServiceInstance::new("unused".to_string()),
                ],
            )
            .unwrap();

        let mailer = mailer.downcast_ref::<Mailer>().unwrap();
        assert_eq!(mailer.transport_url, "smtp://supplied");
        assert_eq!(mailer.retries, 9);
    }

    #[test]
    fn should_coerce_convertible_primitive_arguments() {
        struct Buffer {
            size: i64,
        }

        let ty = TypeDefinition::of::<Buffer>()
            .with_constructor(
                vec![ParameterSpec::new(
                    "size",
                    TypeToken::primitive::<i64>().with_coercion(|value| {
                        value
                            .downcast_ref::<i32>()
                            .map(|narrow| ServiceInstance::new(i64::from(*narrow)))
                    }),
                )],
                |arguments| {
                    let size = *arguments[0].downcast_ref::<i64>().ok_or("size expected")?;
                    Ok(ServiceInstance::new(Buffer { size }))
                },
            )
            .into_handle();

        let mut container = Container::new();
        container.bind_type("sized", ty, false).unwrap();

        let sized = container
            .make_with("sized", vec![ServiceInstance::new(5i32)])
            .unwrap();
        assert_eq!(sized.downcast_ref::<Buffer>().unwrap().size, 5);
    }

    #[test]
    fn should_apply_contextual_override() {
        let mut container = Container::new();
        bind_transport(
            &mut container,
            crate::introspection::service_name_of::<Transport>(),
            "smtp://default",
        );
        bind_transport(&mut container, "transport.backup", "smtp://backup");
        container
            .bind_type("mailer", mailer_type(), false)
            .unwrap()
            .needs(crate::introspection::service_name_of::<Transport>())
            .given("transport.backup");

        let mailer = container.make("mailer").unwrap();
        assert_eq!(
            mailer.downcast_ref::<Mailer>().unwrap().transport_url,
            "smtp://backup"
        );
    }

    #[test]
    fn should_speculate_on_slot_name() {
        let mut container = Container::new();
        bind_transport(&mut container, "@transport", "smtp://speculated");
        container.bind_type("mailer", mailer_type(), false).unwrap();

        let mailer = container.make("mailer").unwrap();
        assert_eq!(
            mailer.downcast_ref::<Mailer>().unwrap().transport_url,
            "smtp://speculated"
        );
    }

    #[test]
    fn should_resolve_primitive_slot_from_named_service() {
        let mut container = Container::new();
        bind_transport(&mut container, "@transport", "smtp://speculated");
        container
            .bind("@retries", |_, _| Ok(ServiceInstance::new(7i64)), false)
            .unwrap();
        container.bind_type("mailer", mailer_type(), false).unwrap();

        let mailer = container.make("mailer").unwrap();
        assert_eq!(mailer.downcast_ref::<Mailer>().unwrap().retries, 7);
    }

    #[test]
    fn should_reraise_class_slot_failure() {
        let mut container = Container::new();
        container.bind_type("mailer", mailer_type(), false).unwrap();

        let error = container.make("mailer").unwrap_err();
        assert!(matches!(error, ResolveError::Unresolvable { .. }));
    }

    #[test]
    fn should_fail_unresolvable_primitive_slot() {
        struct Bare {
            size: i64,
        }

        let ty = TypeDefinition::of::<Bare>()
            .with_constructor(
                vec![ParameterSpec::new("size", TypeToken::primitive::<i64>())],
                |arguments| {
                    let size = *arguments[0].downcast_ref::<i64>().ok_or("size expected")?;
                    Ok(ServiceInstance::new(Bare { size }))
                },
            )
            .into_handle();

        let mut container = Container::new();
        container.bind_type("bare", ty, false).unwrap();

        let error = container.make("bare").unwrap_err();
        match error {
            ResolveError::UnresolvablePrimitive { slot, service } => {
                assert_eq!(slot, "size");
                assert_eq!(service, "bare");
            }
            other => panic!("expected unresolvable primitive, got {other}"),
        }
    }

    #[test]
    fn should_reject_mismatched_injection() {
        let mut container = Container::new();
        // a "transport" that actually produces a number
        container
            .bind(
                crate::introspection::service_name_of::<Transport>(),
                |_, _| Ok(ServiceInstance::new(0i64)),
                false,
            )
            .unwrap();
        container.bind_type("mailer", mailer_type(), false).unwrap();

        let error = container.make("mailer").unwrap_err();
        match error {
            ResolveError::TypeMismatch { service, slot, .. } => {
                assert_eq!(service, "mailer");
                assert_eq!(slot, "transport");
            }
            other => panic!("expected type mismatch, got {other}"),
        }
    }

    #[test]
    fn should_resolve_dependencies_for_arbitrary_callables() {
        let mut container = Container::new();
        bind_transport(
            &mut container,
            crate::introspection::service_name_of::<Transport>(),
            "smtp://default",
        );

        let binding = container.binding_snapshot("report");
        let parameters = vec![
            ParameterSpec::new("transport", TypeToken::of::<Transport>()),
            ParameterSpec::new("limit", TypeToken::primitive::<i64>()),
        ];
        let resolved = container
            .dependencies(
                &binding,
                &parameters,
                vec![ServiceInstance::new(10i64)],
            )
            .unwrap();

        assert_eq!(resolved.len(), 2);
        assert_eq!(
            resolved[0].downcast_ref::<Transport>().unwrap().url,
            "smtp://default"
        );
        assert_eq!(*resolved[1].downcast_ref::<i64>().unwrap(), 10);
    }
}
