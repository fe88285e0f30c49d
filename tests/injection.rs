use armature::{
    service_name_of, Container, ParameterSpec, PropertySpec, ResolveError, ServiceInstance,
    TypeDefinition, TypeHandle, TypeToken,
};
use std::sync::{Arc, Mutex};

trait Audit: Send + Sync {
    fn record(&self, event: &str);
}

type AuditHandle = Arc<dyn Audit>;

struct MemoryAudit {
    events: Mutex<Vec<String>>,
}

impl Audit for MemoryAudit {
    fn record(&self, event: &str) {
        self.events.lock().unwrap().push(event.to_string());
    }
}

struct UserRepository {
    audit: AuditHandle,
}

struct UserService {
    repository: Arc<UserRepository>,
    page_size: i64,
    label: Mutex<Option<String>>,
}

fn repository_type() -> TypeHandle {
    TypeDefinition::of::<UserRepository>()
        .with_constructor(
            vec![ParameterSpec::new("audit", TypeToken::of::<AuditHandle>())],
            |arguments| {
                let audit = arguments[0]
                    .downcast_ref::<AuditHandle>()
                    .ok_or("audit expected")?
                    .clone();
                Ok(ServiceInstance::new(UserRepository { audit }))
            },
        )
        .into_handle()
}

fn service_type() -> TypeHandle {
    TypeDefinition::of::<UserService>()
        .with_constructor(
            vec![
                ParameterSpec::new("repository", TypeToken::of::<UserRepository>()),
                ParameterSpec::new("page_size", TypeToken::primitive::<i64>())
                    .with_default(ServiceInstance::new(25i64)),
            ],
            |arguments| {
                let repository = arguments[0]
                    .downcast::<UserRepository>()
                    .ok_or("repository expected")?;
                let page_size = *arguments[1]
                    .downcast_ref::<i64>()
                    .ok_or("page size expected")?;
                Ok(ServiceInstance::new(UserService {
                    repository,
                    page_size,
                    label: Mutex::new(None),
                }))
            },
        )
        .with_property(
            PropertySpec::new("label", TypeToken::primitive::<String>()).needs("service.label"),
            |instance, value| {
                let service = instance
                    .downcast_ref::<UserService>()
                    .ok_or("user service expected")?;
                let label = value.downcast_ref::<String>().ok_or("label expected")?;
                *service.label.lock().map_err(|_| "poisoned label")? = Some(label.clone());
                Ok(())
            },
        )
        .into_handle()
}

fn bind_graph(container: &mut Container) {
    container
        .bind(
            service_name_of::<AuditHandle>(),
            |_, _| {
                Ok(ServiceInstance::new(Arc::new(MemoryAudit {
                    events: Mutex::new(Vec::new()),
                }) as AuditHandle))
            },
            true,
        )
        .unwrap();
    container
        .bind_type(service_name_of::<UserRepository>(), repository_type(), false)
        .unwrap();
    container
        .bind(
            "service.label",
            |_, _| Ok(ServiceInstance::new("users".to_string())),
            false,
        )
        .unwrap();
    container
        .bind_type("user.service", service_type(), false)
        .unwrap();
}

#[test]
fn builds_the_whole_graph_with_defaults_and_properties() {
    let mut container = Container::new();
    bind_graph(&mut container);

    let service = container.make("user.service").unwrap();
    let service = service.downcast_ref::<UserService>().unwrap();

    assert_eq!(service.page_size, 25);
    assert_eq!(service.label.lock().unwrap().as_deref(), Some("users"));

    service.repository.audit.record("listed");
    let audit = container
        .make(service_name_of::<AuditHandle>())
        .unwrap();
    let audit = audit.downcast_ref::<AuditHandle>().unwrap();
    assert!(Arc::ptr_eq(audit, &service.repository.audit));
}

#[test]
fn user_arguments_override_defaults() {
    let mut container = Container::new();
    bind_graph(&mut container);

    let service = container
        .make_with("user.service", vec![ServiceInstance::new(100i64)])
        .unwrap();
    assert_eq!(service.downcast_ref::<UserService>().unwrap().page_size, 100);
}

#[test]
fn missing_primitive_property_fails_resolution() {
    let mut container = Container::new();
    bind_graph(&mut container);
    container.unbind("service.label");

    match container.make("user.service").unwrap_err() {
        ResolveError::UnresolvablePrimitive { slot, service } => {
            assert_eq!(slot, "label");
            assert_eq!(service, "user.service");
        }
        other => panic!("expected unresolvable primitive, got {other}"),
    }
}

#[test]
fn contextual_override_redirects_property_injection() {
    let mut container = Container::new();
    bind_graph(&mut container);
    container
        .bind(
            "service.label.alt",
            |_, _| Ok(ServiceInstance::new("accounts".to_string())),
            false,
        )
        .unwrap();
    container
        .binding_mut("user.service")
        .unwrap()
        .needs("service.label")
        .given("service.label.alt");

    let service = container.make("user.service").unwrap();
    assert_eq!(
        service
            .downcast_ref::<UserService>()
            .unwrap()
            .label
            .lock()
            .unwrap()
            .as_deref(),
        Some("accounts")
    );
}

#[test]
fn missing_class_dependency_propagates_as_unresolvable() {
    let mut container = Container::new();
    // repository requires an audit sink that was never registered
    container
        .bind_type(service_name_of::<UserRepository>(), repository_type(), false)
        .unwrap();

    assert!(matches!(
        container.make(service_name_of::<UserRepository>()).unwrap_err(),
        ResolveError::Unresolvable { .. }
    ));
}

#[test]
fn abstract_types_cannot_be_built() {
    let mut container = Container::new();
    container
        .bind_type("storage", TypeDefinition::abstract_type("app.storage").into_handle(), false)
        .unwrap();

    match container.make("storage").unwrap_err() {
        ResolveError::BuildFailed { service, type_name, .. } => {
            assert_eq!(service, "storage");
            assert_eq!(type_name.as_deref(), Some("app.storage"));
        }
        other => panic!("expected build failure, got {other}"),
    }
}

#[test]
fn type_finder_supplies_unbound_types() {
    let mut container = Container::new();
    bind_graph(&mut container);
    container.unbind("user.service");

    container.on_find_type(
        |name| {
            if name == "user.service" {
                Some(service_type())
            } else {
                None
            }
        },
        None,
    );

    assert!(container.can_make("user.service"));
    let service = container.make("user.service").unwrap();
    assert_eq!(service.downcast_ref::<UserService>().unwrap().page_size, 25);
}

#[test]
fn factory_failures_are_wrapped_with_context() {
    let mut container = Container::new();
    container
        .bind(
            service_name_of::<AuditHandle>(),
            |_, _| {
                Ok(ServiceInstance::new(Arc::new(MemoryAudit {
                    events: Mutex::new(Vec::new()),
                }) as AuditHandle))
            },
            true,
        )
        .unwrap();

    let failing = TypeDefinition::of::<UserRepository>()
        .with_constructor(
            vec![ParameterSpec::new("audit", TypeToken::of::<AuditHandle>())],
            |_| Err("database offline".into()),
        )
        .into_handle();
    container.bind_type("repository", failing, false).unwrap();

    match container.make("repository").unwrap_err() {
        ResolveError::BuildFailed {
            service,
            build_stack,
            source,
            ..
        } => {
            assert_eq!(service, "repository");
            assert_eq!(build_stack, vec!["repository".to_string()]);
            assert_eq!(source.to_string(), "database offline");
        }
        other => panic!("expected build failure, got {other}"),
    }
}
