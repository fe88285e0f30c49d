use std::error::Error;
use thiserror::Error;

/// Boxed error used when wrapping failures raised inside user factories,
/// constructors or property setters.
pub type BoxedError = Box<dyn Error + Send + Sync + 'static>;

/// Errors raised by misconfiguration of the registry. These are programmer
/// errors: they are reported synchronously from the offending call and are
/// never swallowed by the resolution engine.
#[derive(Error, Clone, Eq, PartialEq, Debug)]
pub enum RegistryError {
    #[error("service name cannot be empty")]
    EmptyServiceName,
    #[error("service '{0}' is already registered")]
    ServiceRegistered(String),
    #[error("'{0}' is already registered as an alias")]
    AliasRegistered(String),
    #[error("alias '{0}' cannot point at itself")]
    SelfAlias(String),
    #[error("alias target '{target}' for '{alias}' has no binding or cached instance")]
    MissingAliasTarget { alias: String, target: String },
    #[error("cannot cache an instance for '{0}': its binding is not static")]
    NonStaticInstance(String),
    #[error("tag '{0}' does not exist")]
    UnknownTag(String),
    #[error("too many user-supplied arguments ({0}); the limit is 255")]
    TooManyArguments(usize),
}

/// Errors raised while resolving a service. Variants for which
/// [is_unresolvable](ResolveError::is_unresolvable) returns `true` may be
/// converted into a slot's declared default by the dependency injector;
/// everything else is terminal for the current `make` call.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("circular dependency while resolving '{service}' (build stack: {stack:?})")]
    CircularDependency { service: String, stack: Vec<String> },
    #[error("cannot resolve service '{service}' (build stack: {build_stack:?})")]
    Unresolvable {
        service: String,
        build_stack: Vec<String>,
    },
    #[error("failed to build service '{service}' (build stack: {build_stack:?}): {source}")]
    BuildFailed {
        service: String,
        type_name: Option<String>,
        build_stack: Vec<String>,
        #[source]
        source: BoxedError,
    },
    #[error("unresolvable primitive dependency '{slot}' of service '{service}'")]
    UnresolvablePrimitive { slot: String, service: String },
    #[error("injection type mismatch for slot '{slot}' of '{service}': expected {expected}, got {actual} produced by '{produced_by}'")]
    TypeMismatch {
        service: String,
        slot: String,
        expected: String,
        actual: String,
        produced_by: String,
    },
    #[error(transparent)]
    Config(#[from] RegistryError),
}

impl ResolveError {
    /// Whether this failure means "the service could not be produced", as
    /// opposed to a configuration fault or an injection contract violation.
    /// Only unresolvable failures are replaced by a slot's default value.
    pub fn is_unresolvable(&self) -> bool {
        matches!(
            self,
            ResolveError::Unresolvable { .. }
                | ResolveError::BuildFailed { .. }
                | ResolveError::UnresolvablePrimitive { .. }
        )
    }
}
