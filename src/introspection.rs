//! The reflection stand-in consumed by the resolution engine. Rust has no
//! runtime type introspection, so the metadata a reflective runtime would
//! discover — constructors, their parameters, injection-marked properties,
//! instantiation — is supplied explicitly through [ServiceType] descriptors.
//! [TypeDefinition] is the canonical closure-driven implementation; anything
//! else implementing [ServiceType] plugs in the same way.

use crate::error::BoxedError;
use crate::instance::ServiceInstance;
use derivative::Derivative;
use fxhash::FxHashMap;
use std::any::{type_name, Any};
use std::sync::Arc;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

/// Shared handle to a type descriptor.
pub type TypeHandle = Arc<dyn ServiceType>;

/// Maps a type to its canonical service name: the full qualified type name.
/// Used uniformly wherever a type must act as a lookup key.
pub fn service_name_of<T: ?Sized>() -> &'static str {
    type_name::<T>()
}

/// Errors raised by descriptor implementations during instantiation or
/// property writes.
#[derive(Error, Debug)]
pub enum IntrospectionError {
    #[error("type '{0}' is not instantiable")]
    NotInstantiable(String),
    #[error("type '{type_name}' has no constructor #{index}")]
    UnknownConstructor { type_name: String, index: usize },
    #[error("type '{type_name}' has no default constructor")]
    NoDefaultConstructor { type_name: String },
    #[error("type '{type_name}' has no writable property '{property}'")]
    UnknownProperty {
        type_name: String,
        property: String,
    },
}

/// The declared type of a dependency slot: a canonical name, a primitive
/// marker and the runtime checks the injector needs. Primitive tokens may
/// additionally carry a coercion for convertible user-supplied arguments.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct TypeToken {
    name: String,
    primitive: bool,
    #[derivative(Debug = "ignore")]
    check: Arc<dyn Fn(&ServiceInstance) -> bool + Send + Sync>,
    #[derivative(Debug = "ignore")]
    coercion: Option<Arc<dyn Fn(&ServiceInstance) -> Option<ServiceInstance> + Send + Sync>>,
}

impl TypeToken {
    /// Token for a class-like slot holding a `T`.
    pub fn of<T: Any + Send + Sync>() -> Self {
        Self {
            name: service_name_of::<T>().to_string(),
            primitive: false,
            check: Arc::new(|value| value.is::<T>()),
            coercion: None,
        }
    }

    /// Token for a primitive/value slot holding a `T`.
    pub fn primitive<T: Any + Send + Sync>() -> Self {
        Self {
            primitive: true,
            ..Self::of::<T>()
        }
    }

    /// Overrides the canonical name, e.g. for trait-shaped slots whose value
    /// is stored behind a pointer type.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Installs a coercion consulted when a user-supplied argument does not
    /// match the token exactly. Only primitive tokens consult it.
    pub fn with_coercion(
        mut self,
        coercion: impl Fn(&ServiceInstance) -> Option<ServiceInstance> + Send + Sync + 'static,
    ) -> Self {
        self.coercion = Some(Arc::new(coercion));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_primitive(&self) -> bool {
        self.primitive
    }

    /// Whether the value is an instance of the declared type.
    pub fn matches(&self, value: &ServiceInstance) -> bool {
        (self.check)(value)
    }

    /// Attempts to convert a non-matching value into the declared type.
    pub fn coerce(&self, value: &ServiceInstance) -> Option<ServiceInstance> {
        self.coercion.as_ref().and_then(|coercion| coercion(value))
    }
}

/// A single constructor or method parameter as the introspection provider
/// reports it: declared type, name, optional explicit service name from the
/// injection marker, and an optional default.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct ParameterSpec {
    pub name: String,
    pub ty: TypeToken,
    pub needs: Option<String>,
    pub default: Option<ServiceInstance>,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, ty: TypeToken) -> Self {
        Self {
            name: name.into(),
            ty,
            needs: None,
            default: None,
        }
    }

    /// Marks the parameter as requiring an explicitly named service.
    pub fn needs(mut self, service: impl Into<String>) -> Self {
        self.needs = Some(service.into());
        self
    }

    /// Declares the parameter optional with the given default.
    pub fn with_default(mut self, default: ServiceInstance) -> Self {
        self.default = Some(default);
        self
    }
}

/// One declared constructor: its ordered parameter list.
#[derive(Clone, Debug, Default)]
pub struct ConstructorSpec {
    pub parameters: Vec<ParameterSpec>,
}

impl ConstructorSpec {
    pub fn new(parameters: Vec<ParameterSpec>) -> Self {
        Self { parameters }
    }
}

/// A public writable property carrying the injection marker.
#[derive(Clone, Debug)]
pub struct PropertySpec {
    pub name: String,
    pub ty: TypeToken,
    pub needs: Option<String>,
}

impl PropertySpec {
    pub fn new(name: impl Into<String>, ty: TypeToken) -> Self {
        Self {
            name: name.into(),
            ty,
            needs: None,
        }
    }

    pub fn needs(mut self, service: impl Into<String>) -> Self {
        self.needs = Some(service.into());
        self
    }
}

/// A type descriptor: everything the engine needs to know about a target type
/// in order to construct it and inject its properties.
#[cfg_attr(test, automock)]
pub trait ServiceType: Send + Sync {
    /// Canonical service name of the described type.
    fn name(&self) -> &str;

    /// `false` for abstract/interface-like descriptors, which cannot be
    /// built directly.
    fn instantiable(&self) -> bool;

    /// Declared constructors, in declaration order.
    fn constructors(&self) -> Vec<ConstructorSpec>;

    /// Injection-marked writable properties.
    fn properties(&self) -> Vec<PropertySpec>;

    /// Instantiates the type through the given constructor (by index into
    /// [constructors](ServiceType::constructors)), or through default
    /// no-argument instantiation when `None`.
    fn construct(
        &self,
        constructor: Option<usize>,
        arguments: Vec<ServiceInstance>,
    ) -> Result<ServiceInstance, BoxedError>;

    /// Writes a resolved value onto an instance's property.
    fn set_property(
        &self,
        instance: &ServiceInstance,
        property: &str,
        value: ServiceInstance,
    ) -> Result<(), BoxedError>;
}

type ConstructFn = Arc<dyn Fn(Vec<ServiceInstance>) -> Result<ServiceInstance, BoxedError> + Send + Sync>;
type PropertySetter = Arc<dyn Fn(&ServiceInstance, ServiceInstance) -> Result<(), BoxedError> + Send + Sync>;

/// Closure-driven [ServiceType] built by hand, the way a reflective runtime
/// would discover it. Constructors are declared most-general-first; the
/// engine picks the last one.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct TypeDefinition {
    name: String,
    instantiable: bool,
    constructors: Vec<ConstructorSpec>,
    #[derivative(Debug = "ignore")]
    construct_fns: Vec<ConstructFn>,
    #[derivative(Debug = "ignore")]
    default_construct: Option<ConstructFn>,
    properties: Vec<PropertySpec>,
    #[derivative(Debug = "ignore")]
    setters: FxHashMap<String, PropertySetter>,
}

impl TypeDefinition {
    /// Starts a descriptor for `T`, named after its full qualified name.
    pub fn of<T: Any + Send + Sync>() -> Self {
        Self::named(service_name_of::<T>())
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instantiable: true,
            constructors: Vec::new(),
            construct_fns: Vec::new(),
            default_construct: None,
            properties: Vec::new(),
            setters: FxHashMap::default(),
        }
    }

    /// Starts a descriptor for an abstract/interface-like type, which the
    /// engine will refuse to build directly.
    pub fn abstract_type(name: impl Into<String>) -> Self {
        Self {
            instantiable: false,
            ..Self::named(name)
        }
    }

    /// Declares a constructor. Call order is declaration order.
    pub fn with_constructor(
        mut self,
        parameters: Vec<ParameterSpec>,
        construct: impl Fn(Vec<ServiceInstance>) -> Result<ServiceInstance, BoxedError> + Send + Sync + 'static,
    ) -> Self {
        self.constructors.push(ConstructorSpec::new(parameters));
        self.construct_fns.push(Arc::new(construct));
        self
    }

    /// Declares the no-argument instantiation used when the type exposes no
    /// constructors.
    pub fn with_default_constructor(
        mut self,
        construct: impl Fn() -> Result<ServiceInstance, BoxedError> + Send + Sync + 'static,
    ) -> Self {
        self.default_construct = Some(Arc::new(move |_| construct()));
        self
    }

    /// Declares an injection-marked writable property and its setter.
    pub fn with_property(
        mut self,
        property: PropertySpec,
        setter: impl Fn(&ServiceInstance, ServiceInstance) -> Result<(), BoxedError> + Send + Sync + 'static,
    ) -> Self {
        self.setters.insert(property.name.clone(), Arc::new(setter));
        self.properties.push(property);
        self
    }

    pub fn into_handle(self) -> TypeHandle {
        Arc::new(self)
    }
}

impl ServiceType for TypeDefinition {
    fn name(&self) -> &str {
        &self.name
    }

    fn instantiable(&self) -> bool {
        self.instantiable
    }

    fn constructors(&self) -> Vec<ConstructorSpec> {
        self.constructors.clone()
    }

    fn properties(&self) -> Vec<PropertySpec> {
        self.properties.clone()
    }

    fn construct(
        &self,
        constructor: Option<usize>,
        arguments: Vec<ServiceInstance>,
    ) -> Result<ServiceInstance, BoxedError> {
        if !self.instantiable {
            return Err(IntrospectionError::NotInstantiable(self.name.clone()).into());
        }

        match constructor {
            Some(index) => {
                let construct = self.construct_fns.get(index).ok_or_else(|| {
                    IntrospectionError::UnknownConstructor {
                        type_name: self.name.clone(),
                        index,
                    }
                })?;
                construct(arguments)
            }
            None => {
                let construct = self.default_construct.as_ref().ok_or_else(|| {
                    IntrospectionError::NoDefaultConstructor {
                        type_name: self.name.clone(),
                    }
                })?;
                construct(arguments)
            }
        }
    }

    fn set_property(
        &self,
        instance: &ServiceInstance,
        property: &str,
        value: ServiceInstance,
    ) -> Result<(), BoxedError> {
        let setter = self
            .setters
            .get(property)
            .ok_or_else(|| IntrospectionError::UnknownProperty {
                type_name: self.name.clone(),
                property: property.to_string(),
            })?;
        setter(instance, value)
    }
}
