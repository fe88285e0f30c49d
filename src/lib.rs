//! Runtime inversion-of-control service registry. Callers register how a
//! named service is produced — a factory, a type descriptor or a pre-built
//! instance — and later request fully-constructed instances by name. The
//! resolution engine follows alias indirection, applies contextual overrides,
//! detects circular dependencies, caches static (singleton) results with
//! rebinding notifications, and runs every resolved or released instance
//! through a pipeline of decoration hooks.
//!
//! Since Rust has no runtime reflection, constructor and property metadata is
//! supplied explicitly through [TypeDefinition] descriptors (or any other
//! [ServiceType](introspection::ServiceType) implementation).
//!
//! ```
//! use armature::{Container, ServiceInstance};
//!
//! struct Greeter {
//!     greeting: String,
//! }
//!
//! let mut container = Container::new();
//! container
//!     .bind(
//!         "greeter",
//!         |_container, _arguments| {
//!             Ok(ServiceInstance::new(Greeter {
//!                 greeting: "hello".to_string(),
//!             }))
//!         },
//!         true,
//!     )
//!     .unwrap();
//!
//! let greeter = container.make("greeter").unwrap();
//! assert_eq!(greeter.downcast_ref::<Greeter>().unwrap().greeting, "hello");
//!
//! // static bindings cache their first result
//! assert!(container.make("greeter").unwrap().ptr_eq(&greeter));
//! ```

pub mod binding;
pub mod builder;
pub mod container;
pub mod error;
pub mod instance;
pub mod introspection;
pub mod shared;

mod injector;
mod registry;

pub use binding::BindingRecord;
pub use builder::ContainerBuilder;
pub use container::{Container, MAX_USER_ARGUMENTS};
pub use error::{BoxedError, RegistryError, ResolveError};
pub use instance::ServiceInstance;
pub use introspection::{
    service_name_of, ConstructorSpec, ParameterSpec, PropertySpec, TypeDefinition, TypeHandle,
    TypeToken,
};
pub use shared::SharedContainer;
