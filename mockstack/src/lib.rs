//! MockStack: test doubles for cloud SDK factory calls
//!
//! MockStack intercepts the construction of SDK clients and resources so
//! tests can substitute deterministic stand-ins per service without touching
//! the application code that asks for them.
//!
//! Application code accepts a [`ServiceFactory`] by injection. Tests build a
//! [`MockHub`] around the real factories, register handlers (permanent or
//! scoped), allow selected services through untouched, and engage patching
//! once per test process. Any service that is neither handled nor
//! allow-listed fails loudly instead of reaching the real factory.
//!
//! ```
//! use mockstack::{factory_fn, ConstructParams, MockHub, ServiceFactory};
//!
//! let hub = MockHub::new(
//!     factory_fn(|service: &str, _params: ConstructParams| Ok(format!("real {}", service))),
//!     factory_fn(|service: &str, _params: ConstructParams| Ok(format!("real {}", service))),
//! );
//!
//! hub.clients()
//!     .register_handler("s3", |_params| Ok("fake s3".to_string()))
//!     .unwrap();
//! hub.engage_patching();
//!
//! // Application code, handed this factory by injection, now gets the fake:
//! let factory = hub.client_factory();
//! let client = factory.construct("s3", ConstructParams::new()).unwrap();
//! assert_eq!(client, "fake s3");
//! ```

pub mod config;
pub mod hub;

pub use config::{AllowedConfig, MockConfig};
pub use hub::{FactoryHandle, MockHub};

pub use mockstack_core::{
    factory_fn, handler, BoxError, ConstructParams, FactoryFn, FirstRegistration, Handler,
    HandlerGuard, PatchError, PatchTarget, ScopeStack, ServiceFactory,
};
