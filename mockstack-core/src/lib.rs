//! Core routing and scoped-override mechanics for MockStack
//!
//! This crate holds the pieces the `mockstack` facade assembles: the
//! [`ServiceFactory`] seam application code constructs through, the
//! [`PatchTarget`] router that intercepts those constructions per service,
//! the RAII [`HandlerGuard`] and [`ScopeStack`] for scoped overrides, and
//! the [`PatchError`] taxonomy.

pub mod error;
pub mod factory;
pub mod params;
pub mod scope;
pub mod target;

pub use error::{BoxError, FirstRegistration, PatchError};
pub use factory::{factory_fn, FactoryFn, ServiceFactory};
pub use params::ConstructParams;
pub use scope::ScopeStack;
pub use target::{handler, Handler, HandlerGuard, PatchTarget};
