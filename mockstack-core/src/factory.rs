//! The construction seam between application code and the mock routers

use crate::error::PatchError;
use crate::params::ConstructParams;

/// A factory entry point for SDK clients or resources.
///
/// This is the injection seam: application code accepts any `ServiceFactory`
/// and calls [`construct`](Self::construct) where it would otherwise call
/// the SDK's own factory function. The real factory adapter, the
/// [`PatchTarget`](crate::target::PatchTarget) router, and the hub's
/// switchable handles all implement it, so swapping mocks in requires no
/// change to the code asking for clients.
pub trait ServiceFactory: Send + Sync {
    /// The constructed client or resource type.
    type Output;

    /// Construct the object identified by `service` with `params`.
    fn construct(&self, service: &str, params: ConstructParams)
        -> Result<Self::Output, PatchError>;
}

/// Adapter wrapping a plain function as a [`ServiceFactory`].
///
/// Built with [`factory_fn`].
pub struct FactoryFn<F>(F);

/// Wrap a closure as a [`ServiceFactory`].
///
/// The usual way to hand the real SDK construction call to a router or hub.
pub fn factory_fn<T, F>(f: F) -> FactoryFn<F>
where
    F: Fn(&str, ConstructParams) -> Result<T, PatchError> + Send + Sync,
{
    FactoryFn(f)
}

impl<T, F> ServiceFactory for FactoryFn<F>
where
    F: Fn(&str, ConstructParams) -> Result<T, PatchError> + Send + Sync,
{
    type Output = T;

    fn construct(&self, service: &str, params: ConstructParams) -> Result<T, PatchError> {
        (self.0)(service, params)
    }
}
