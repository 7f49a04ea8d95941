//! Per-entry-point mock router: registration, allow-list, and dispatch

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use tracing::{debug, info, warn};

use crate::error::{FirstRegistration, PatchError};
use crate::factory::ServiceFactory;
use crate::params::ConstructParams;

/// A registered mock handler: invoked with the construction parameters the
/// real factory would have received, returns the stand-in object.
pub type Handler<T> = Arc<dyn Fn(ConstructParams) -> Result<T, PatchError> + Send + Sync>;

/// Erase a closure into a [`Handler`].
///
/// Needed where handlers for several routers travel in one collection;
/// [`PatchTarget::register_handler`] and [`PatchTarget::handler_for`] accept
/// plain closures directly.
pub fn handler<T, F>(f: F) -> Handler<T>
where
    T: 'static,
    F: Fn(ConstructParams) -> Result<T, PatchError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Routes construction calls for one factory entry point.
///
/// Dispatch order: a registered handler wins, then the allow-list may pass
/// the call through to the real factory, and anything else fails loudly. A
/// handler always beats the allow-list, so a test that registers one gets
/// interception regardless of how the allow-list is seeded.
pub struct PatchTarget<T> {
    name: String,
    real: Box<dyn ServiceFactory<Output = T>>,
    services: DashMap<String, Handler<T>>,
    registrations: DashMap<String, FirstRegistration>,
    allowed: DashSet<String>,
}

impl<T: 'static> PatchTarget<T> {
    /// Create a router shadowing `real`, the factory used for allow-listed
    /// pass-through.
    pub fn new(name: impl Into<String>, real: impl ServiceFactory<Output = T> + 'static) -> Self {
        Self {
            name: name.into(),
            real: Box::new(real),
            services: DashMap::new(),
            registrations: DashMap::new(),
            allowed: DashSet::new(),
        }
    }

    /// Entry-point identifier this router shadows.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The unshadowed factory.
    pub fn real(&self) -> &dyn ServiceFactory<Output = T> {
        self.real.as_ref()
    }

    /// Route a construction call for `service`.
    ///
    /// A registered handler is invoked with `params` and its result returned
    /// unchanged. Without a handler, an allow-listed service reaches the
    /// real factory. Anything else is a missing fixture and fails with
    /// [`PatchError::UnpatchedAccess`].
    pub fn dispatch(&self, service: &str, params: ConstructParams) -> Result<T, PatchError> {
        // Clone the handler out so no map guard is held while user code runs.
        let handler = self.services.get(service).map(|entry| entry.value().clone());
        if let Some(handler) = handler {
            debug!(router = %self.name, service = %service, "dispatching to mock handler");
            return handler(params);
        }

        if self.allowed.contains(service) {
            debug!(router = %self.name, service = %service, "passing through to real factory");
            return self.real.construct(service, params);
        }

        warn!(router = %self.name, service = %service, "unpatched access");
        Err(PatchError::UnpatchedAccess {
            target: self.name.clone(),
            service: service.to_string(),
        })
    }

    /// Register a permanent handler for `service`.
    ///
    /// Permanent means for the life of the router: there is no unregister
    /// operation, and replacement is only possible through the scoped
    /// [`handler_for`](Self::handler_for) mechanism. A second registration
    /// for the same service fails with [`PatchError::AlreadyPatched`],
    /// carrying the first registration's call site as causal context.
    #[track_caller]
    pub fn register_handler<F>(&self, service: &str, handler: F) -> Result<(), PatchError>
    where
        F: Fn(ConstructParams) -> Result<T, PatchError> + Send + Sync + 'static,
    {
        if self.services.contains_key(service) {
            return Err(PatchError::AlreadyPatched {
                target: self.name.clone(),
                service: service.to_string(),
                first: self.registrations.get(service).map(|r| r.value().clone()),
            });
        }

        self.services.insert(service.to_string(), Arc::new(handler));
        let record = FirstRegistration::capture(&self.name, service);
        info!(
            router = %self.name,
            service = %service,
            file = record.file,
            line = record.line,
            "registered permanent mock handler"
        );
        self.registrations.insert(service.to_string(), record);
        Ok(())
    }

    /// Temporarily override the handler for `service`.
    ///
    /// The override applies for the guard's lifetime. On drop, whether by
    /// normal exit, early return, or panic unwinding, the prior state is
    /// restored exactly: the previous handler if one existed, or no handler
    /// at all. Nested overrides for the same service unwind in reverse
    /// order of entry.
    pub fn handler_for<F>(&self, service: &str, handler: F) -> HandlerGuard<'_, T>
    where
        F: Fn(ConstructParams) -> Result<T, PatchError> + Send + Sync + 'static,
    {
        let prior = self.services.insert(service.to_string(), Arc::new(handler));
        debug!(router = %self.name, service = %service, "entered scoped handler override");
        HandlerGuard {
            target: self,
            service: service.to_string(),
            prior,
        }
    }

    /// Permit `service` to reach the real factory when no handler is
    /// registered. A registered handler still wins.
    pub fn allow(&self, service: impl Into<String>) {
        let service = service.into();
        debug!(router = %self.name, service = %service, "allow-listed service");
        self.allowed.insert(service);
    }

    /// Remove `service` from the allow-list; returns whether it was present.
    pub fn disallow(&self, service: &str) -> bool {
        self.allowed.remove(service).is_some()
    }

    /// Whether `service` may pass through to the real factory.
    pub fn is_allowed(&self, service: &str) -> bool {
        self.allowed.contains(service)
    }

    /// Whether `service` currently has a handler, permanent or scoped.
    pub fn has_handler(&self, service: &str) -> bool {
        self.services.contains_key(service)
    }

    /// Record of the first permanent registration for `service`, if any.
    pub fn first_registration(&self, service: &str) -> Option<FirstRegistration> {
        self.registrations.get(service).map(|r| r.value().clone())
    }
}

impl<T: 'static> ServiceFactory for PatchTarget<T> {
    type Output = T;

    fn construct(&self, service: &str, params: ConstructParams) -> Result<T, PatchError> {
        self.dispatch(service, params)
    }
}

impl<T> std::fmt::Debug for PatchTarget<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchTarget")
            .field("name", &self.name)
            .field("services", &self.services.len())
            .field("allowed", &self.allowed.len())
            .finish()
    }
}

/// Guard for a scoped handler override; restores the prior state on drop.
#[must_use = "the override lasts only while the guard is alive"]
pub struct HandlerGuard<'a, T> {
    target: &'a PatchTarget<T>,
    service: String,
    prior: Option<Handler<T>>,
}

impl<T> Drop for HandlerGuard<'_, T> {
    fn drop(&mut self) {
        match self.prior.take() {
            Some(prior) => {
                self.target.services.insert(self.service.clone(), prior);
            }
            None => {
                self.target.services.remove(&self.service);
            }
        }
        debug!(
            router = %self.target.name,
            service = %self.service,
            "restored prior handler state"
        );
    }
}

impl<T> std::fmt::Debug for HandlerGuard<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerGuard")
            .field("router", &self.target.name)
            .field("service", &self.service)
            .field("had_prior", &self.prior.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::factory_fn;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn target() -> PatchTarget<String> {
        PatchTarget::new(
            "client",
            factory_fn(|service: &str, params: ConstructParams| {
                Ok(format!(
                    "real-{}-{}",
                    service,
                    params.region_name.as_deref().unwrap_or("default")
                ))
            }),
        )
    }

    fn counting_target() -> (PatchTarget<String>, Arc<AtomicUsize>) {
        let real_calls = Arc::new(AtomicUsize::new(0));
        let seen = real_calls.clone();
        let target = PatchTarget::new(
            "client",
            factory_fn(move |service: &str, _params: ConstructParams| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(format!("real-{}", service))
            }),
        );
        (target, real_calls)
    }

    #[test]
    fn test_dispatch_prefers_registered_handler() {
        let (target, real_calls) = counting_target();
        target
            .register_handler("s3", |_params| Ok("fake-s3".to_string()))
            .unwrap();

        let built = target.dispatch("s3", ConstructParams::new()).unwrap();
        assert_eq!(built, "fake-s3");
        assert_eq!(real_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dispatch_allow_listed_passes_through() {
        let target = target();
        target.allow("dynamodb");

        let built = target
            .dispatch("dynamodb", ConstructParams::new().with_region("eu-west-1"))
            .unwrap();
        assert_eq!(built, "real-dynamodb-eu-west-1");
    }

    #[test]
    fn test_dispatch_unregistered_fails_loud() {
        let (target, real_calls) = counting_target();

        let err = target
            .dispatch("s3", ConstructParams::new().with_region("us-east-1"))
            .unwrap_err();
        match err {
            PatchError::UnpatchedAccess { target, service } => {
                assert_eq!(target, "client");
                assert_eq!(service, "s3");
            }
            other => panic!("expected UnpatchedAccess, got {:?}", other),
        }
        assert_eq!(real_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handler_wins_over_allow_list() {
        let (target, real_calls) = counting_target();
        target.allow("s3");
        target
            .register_handler("s3", |_params| Ok("fake-s3".to_string()))
            .unwrap();

        let built = target.dispatch("s3", ConstructParams::new()).unwrap();
        assert_eq!(built, "fake-s3");
        assert_eq!(real_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_duplicate_registration_reports_first_call_site() {
        let target = target();
        target
            .register_handler("s3", |_params| Ok("first".to_string()))
            .unwrap();

        let err = target
            .register_handler("s3", |_params| Ok("second".to_string()))
            .unwrap_err();
        match &err {
            PatchError::AlreadyPatched { service, first, .. } => {
                assert_eq!(service, "s3");
                let first = first.as_ref().expect("first registration context");
                assert!(first.file.ends_with("target.rs"));
            }
            other => panic!("expected AlreadyPatched, got {:?}", other),
        }

        let source = std::error::Error::source(&err).expect("causal chain");
        assert!(source.to_string().contains("first registered at"));

        // The losing handler must not replace the registered one.
        let built = target.dispatch("s3", ConstructParams::new()).unwrap();
        assert_eq!(built, "first");
    }

    #[test]
    fn test_registration_over_scoped_override_has_no_context() {
        let target = target();
        let _guard = target.handler_for("s3", |_params| Ok("scoped".to_string()));

        let err = target
            .register_handler("s3", |_params| Ok("permanent".to_string()))
            .unwrap_err();
        match err {
            PatchError::AlreadyPatched { first, .. } => assert!(first.is_none()),
            other => panic!("expected AlreadyPatched, got {:?}", other),
        }
    }

    #[test]
    fn test_scoped_override_restores_absence() {
        let target = target();
        {
            let _guard = target.handler_for("s3", |_params| Ok("scoped".to_string()));
            assert!(target.has_handler("s3"));
            let built = target.dispatch("s3", ConstructParams::new()).unwrap();
            assert_eq!(built, "scoped");
        }

        assert!(!target.has_handler("s3"));
        assert!(target.dispatch("s3", ConstructParams::new()).is_err());
    }

    #[test]
    fn test_scoped_override_restores_prior_handler() {
        let target = target();
        target
            .register_handler("s3", |_params| Ok("permanent".to_string()))
            .unwrap();

        {
            let _guard = target.handler_for("s3", |_params| Ok("scoped".to_string()));
            let built = target.dispatch("s3", ConstructParams::new()).unwrap();
            assert_eq!(built, "scoped");
        }

        let built = target.dispatch("s3", ConstructParams::new()).unwrap();
        assert_eq!(built, "permanent");
    }

    #[test]
    fn test_nested_overrides_unwind_in_reverse() {
        let target = target();
        target
            .register_handler("s3", |_params| Ok("base".to_string()))
            .unwrap();

        let outer = target.handler_for("s3", |_params| Ok("outer".to_string()));
        let inner = target.handler_for("s3", |_params| Ok("inner".to_string()));
        assert_eq!(target.dispatch("s3", ConstructParams::new()).unwrap(), "inner");

        drop(inner);
        assert_eq!(target.dispatch("s3", ConstructParams::new()).unwrap(), "outer");

        drop(outer);
        assert_eq!(target.dispatch("s3", ConstructParams::new()).unwrap(), "base");
    }

    #[test]
    fn test_override_restores_during_panic() {
        let target = target();
        target
            .register_handler("s3", |_params| Ok("permanent".to_string()))
            .unwrap();

        let result = catch_unwind(AssertUnwindSafe(|| {
            let _guard = target.handler_for("s3", |_params| Ok("scoped".to_string()));
            panic!("test body failed");
        }));
        assert!(result.is_err());

        let built = target.dispatch("s3", ConstructParams::new()).unwrap();
        assert_eq!(built, "permanent");
    }

    #[test]
    fn test_allow_and_disallow() {
        let target = target();
        assert!(!target.is_allowed("sqs"));

        target.allow("sqs");
        assert!(target.is_allowed("sqs"));

        assert!(target.disallow("sqs"));
        assert!(!target.is_allowed("sqs"));
        assert!(!target.disallow("sqs"));
    }

    #[test]
    fn test_handler_errors_pass_through() {
        let target = target();
        target
            .register_handler("s3", |_params| {
                Err::<String, _>(PatchError::construction("s3", "bucket store offline"))
            })
            .unwrap();

        let err = target.dispatch("s3", ConstructParams::new()).unwrap_err();
        assert!(matches!(err, PatchError::Construction { .. }));
        assert!(err.to_string().contains("bucket store offline"));
    }

    #[test]
    fn test_router_is_a_service_factory() {
        let target = target();
        target
            .register_handler("s3", |_params| Ok("fake-s3".to_string()))
            .unwrap();

        let factory: &dyn ServiceFactory<Output = String> = &target;
        let built = factory.construct("s3", ConstructParams::new()).unwrap();
        assert_eq!(built, "fake-s3");
    }

    #[test]
    fn test_first_registration_is_queryable() {
        let target = target();
        assert!(target.first_registration("s3").is_none());

        target
            .register_handler("s3", |_params| Ok("fake".to_string()))
            .unwrap();

        let record = target.first_registration("s3").expect("registration record");
        assert_eq!(record.service, "s3");
        assert_eq!(record.target, "client");
        assert!(record.line > 0);
    }
}
