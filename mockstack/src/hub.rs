//! The hub pairing the client and resource routers with the activation
//! switch that redirects injected factory handles through them

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use mockstack_core::{
    ConstructParams, Handler, PatchError, PatchTarget, ScopeStack, ServiceFactory,
};

/// Mock routers for the SDK's `client` and `resource` factory entry points,
/// plus the switch that turns interception on.
///
/// One hub per test process is the intended shape: create it where the test
/// session is set up, hand [`client_factory`](Self::client_factory) and
/// [`resource_factory`](Self::resource_factory) handles to the application
/// wiring, and call [`engage_patching`](Self::engage_patching) once.
/// Cloning is cheap and every clone shares the same routers and switch.
pub struct MockHub<T> {
    inner: Arc<HubInner<T>>,
}

struct HubInner<T> {
    clients: PatchTarget<T>,
    resources: PatchTarget<T>,
    engaged: AtomicBool,
}

impl<T: 'static> MockHub<T> {
    /// Create a hub wrapping the real client and resource factories.
    pub fn new(
        client_factory: impl ServiceFactory<Output = T> + 'static,
        resource_factory: impl ServiceFactory<Output = T> + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(HubInner {
                clients: PatchTarget::new("client", client_factory),
                resources: PatchTarget::new("resource", resource_factory),
                engaged: AtomicBool::new(false),
            }),
        }
    }

    /// Router shadowing the client factory entry point.
    pub fn clients(&self) -> &PatchTarget<T> {
        &self.inner.clients
    }

    /// Router shadowing the resource factory entry point.
    pub fn resources(&self) -> &PatchTarget<T> {
        &self.inner.resources
    }

    /// Redirect the factory handles through the routers.
    ///
    /// Idempotent: the first call flips the switch, later calls are no-ops.
    /// Engagement stays on for the life of the hub; handler lifecycle is
    /// managed through registration and scoped overrides, not by toggling
    /// this switch.
    pub fn engage_patching(&self) {
        if self.inner.engaged.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("factory patching engaged");
    }

    /// Whether factory handles are currently redirected.
    pub fn patching_engaged(&self) -> bool {
        self.inner.engaged.load(Ordering::SeqCst)
    }

    /// Injectable handle for the client factory entry point.
    pub fn client_factory(&self) -> FactoryHandle<T> {
        FactoryHandle {
            hub: self.clone(),
            kind: TargetKind::Clients,
        }
    }

    /// Injectable handle for the resource factory entry point.
    pub fn resource_factory(&self) -> FactoryHandle<T> {
        FactoryHandle {
            hub: self.clone(),
            kind: TargetKind::Resources,
        }
    }

    /// Enter scoped overrides for `service` on several routers at once.
    ///
    /// `targets` pairs router names, `"clients"` or `"resources"`, with
    /// [`Handler`]s; each override is attached to the caller's `stack` and
    /// released in reverse order when the stack drops. An unknown router
    /// name fails with [`PatchError::UnknownTarget`]; overrides entered
    /// before the failure stay attached to the stack and are released with
    /// it as usual.
    pub fn enter_handlers<'hub, S, I>(
        &'hub self,
        stack: &mut ScopeStack<'hub>,
        service: &str,
        targets: I,
    ) -> Result<(), PatchError>
    where
        S: AsRef<str>,
        I: IntoIterator<Item = (S, Handler<T>)>,
    {
        for (name, handler) in targets {
            let target = self.resolve(name.as_ref())?;
            let guard = target.handler_for(service, move |params| handler(params));
            stack.enter(guard);
        }
        Ok(())
    }

    fn resolve(&self, name: &str) -> Result<&PatchTarget<T>, PatchError> {
        match name {
            "clients" => Ok(&self.inner.clients),
            "resources" => Ok(&self.inner.resources),
            other => Err(PatchError::UnknownTarget(other.to_string())),
        }
    }
}

impl<T> Clone for MockHub<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> std::fmt::Debug for MockHub<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHub")
            .field("engaged", &self.inner.engaged.load(Ordering::SeqCst))
            .field("clients", &self.inner.clients)
            .field("resources", &self.inner.resources)
            .finish()
    }
}

/// Injectable factory handle honoring the hub's activation switch.
///
/// Until [`MockHub::engage_patching`] is called the handle forwards every
/// construction to the real factory, exactly as if no mocking existed. Once
/// engaged it routes through the corresponding router.
pub struct FactoryHandle<T> {
    hub: MockHub<T>,
    kind: TargetKind,
}

#[derive(Debug, Clone, Copy)]
enum TargetKind {
    Clients,
    Resources,
}

impl<T: 'static> ServiceFactory for FactoryHandle<T> {
    type Output = T;

    fn construct(&self, service: &str, params: ConstructParams) -> Result<T, PatchError> {
        let target = match self.kind {
            TargetKind::Clients => self.hub.clients(),
            TargetKind::Resources => self.hub.resources(),
        };
        if self.hub.patching_engaged() {
            target.dispatch(service, params)
        } else {
            target.real().construct(service, params)
        }
    }
}

impl<T> Clone for FactoryHandle<T> {
    fn clone(&self) -> Self {
        Self {
            hub: self.hub.clone(),
            kind: self.kind,
        }
    }
}

impl<T> std::fmt::Debug for FactoryHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryHandle")
            .field("kind", &self.kind)
            .field("engaged", &self.hub.inner.engaged.load(Ordering::SeqCst))
            .finish()
    }
}
