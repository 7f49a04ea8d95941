//! Error taxonomy for mock registration and dispatch

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Boxed error for construction failures surfaced through the router.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Record of a successful permanent handler registration.
///
/// Not a failure in its own right: it implements [`std::error::Error`] so it
/// can ride in the `source()` chain of [`PatchError::AlreadyPatched`],
/// pointing a duplicate registration back at the call site that won.
#[derive(Debug, Clone, Error)]
#[error("handler for `{service}` on `{target}` first registered at {file}:{line}")]
pub struct FirstRegistration {
    /// Service identifier the handler was registered for
    pub service: String,
    /// Name of the router holding the registration
    pub target: String,
    /// Source file of the registering call site
    pub file: &'static str,
    /// Line of the registering call site
    pub line: u32,
    /// When the registration happened
    pub registered_at: DateTime<Utc>,
}

impl FirstRegistration {
    /// Capture a record for the caller's source location.
    #[track_caller]
    pub fn capture(target: impl Into<String>, service: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            service: service.into(),
            target: target.into(),
            file: location.file(),
            line: location.line(),
            registered_at: Utc::now(),
        }
    }
}

/// Errors raised by the patch routers
#[derive(Debug, Error)]
pub enum PatchError {
    /// Dispatch reached a service with no handler and no allow-list entry.
    ///
    /// Deliberately fatal: once patching is engaged, an unhandled service is
    /// a missing test fixture, not an invitation to call the real factory.
    #[error("unpatched access to service `{service}` on `{target}`")]
    UnpatchedAccess {
        /// Name of the router that refused the call
        target: String,
        /// Service identifier that had no handler
        service: String,
    },

    /// A second permanent registration for a service that already has a
    /// handler. `first` carries the original registration when one exists.
    #[error("handler already registered for service `{service}` on `{target}`")]
    AlreadyPatched {
        target: String,
        service: String,
        #[source]
        first: Option<FirstRegistration>,
    },

    /// A multi-target override named a router that does not exist.
    #[error("unknown patch target `{0}`")]
    UnknownTarget(String),

    /// A handler or the real factory failed to construct the object.
    #[error("construction failed for service `{service}`: {source}")]
    Construction {
        service: String,
        #[source]
        source: BoxError,
    },
}

impl PatchError {
    /// Wrap a handler or factory failure for `service`.
    pub fn construction(service: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Construction {
            service: service.into(),
            source: source.into(),
        }
    }
}
