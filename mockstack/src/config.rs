//! Configuration loading for test sessions

use serde::Deserialize;
use tracing::info;

use crate::hub::MockHub;

/// Session configuration: allow-list seeds and startup engagement.
///
/// Loaded from an optional `mockstack.toml` next to the test runner, with
/// `MOCKSTACK_*` environment variables layered on top.
#[derive(Debug, Deserialize, Default)]
pub struct MockConfig {
    /// Engage patching as soon as the configuration is applied
    #[serde(default)]
    pub engage: bool,

    #[serde(default)]
    pub allowed: AllowedConfig,
}

/// Services allowed through to the real factories, per router.
#[derive(Debug, Deserialize, Default)]
pub struct AllowedConfig {
    #[serde(default)]
    pub clients: Vec<String>,

    #[serde(default)]
    pub resources: Vec<String>,
}

impl MockConfig {
    /// Load configuration from file and environment
    pub fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("mockstack").required(false))
            .add_source(config::Environment::with_prefix("MOCKSTACK"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Seed `hub` with the configured allow-lists and engage if requested.
    pub fn apply<T: 'static>(&self, hub: &MockHub<T>) {
        for service in &self.allowed.clients {
            hub.clients().allow(service.clone());
        }
        for service in &self.allowed.resources {
            hub.resources().allow(service.clone());
        }
        if self.engage {
            info!("engaging factory patching from configuration");
            hub.engage_patching();
        }
    }
}
