// ============================================
// File: crates/luminous-server/src/plugins.rs
// ============================================
//! # Plugin Registry
//!
//! ## Creation Reason
//! The control plane delegates its API gateway and data store roles to
//! pluggable backends. Both must be present before the server accepts
//! traffic.
//!
//! ## Main Functionality
//! - `Plugin`: lifecycle shared by every backend
//! - `ApiGateway` / `DataStore`: role traits
//! - `PluginRegistry`: plugin name → typed factory
//! - `PluginSet`: the backends resolved from configuration
//!
//! ## Resolution
//! ```text
//! plugins.load = ["api-gateway", "data-store"]
//!        │
//!        ▼
//! PluginRegistry::load ── unknown name ──► UnknownPlugin
//!        │
//!        ▼
//! PluginSet::integrity_check ── role absent ──► PluginMissing (fatal)
//!        │
//!        ▼
//! start_all() ... stop_all()
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Factories are typed by role, so a factory can never fill the wrong slot
//! - Plugins are stopped in reverse start order
//!
//! ## Last Modified
//! v0.1.0 - Initial plugin registry with built-in backends

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{Result, ServerError};

/// Name of the built-in API gateway plugin.
pub const API_GATEWAY: &str = "api-gateway";

/// Name of the built-in data store plugin.
pub const DATA_STORE: &str = "data-store";

// ============================================
// Plugin Traits
// ============================================

/// Lifecycle common to all backends.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Plugin name.
    fn name(&self) -> &str;

    /// Plugin version.
    fn version(&self) -> &str;

    /// Starts the backend.
    ///
    /// # Errors
    /// Returns error if the backend cannot start
    async fn start(&self) -> Result<()>;

    /// Stops the backend.
    ///
    /// # Errors
    /// Returns error if the backend fails to stop cleanly
    async fn stop(&self) -> Result<()>;
}

/// Backend fulfilling the API gateway role.
pub trait ApiGateway: Plugin {}

/// Backend fulfilling the data store role.
pub trait DataStore: Plugin {}

// ============================================
// PluginRegistry
// ============================================

/// Typed constructor for a backend.
#[derive(Clone, Copy)]
pub enum PluginFactory {
    /// Produces an API gateway.
    ApiGateway(fn() -> Arc<dyn ApiGateway>),
    /// Produces a data store.
    DataStore(fn() -> Arc<dyn DataStore>),
}

/// Maps plugin names to factories.
#[derive(Default)]
pub struct PluginRegistry {
    factories: HashMap<String, PluginFactory>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in backends.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(
            API_GATEWAY,
            PluginFactory::ApiGateway(builtin_api_gateway),
        );
        registry.register(DATA_STORE, PluginFactory::DataStore(builtin_data_store));
        registry
    }

    /// Registers (or replaces) a factory under `name`.
    pub fn register(&mut self, name: impl Into<String>, factory: PluginFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Returns `true` if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Instantiates the named plugins.
    ///
    /// # Errors
    /// Returns `UnknownPlugin` for a name with no registered factory.
    pub fn load(&self, names: &[String]) -> Result<PluginSet> {
        let mut set = PluginSet::default();

        for name in names {
            let factory = self
                .factories
                .get(name)
                .ok_or_else(|| ServerError::UnknownPlugin { name: name.clone() })?;

            match factory {
                PluginFactory::ApiGateway(make) => {
                    if set.api_gateway.is_some() {
                        warn!(plugin = %name, "Replacing previously loaded API gateway");
                    }
                    set.api_gateway = Some(make());
                }
                PluginFactory::DataStore(make) => {
                    if set.data_store.is_some() {
                        warn!(plugin = %name, "Replacing previously loaded data store");
                    }
                    set.data_store = Some(make());
                }
            }
            info!(plugin = %name, "Plugin loaded");
        }

        Ok(set)
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("PluginRegistry").field("plugins", &names).finish()
    }
}

// ============================================
// PluginSet
// ============================================

/// Backends resolved from configuration.
#[derive(Default)]
pub struct PluginSet {
    api_gateway: Option<Arc<dyn ApiGateway>>,
    data_store: Option<Arc<dyn DataStore>>,
}

impl PluginSet {
    /// Fails unless both roles are filled.
    ///
    /// # Errors
    /// Returns `PluginMissing` naming the empty role.
    pub fn integrity_check(&self) -> Result<()> {
        if self.api_gateway.is_none() {
            return Err(ServerError::PluginMissing {
                role: API_GATEWAY.to_string(),
            });
        }
        if self.data_store.is_none() {
            return Err(ServerError::PluginMissing {
                role: DATA_STORE.to_string(),
            });
        }
        Ok(())
    }

    /// Returns the API gateway, if loaded.
    #[must_use]
    pub fn api_gateway(&self) -> Option<&Arc<dyn ApiGateway>> {
        self.api_gateway.as_ref()
    }

    /// Returns the data store, if loaded.
    #[must_use]
    pub fn data_store(&self) -> Option<&Arc<dyn DataStore>> {
        self.data_store.as_ref()
    }

    /// Starts the data store, then the gateway.
    ///
    /// If the gateway fails, the already started data store is stopped
    /// again before the error is returned.
    ///
    /// # Errors
    /// Returns the first start failure.
    pub async fn start_all(&self) -> Result<()> {
        if let Some(store) = &self.data_store {
            start_plugin(store.as_ref()).await?;
        }
        if let Some(gateway) = &self.api_gateway {
            if let Err(e) = start_plugin(gateway.as_ref()).await {
                if let Some(store) = &self.data_store {
                    stop_plugin(store.as_ref()).await;
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Stops the gateway, then the data store, logging failures rather
    /// than aborting.
    pub async fn stop_all(&self) {
        if let Some(gateway) = &self.api_gateway {
            stop_plugin(gateway.as_ref()).await;
        }
        if let Some(store) = &self.data_store {
            stop_plugin(store.as_ref()).await;
        }
    }
}

async fn start_plugin<P: Plugin + ?Sized>(plugin: &P) -> Result<()> {
    plugin.start().await?;
    info!(plugin = plugin.name(), version = plugin.version(), "Plugin started");
    Ok(())
}

async fn stop_plugin<P: Plugin + ?Sized>(plugin: &P) {
    match plugin.stop().await {
        Ok(()) => info!(plugin = plugin.name(), "Plugin stopped"),
        Err(e) => warn!(plugin = plugin.name(), error = %e, "Plugin failed to stop"),
    }
}

impl std::fmt::Debug for PluginSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginSet")
            .field("api_gateway", &self.api_gateway.as_ref().map(|p| p.name().to_string()))
            .field("data_store", &self.data_store.as_ref().map(|p| p.name().to_string()))
            .finish()
    }
}

// ============================================
// Built-in Backends
// ============================================

/// In-process API gateway.
#[derive(Debug, Default)]
pub struct BuiltinApiGateway {
    running: AtomicBool,
}

impl BuiltinApiGateway {
    /// Returns `true` between `start` and `stop`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Plugin for BuiltinApiGateway {
    fn name(&self) -> &str {
        API_GATEWAY
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(ServerError::plugin_failed(API_GATEWAY, "already running"));
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.running.store(false, Ordering::Release);
        Ok(())
    }
}

impl ApiGateway for BuiltinApiGateway {}

/// In-process data store.
#[derive(Debug, Default)]
pub struct BuiltinDataStore {
    running: AtomicBool,
}

impl BuiltinDataStore {
    /// Returns `true` between `start` and `stop`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Plugin for BuiltinDataStore {
    fn name(&self) -> &str {
        DATA_STORE
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(ServerError::plugin_failed(DATA_STORE, "already running"));
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.running.store(false, Ordering::Release);
        Ok(())
    }
}

impl DataStore for BuiltinDataStore {}

fn builtin_api_gateway() -> Arc<dyn ApiGateway> {
    Arc::new(BuiltinApiGateway::default())
}

fn builtin_data_store() -> Arc<dyn DataStore> {
    Arc::new(BuiltinDataStore::default())
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_builtins_registered() {
        let registry = PluginRegistry::with_builtins();
        assert!(registry.contains(API_GATEWAY));
        assert!(registry.contains(DATA_STORE));
        assert!(!registry.contains("teleporter"));
    }

    #[test]
    fn test_load_both_roles() {
        let set = PluginRegistry::with_builtins()
            .load(&names(&[API_GATEWAY, DATA_STORE]))
            .unwrap();
        set.integrity_check().unwrap();
        assert_eq!(set.api_gateway().unwrap().name(), API_GATEWAY);
        assert_eq!(set.data_store().unwrap().name(), DATA_STORE);
    }

    #[test]
    fn test_unknown_plugin() {
        let err = PluginRegistry::with_builtins()
            .load(&names(&[API_GATEWAY, "teleporter"]))
            .unwrap_err();
        assert!(matches!(err, ServerError::UnknownPlugin { ref name } if name == "teleporter"));
    }

    #[test]
    fn test_integrity_check_requires_both() {
        let set = PluginRegistry::with_builtins()
            .load(&names(&[API_GATEWAY]))
            .unwrap();
        let err = set.integrity_check().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains(DATA_STORE));

        let err = PluginSet::default().integrity_check().unwrap_err();
        assert!(err.to_string().contains(API_GATEWAY));
    }

    #[test]
    fn test_custom_factory_fills_role() {
        let mut registry = PluginRegistry::new();
        registry.register(
            "edge-gateway",
            PluginFactory::ApiGateway(builtin_api_gateway),
        );
        registry.register(DATA_STORE, PluginFactory::DataStore(builtin_data_store));

        let set = registry.load(&names(&["edge-gateway", DATA_STORE])).unwrap();
        set.integrity_check().unwrap();
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let set = PluginRegistry::with_builtins()
            .load(&names(&[API_GATEWAY, DATA_STORE]))
            .unwrap();

        set.start_all().await.unwrap();
        // Starting twice is a plugin error
        assert!(set.start_all().await.is_err());
        set.stop_all().await;
        set.start_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_gateway_failure_stops_data_store() {
        let set = PluginRegistry::with_builtins()
            .load(&names(&[API_GATEWAY, DATA_STORE]))
            .unwrap();

        // A gateway that is already running refuses to start
        set.api_gateway().unwrap().start().await.unwrap();
        let err = set.start_all().await.unwrap_err();
        assert!(err.to_string().contains(API_GATEWAY));

        // The data store was stopped again, so a retry gets past it
        let err = set.start_all().await.unwrap_err();
        assert!(err.to_string().contains(API_GATEWAY));
        assert!(!err.to_string().contains(DATA_STORE));
    }
}
