// ============================================
// File: crates/luminous-server/src/services/registry.rs
// ============================================
//! # Node Registry
//!
//! ## Creation Reason
//! The control plane needs one place that knows every registered node,
//! what it declared about itself, what it last reported, and which
//! sessions it currently holds.
//!
//! ## Main Functionality
//! - `Node`: identity record plus its session leases
//! - `NodeRegistry`: registration, session lifecycle, status updates
//!
//! ## Session Lease Lifecycle
//! ```text
//!  Authenticate ──► create_session ──► Active ──(TTL elapsed)──► Expired
//!                      │                                           │
//!                      └─ purges this node's expired leases ◄──────┘
//!                                                  (or the periodic sweep)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Session expiry never removes the node. Only `remove_node` does.
//! - `validate_session` is read-only. It must not refresh activity.
//! - Every session-map mutation takes `session_lock` for writing so the
//!   purge-then-insert in `create_session` is atomic. Status updates do
//!   not touch session maps and skip that lock.
//! - Lock order is always `session_lock` first, then the DashMap shard.
//!
//! ## Last Modified
//! v0.1.0 - Initial node registry

use std::collections::HashMap;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use luminous_common::time::unix_now;
use luminous_common::{NodeId, SessionId};
use luminous_core::protocol::{
    NodeBasicInfo, NodeCapabilities, NodeConfiguration, NodeState, NodeStatus, ResourceLimits,
};

use crate::error::{Result, ServerError};

/// Every reportable node state, in wire order.
pub const NODE_STATES: [NodeState; 7] = [
    NodeState::Unspecified,
    NodeState::Starting,
    NodeState::Running,
    NodeState::Degraded,
    NodeState::Maintenance,
    NodeState::Stopping,
    NodeState::Error,
];

// ============================================
// Node
// ============================================

/// A registered node.
#[derive(Debug, Clone)]
pub struct Node {
    /// Identifier assigned at registration.
    pub id: NodeId,
    /// Self-reported static metadata.
    pub basic_info: NodeBasicInfo,
    /// Declared capabilities, set at authentication.
    pub capabilities: NodeCapabilities,
    /// Latest reported status; `None` until the first stream update.
    pub status: Option<NodeStatus>,
    /// Session id → last activity.
    pub sessions: HashMap<SessionId, Instant>,
    /// Unix seconds of the last registry write for this node.
    pub last_seen: i64,
}

impl Node {
    fn new(id: NodeId, basic_info: NodeBasicInfo) -> Self {
        Self {
            id,
            basic_info,
            capabilities: NodeCapabilities::default(),
            status: None,
            sessions: HashMap::new(),
            last_seen: unix_now(),
        }
    }

    /// Returns the reported state, `Unspecified` before the first update.
    #[must_use]
    pub fn state(&self) -> NodeState {
        self.status
            .as_ref()
            .map_or(NodeState::Unspecified, NodeStatus::state)
    }

    /// Returns the reported hostname.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.basic_info.hostname
    }

    fn touch(&mut self) {
        self.last_seen = self.last_seen.max(unix_now());
    }

    fn purge_expired(&mut self, ttl: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, last_activity| last_activity.elapsed() <= ttl);
        before - self.sessions.len()
    }
}

// ============================================
// NodeRegistry
// ============================================

/// In-memory directory of nodes and their sessions.
pub struct NodeRegistry {
    nodes: DashMap<NodeId, Node>,
    /// Serializes session-map mutations across all nodes.
    session_lock: RwLock<()>,
    session_ttl: Duration,
}

impl NodeRegistry {
    /// Creates an empty registry with the given session lease TTL.
    #[must_use]
    pub fn new(session_ttl: Duration) -> Self {
        Self {
            nodes: DashMap::new(),
            session_lock: RwLock::new(()),
            session_ttl,
        }
    }

    /// Returns the session lease TTL.
    #[must_use]
    pub const fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Produces a fresh node id.
    #[must_use]
    pub fn generate_node_id(&self) -> NodeId {
        NodeId::generate()
    }

    // ========================================
    // Registration
    // ========================================

    /// Creates the node record, replacing any existing one with this id.
    pub fn register_node(&self, node_id: NodeId, basic_info: NodeBasicInfo) {
        let hostname = basic_info.hostname.clone();
        let previous = self
            .nodes
            .insert(node_id.clone(), Node::new(node_id.clone(), basic_info));

        if previous.is_some() {
            warn!(node_id = %node_id, hostname = %hostname, "Node re-registered, previous record replaced");
        } else {
            info!(node_id = %node_id, hostname = %hostname, "Node registered");
        }
    }

    /// Removes the node and every session it holds.
    pub fn remove_node(&self, node_id: &str) -> Option<Node> {
        let _guard = self.session_lock.write();
        let removed = self.nodes.remove(node_id).map(|(_, node)| node);
        if let Some(ref node) = removed {
            info!(
                node_id = %node.id,
                sessions = node.sessions.len(),
                "Node removed"
            );
        }
        removed
    }

    // ========================================
    // Sessions
    // ========================================

    /// Opens a new session lease for `node_id`.
    ///
    /// Expired leases of this node are purged first.
    ///
    /// # Errors
    /// Returns `NodeNotFound` if the node is unknown.
    pub fn create_session(&self, node_id: &str) -> Result<SessionId> {
        let _guard = self.session_lock.write();
        let mut node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| ServerError::node_not_found(node_id))?;

        let purged = node.purge_expired(self.session_ttl);
        if purged > 0 {
            debug!(node_id = %node_id, purged, "Purged expired sessions");
        }

        let session_id = SessionId::generate();
        node.sessions.insert(session_id.clone(), Instant::now());
        node.touch();

        info!(
            node_id = %node_id,
            session_id = %session_id,
            active_sessions = node.sessions.len(),
            "Session created"
        );
        Ok(session_id)
    }

    /// Checks that `session_id` is a live lease of `node_id`.
    ///
    /// # Errors
    /// `NodeNotFound`, `SessionNotFound` or `SessionExpired`.
    pub fn validate_session(&self, node_id: &str, session_id: &str) -> Result<()> {
        let _guard = self.session_lock.read();
        let node = self
            .nodes
            .get(node_id)
            .ok_or_else(|| ServerError::node_not_found(node_id))?;

        let last_activity =
            node.sessions
                .get(session_id)
                .ok_or_else(|| ServerError::SessionNotFound {
                    session_id: session_id.to_string(),
                })?;

        if last_activity.elapsed() > self.session_ttl {
            return Err(ServerError::SessionExpired {
                session_id: session_id.to_string(),
            });
        }
        Ok(())
    }

    /// Drops expired leases from every node.
    ///
    /// # Returns
    /// Number of sessions removed.
    pub fn sweep_expired_sessions(&self) -> usize {
        let _guard = self.session_lock.write();
        let mut removed = 0;
        for mut entry in self.nodes.iter_mut() {
            removed += entry.value_mut().purge_expired(self.session_ttl);
        }
        if removed > 0 {
            info!("Cleaned up {} expired sessions", removed);
        }
        removed
    }

    // ========================================
    // Node Updates
    // ========================================

    /// Replaces the node's self-reported info and capabilities.
    ///
    /// # Errors
    /// Returns `NodeNotFound` if the node is unknown.
    pub fn update_node_info(
        &self,
        node_id: &str,
        basic_info: NodeBasicInfo,
        capabilities: NodeCapabilities,
    ) -> Result<()> {
        let mut node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| ServerError::node_not_found(node_id))?;
        node.basic_info = basic_info;
        node.capabilities = capabilities;
        node.touch();
        Ok(())
    }

    /// Replaces the node's reported status.
    ///
    /// # Returns
    /// The node's hostname, for labelling derived metrics.
    ///
    /// # Errors
    /// Returns `NodeNotFound` if the node is unknown.
    pub fn update_node_status(&self, node_id: &str, status: NodeStatus) -> Result<String> {
        let mut node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| ServerError::node_not_found(node_id))?;
        node.status = Some(status);
        node.touch();
        Ok(node.basic_info.hostname.clone())
    }

    /// Configuration handed to a freshly authenticated node. Never fails.
    #[must_use]
    pub fn node_configuration(&self, _node_id: &str) -> NodeConfiguration {
        NodeConfiguration {
            settings: HashMap::from([
                ("log_level".to_string(), "info".to_string()),
                ("mode".to_string(), "normal".to_string()),
            ]),
            enabled_features: vec!["metrics".to_string(), "health_check".to_string()],
            resource_limits: Some(ResourceLimits {
                max_concurrent_tasks: 10,
                max_memory_mb: 1024,
                max_cpu_usage: 0.8,
            }),
        }
    }

    // ========================================
    // Accessors
    // ========================================

    /// Returns a snapshot of the node.
    #[must_use]
    pub fn get_node(&self, node_id: &str) -> Option<Node> {
        self.nodes.get(node_id).map(|node| node.value().clone())
    }

    /// Returns a snapshot of every node.
    #[must_use]
    pub fn list_nodes(&self) -> Vec<Node> {
        self.nodes.iter().map(|node| node.value().clone()).collect()
    }

    /// Returns the number of registered nodes.
    #[must_use]
    pub fn count(&self) -> usize {
        self.nodes.len()
    }

    /// Counts nodes per reported state. Every state is present, zero included.
    #[must_use]
    pub fn count_by_state(&self) -> Vec<(NodeState, usize)> {
        let mut counts: HashMap<NodeState, usize> = HashMap::new();
        for node in self.nodes.iter() {
            *counts.entry(node.state()).or_default() += 1;
        }
        NODE_STATES
            .iter()
            .map(|state| (*state, counts.get(state).copied().unwrap_or(0)))
            .collect()
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("nodes", &self.nodes.len())
            .field("session_ttl", &self.session_ttl)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn info(hostname: &str) -> NodeBasicInfo {
        NodeBasicInfo {
            hostname: hostname.to_string(),
            ..Default::default()
        }
    }

    fn registry_with(node: &str, ttl: Duration) -> NodeRegistry {
        let registry = NodeRegistry::new(ttl);
        registry.register_node(NodeId::parse(node).unwrap(), info("worker-1"));
        registry
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let registry = NodeRegistry::new(Duration::from_secs(60));
        assert_ne!(registry.generate_node_id(), registry.generate_node_id());
    }

    #[test]
    fn test_register_and_get() {
        let registry = registry_with("node-a", Duration::from_secs(60));

        let node = registry.get_node("node-a").unwrap();
        assert_eq!(node.hostname(), "worker-1");
        assert!(node.sessions.is_empty());
        assert!(node.status.is_none());
        assert_eq!(node.state(), NodeState::Unspecified);
        assert!(registry.get_node("node-b").is_none());
    }

    #[test]
    fn test_reregistration_replaces_record() {
        let registry = registry_with("node-a", Duration::from_secs(60));
        registry.create_session("node-a").unwrap();

        registry.register_node(NodeId::parse("node-a").unwrap(), info("worker-2"));

        let node = registry.get_node("node-a").unwrap();
        assert_eq!(node.hostname(), "worker-2");
        assert!(node.sessions.is_empty());
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_two_sessions_both_valid() {
        let registry = registry_with("node-a", Duration::from_secs(60));

        let first = registry.create_session("node-a").unwrap();
        let second = registry.create_session("node-a").unwrap();

        assert_ne!(first, second);
        registry.validate_session("node-a", first.as_str()).unwrap();
        registry.validate_session("node-a", second.as_str()).unwrap();
    }

    #[test]
    fn test_create_session_unknown_node() {
        let registry = NodeRegistry::new(Duration::from_secs(60));
        let err = registry.create_session("ghost").unwrap_err();
        assert!(matches!(err, ServerError::NodeNotFound { .. }));
    }

    #[test]
    fn test_validate_distinguishes_node_and_session() {
        let registry = registry_with("node-a", Duration::from_secs(60));

        let unknown_node = registry.validate_session("ghost", "s").unwrap_err();
        let unknown_session = registry.validate_session("node-a", "s").unwrap_err();

        assert!(matches!(unknown_node, ServerError::NodeNotFound { .. }));
        assert!(matches!(unknown_session, ServerError::SessionNotFound { .. }));
    }

    #[test]
    fn test_expired_session_fails_closed_and_is_purged() {
        let registry = registry_with("node-a", Duration::from_millis(50));
        let old = registry.create_session("node-a").unwrap();

        sleep(Duration::from_millis(80));
        let err = registry.validate_session("node-a", old.as_str()).unwrap_err();
        assert!(matches!(err, ServerError::SessionExpired { .. }));

        let fresh = registry.create_session("node-a").unwrap();
        let node = registry.get_node("node-a").unwrap();
        assert_eq!(node.sessions.len(), 1);
        assert!(node.sessions.contains_key(&fresh));

        // Expiry purged the lease, never the node
        let err = registry.validate_session("node-a", old.as_str()).unwrap_err();
        assert!(matches!(err, ServerError::SessionNotFound { .. }));
    }

    #[test]
    fn test_validation_does_not_refresh_activity() {
        let registry = registry_with("node-a", Duration::from_millis(150));
        let session = registry.create_session("node-a").unwrap();

        sleep(Duration::from_millis(90));
        registry.validate_session("node-a", session.as_str()).unwrap();
        sleep(Duration::from_millis(90));

        assert!(registry.validate_session("node-a", session.as_str()).is_err());
    }

    #[test]
    fn test_sweep_keeps_nodes() {
        let registry = registry_with("node-a", Duration::from_millis(30));
        registry.create_session("node-a").unwrap();
        registry.create_session("node-a").unwrap();

        sleep(Duration::from_millis(50));
        assert_eq!(registry.sweep_expired_sessions(), 2);
        assert_eq!(registry.sweep_expired_sessions(), 0);
        assert!(registry.get_node("node-a").is_some());
    }

    #[test]
    fn test_update_info_and_status() {
        let registry = registry_with("node-a", Duration::from_secs(60));

        let capabilities = NodeCapabilities {
            features: vec!["gpu".into()],
            ..Default::default()
        };
        registry
            .update_node_info("node-a", info("worker-9"), capabilities)
            .unwrap();

        let status = NodeStatus {
            state: NodeState::Running as i32,
            ..Default::default()
        };
        let hostname = registry.update_node_status("node-a", status).unwrap();
        assert_eq!(hostname, "worker-9");

        let node = registry.get_node("node-a").unwrap();
        assert_eq!(node.capabilities.features, vec!["gpu".to_string()]);
        assert_eq!(node.state(), NodeState::Running);

        assert!(registry
            .update_node_status("ghost", NodeStatus::default())
            .is_err());
        assert!(registry
            .update_node_info("ghost", info("x"), NodeCapabilities::default())
            .is_err());
    }

    #[test]
    fn test_default_configuration() {
        let registry = NodeRegistry::new(Duration::from_secs(60));
        let config = registry.node_configuration("anything");

        assert_eq!(config.settings.get("log_level").map(String::as_str), Some("info"));
        assert_eq!(config.settings.get("mode").map(String::as_str), Some("normal"));
        assert_eq!(config.enabled_features, vec!["metrics", "health_check"]);
        let limits = config.resource_limits.unwrap();
        assert_eq!(limits.max_concurrent_tasks, 10);
        assert_eq!(limits.max_memory_mb, 1024);
    }

    #[test]
    fn test_remove_and_count_by_state() {
        let registry = registry_with("node-a", Duration::from_secs(60));
        registry.register_node(NodeId::parse("node-b").unwrap(), info("worker-2"));
        registry
            .update_node_status(
                "node-b",
                NodeStatus {
                    state: NodeState::Degraded as i32,
                    ..Default::default()
                },
            )
            .unwrap();

        let counts: HashMap<_, _> = registry.count_by_state().into_iter().collect();
        assert_eq!(counts.len(), NODE_STATES.len());
        assert_eq!(counts[&NodeState::Unspecified], 1);
        assert_eq!(counts[&NodeState::Degraded], 1);
        assert_eq!(counts[&NodeState::Running], 0);

        let removed = registry.remove_node("node-a").unwrap();
        assert_eq!(removed.id.as_str(), "node-a");
        assert!(registry.remove_node("node-a").is_none());
        assert_eq!(registry.list_nodes().len(), 1);
    }
}
