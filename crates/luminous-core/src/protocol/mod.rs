// ============================================
// File: crates/luminous-core/src/protocol/mod.rs
// ============================================
//! # Protocol Module
//!
//! ## Creation Reason
//! Hosts the code generated from `proto/luminous_mesh.proto` and the
//! constants other layers need to reason about calls by name.
//!
//! ## Main Functionality
//! - Generated messages (`RegisterNodeRequest`, `NodeStatusUpdate`, ...)
//! - Generated `node_service_server` module (server side only)
//! - Metadata header names and fully qualified method paths
//!
//! ## ⚠️ Important Note for Next Developer
//! - Field numbers in the `.proto` are wire contract; append, never renumber
//! - `REGISTER_NODE_METHOD` is the only path exempt from authentication
//!
//! ## Last Modified
//! v0.1.0 - Initial protocol definitions

/// Generated protobuf and gRPC code for package `luminousmesh`.
#[allow(missing_docs, clippy::all, clippy::pedantic)]
pub mod pb {
    tonic::include_proto!("luminousmesh");
}

pub use pb::node_service_server::{NodeService, NodeServiceServer};
pub use pb::{
    AuthenticationRequest, AuthenticationResponse, CommandType, ControlPlaneCommand,
    ControlPlaneInfo, MetricReport, NodeBasicInfo, NodeCapabilities, NodeConfiguration,
    NodeState, NodeStatus, NodeStatusUpdate, RegisterNodeRequest, RegisterNodeResponse,
    ResourceCapacity, ResourceLimits, ResourceUsage, TokenRotationRequest,
    TokenRotationResponse,
};

// ============================================
// Call Metadata
// ============================================

/// Metadata header carrying the bearer token.
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Metadata header carrying the caller's asserted node id.
pub const NODE_ID_HEADER: &str = "node-id";

/// Optional scheme prefix accepted in front of the bearer token.
pub const BEARER_PREFIX: &str = "Bearer ";

// ============================================
// Method Paths
// ============================================

/// Fully qualified gRPC service name.
pub const NODE_SERVICE_NAME: &str = "luminousmesh.NodeService";

/// Bootstrap call; the only method callable without a bearer token.
pub const REGISTER_NODE_METHOD: &str = "/luminousmesh.NodeService/RegisterNode";

/// Session-opening call.
pub const AUTHENTICATE_METHOD: &str = "/luminousmesh.NodeService/Authenticate";

/// Bidirectional command/status stream.
pub const STREAM_CONNECTION_METHOD: &str = "/luminousmesh.NodeService/StreamConnection";

/// Token refresh call.
pub const ROTATE_TOKEN_METHOD: &str = "/luminousmesh.NodeService/RotateToken";

/// Returns `true` if calls to `method` must pass the authentication gate.
#[must_use]
pub fn requires_authentication(method: &str) -> bool {
    method != REGISTER_NODE_METHOD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_register_is_exempt() {
        assert!(!requires_authentication(REGISTER_NODE_METHOD));
        assert!(requires_authentication(AUTHENTICATE_METHOD));
        assert!(requires_authentication(STREAM_CONNECTION_METHOD));
        assert!(requires_authentication(ROTATE_TOKEN_METHOD));
    }

    #[test]
    fn test_method_paths_share_service_name() {
        for method in [
            REGISTER_NODE_METHOD,
            AUTHENTICATE_METHOD,
            STREAM_CONNECTION_METHOD,
            ROTATE_TOKEN_METHOD,
        ] {
            assert!(method.starts_with(&format!("/{NODE_SERVICE_NAME}/")));
        }
    }

    #[test]
    fn test_state_names() {
        assert_eq!(NodeState::Running.as_str_name(), "NODE_STATE_RUNNING");
        assert_eq!(
            NodeState::from_str_name("NODE_STATE_DEGRADED"),
            Some(NodeState::Degraded)
        );
    }
}
