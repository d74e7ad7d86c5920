// ============================================
// File: crates/luminous-server/src/error.rs
// ============================================
//! # Server Error Types
//!
//! ## Last Modified
//! v0.1.0 - Initial server errors and gRPC status mapping

use thiserror::Error;
use tonic::Status;

use luminous_common::error::CommonError;
use luminous_core::error::CoreError;
use luminous_transport::error::TransportError;

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Server error types.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoad {
        path: String,
        reason: String,
    },

    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        field: String,
        reason: String,
    },

    #[error("Request carries no node identity")]
    MissingIdentity,

    #[error("Node not found: {node_id}")]
    NodeNotFound {
        node_id: String,
    },

    #[error("Session not found: {session_id}")]
    SessionNotFound {
        session_id: String,
    },

    #[error("Session expired: {session_id}")]
    SessionExpired {
        session_id: String,
    },

    #[error("Command queue for node {node_id} is full after {timeout_ms}ms")]
    QueueFull {
        node_id: String,
        timeout_ms: u64,
    },

    #[error("Stream for node {node_id} is closed")]
    StreamClosed {
        node_id: String,
    },

    #[error("Node {node_id} has no open stream")]
    NodeNotConnected {
        node_id: String,
    },

    #[error("Required plugin role '{role}' is not loaded")]
    PluginMissing {
        role: String,
    },

    #[error("Unknown plugin: {name}")]
    UnknownPlugin {
        name: String,
    },

    #[error("Plugin '{name}' failed: {reason}")]
    PluginFailed {
        name: String,
        reason: String,
    },

    #[error("Server failed to start: {reason}")]
    StartupFailed {
        reason: String,
    },

    #[error(transparent)]
    Common(#[from] CommonError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn node_not_found(node_id: impl Into<String>) -> Self {
        Self::NodeNotFound {
            node_id: node_id.into(),
        }
    }

    pub fn plugin_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PluginFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn startup_failed(reason: impl Into<String>) -> Self {
        Self::StartupFailed {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigLoad { .. } | Self::ConfigInvalid { .. })
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NodeNotFound { .. } | Self::SessionNotFound { .. } | Self::NodeNotConnected { .. }
        )
    }

    /// Session lookups that must be treated as "no valid session".
    #[must_use]
    pub const fn is_session_error(&self) -> bool {
        matches!(
            self,
            Self::SessionNotFound { .. } | Self::SessionExpired { .. }
        )
    }

    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        match self {
            Self::MissingIdentity => true,
            Self::Core(e) => e.is_auth_failure(),
            _ => false,
        }
    }

    /// Errors that must abort startup; there is no degraded mode.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::ConfigLoad { .. }
            | Self::ConfigInvalid { .. }
            | Self::PluginMissing { .. }
            | Self::UnknownPlugin { .. }
            | Self::StartupFailed { .. } => true,
            Self::Core(e) => e.is_fatal(),
            Self::Transport(e) => e.is_startup_error(),
            _ => false,
        }
    }
}

// ============================================
// gRPC Mapping
// ============================================

impl From<ServerError> for Status {
    fn from(err: ServerError) -> Self {
        let message = err.to_string();
        match err {
            e if e.is_auth_failure() => Status::unauthenticated(message),
            ServerError::SessionExpired { .. } => Status::unauthenticated(message),
            ServerError::NodeNotFound { .. }
            | ServerError::SessionNotFound { .. }
            | ServerError::NodeNotConnected { .. } => Status::not_found(message),
            ServerError::QueueFull { .. } => Status::resource_exhausted(message),
            ServerError::StreamClosed { .. } => Status::unavailable(message),
            ServerError::Core(CoreError::InvalidCsr { .. }) | ServerError::Common(_) => {
                Status::invalid_argument(message)
            }
            ServerError::Transport(TransportError::StreamClosed) => Status::cancelled(message),
            _ => Status::internal(message),
        }
    }
}
