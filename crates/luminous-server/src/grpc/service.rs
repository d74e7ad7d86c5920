// ============================================
// File: crates/luminous-server/src/grpc/service.rs
// ============================================
//! # Node Service
//!
//! ## Creation Reason
//! Implements the four `NodeService` RPCs by composing the Auth Manager,
//! the Node Registry and per-node Stream Handlers.
//!
//! ## Main Functionality
//! - `RegisterNode`: bootstrap token → CSR → node id → token → record
//! - `Authenticate`: token → certificate → session → node info → config
//! - `StreamConnection`: hands the stream to a fresh `StreamHandler`
//! - `RotateToken`: token + session check, then a new token
//! - `dispatch_command` / `remove_node`: control-plane side operations
//!
//! ## Failure Policy
//! ```text
//! RegisterNode      expected failures ──► success=false + message
//! Authenticate      expected failures ──► success=false + message
//!                   store malfunction ──► Status
//! StreamConnection  stream failure    ──► Status on the response stream
//! RotateToken       any failure       ──► Status
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The response messages are matched on by node agents; keep them stable
//! - A stream's handler is removed from the directory only if it is still
//!   the registered one (a newer stream for the same node may replace it)
//!
//! ## Last Modified
//! v0.1.0 - Initial node service

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, info, warn};

use luminous_common::NodeId;
use luminous_core::protocol::{
    AuthenticationRequest, AuthenticationResponse, ControlPlaneCommand, ControlPlaneInfo,
    NodeService, NodeStatusUpdate, RegisterNodeRequest, RegisterNodeResponse,
    TokenRotationRequest, TokenRotationResponse, AUTHENTICATE_METHOD, REGISTER_NODE_METHOD,
    ROTATE_TOKEN_METHOD, STREAM_CONNECTION_METHOD,
};

use crate::error::{Result, ServerError};
use crate::grpc::interceptors::{AuthGate, CallLog};
use crate::handlers::StreamHandler;
use crate::metrics::MetricsSink;
use crate::services::{AuthManager, NodeRegistry};

/// Slots in the response channel between a handler and tonic.
///
/// The handler's command queue is the only real buffer; this channel holds
/// the single command currently being written.
pub(crate) const RESPONSE_BUFFER: usize = 1;

/// Outbound half of `StreamConnection`.
pub type CommandStream = Pin<Box<dyn Stream<Item = std::result::Result<ControlPlaneCommand, Status>> + Send + 'static>>;

// ============================================
// StreamLimits
// ============================================

/// Sizing for per-node command queues.
#[derive(Debug, Clone, Copy)]
pub struct StreamLimits {
    /// Bounded command queue capacity.
    pub queue_capacity: usize,
    /// How long `send_command` waits for room.
    pub send_timeout: Duration,
}

// ============================================
// ControlPlaneService
// ============================================

/// The `NodeService` implementation.
pub struct ControlPlaneService {
    auth: Arc<AuthManager>,
    registry: Arc<NodeRegistry>,
    metrics: Arc<dyn MetricsSink>,
    gate: AuthGate,
    control_plane_info: ControlPlaneInfo,
    limits: StreamLimits,
    streams: Arc<DashMap<NodeId, Arc<StreamHandler>>>,
}

impl ControlPlaneService {
    /// Builds the service around shared components.
    #[must_use]
    pub fn new(
        auth: Arc<AuthManager>,
        registry: Arc<NodeRegistry>,
        metrics: Arc<dyn MetricsSink>,
        control_plane_info: ControlPlaneInfo,
        limits: StreamLimits,
    ) -> Self {
        Self {
            gate: AuthGate::new(Arc::clone(&auth)),
            auth,
            registry,
            metrics,
            control_plane_info,
            limits,
            streams: Arc::new(DashMap::new()),
        }
    }

    /// Returns the number of nodes with an open stream.
    #[must_use]
    pub fn connected_count(&self) -> usize {
        self.streams.len()
    }

    /// Returns `true` if `node_id` has an open stream.
    #[must_use]
    pub fn is_connected(&self, node_id: &str) -> bool {
        self.streams.contains_key(node_id)
    }

    /// Queues a command for a connected node.
    ///
    /// # Errors
    /// - `NodeNotConnected` if the node has no open stream
    /// - `QueueFull` / `StreamClosed` from the node's handler
    pub async fn dispatch_command(&self, node_id: &str, command: ControlPlaneCommand) -> Result<()> {
        let handler = self
            .streams
            .get(node_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ServerError::NodeNotConnected {
                node_id: node_id.to_string(),
            })?;

        let command_id = command.command_id.clone();
        handler.send_command(command).await?;
        debug!(node_id = %node_id, command_id = %command_id, "Command queued");
        Ok(())
    }

    /// Forgets a node: closes its stream, drops its record and its metrics.
    ///
    /// # Returns
    /// `true` if the node was registered.
    pub fn remove_node(&self, node_id: &str) -> bool {
        if let Some((_, handler)) = self.streams.remove(node_id) {
            handler.close();
        }
        match self.registry.remove_node(node_id) {
            Some(node) => {
                self.metrics.remove_node_metrics(node_id, node.hostname());
                true
            }
            None => false,
        }
    }

    /// Closes every open stream.
    pub fn close_all_streams(&self) {
        for entry in self.streams.iter() {
            entry.value().close();
        }
        self.streams.clear();
    }

    // ========================================
    // Call Bodies
    // ========================================

    fn register(&self, request: RegisterNodeRequest) -> RegisterNodeResponse {
        if self.auth.validate_bootstrap_token(&request.bootstrap_token).is_err() {
            return register_rejected("Invalid bootstrap token");
        }

        let certificate = match self.auth.sign_csr(&request.csr) {
            Ok(certificate) => certificate,
            Err(e) => return register_rejected(format!("Failed to sign CSR: {e}")),
        };

        let node_id = self.registry.generate_node_id();
        let token = match self.auth.generate_auth_token(node_id.as_str()) {
            Ok((token, _)) => token,
            Err(e) => {
                warn!(node_id = %node_id, error = %e, "Token issuing failed during registration");
                return register_rejected("Failed to generate auth token");
            }
        };

        self.registry
            .register_node(node_id.clone(), request.basic_info.unwrap_or_default());

        RegisterNodeResponse {
            success: true,
            message: "Node registered successfully".to_string(),
            signed_certificate: certificate.into_bytes(),
            node_id: node_id.into_inner(),
            initial_auth_token: token,
            control_plane_info: Some(self.control_plane_info.clone()),
        }
    }

    fn authenticate_node(
        &self,
        request: AuthenticationRequest,
    ) -> std::result::Result<AuthenticationResponse, Status> {
        let node_id = request.node_id.as_str();

        if self.auth.validate_auth_token(node_id, &request.auth_token).is_err() {
            return Ok(auth_rejected("Invalid auth token"));
        }

        if self.auth.validate_certificate(&request.certificate).is_err() {
            return Ok(auth_rejected("Invalid certificate"));
        }

        let session_id = match self.registry.create_session(node_id) {
            Ok(session_id) => session_id,
            Err(e @ ServerError::NodeNotFound { .. }) => {
                return Ok(auth_rejected(format!("Failed to create session: {e}")));
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = self.registry.update_node_info(
            node_id,
            request.basic_info.unwrap_or_default(),
            request.capabilities.unwrap_or_default(),
        ) {
            return Ok(auth_rejected(format!("Failed to update node info: {e}")));
        }

        info!(node_id = %node_id, session_id = %session_id, "Node authenticated");
        Ok(AuthenticationResponse {
            success: true,
            message: "Authentication successful".to_string(),
            session_id: session_id.into_inner(),
            token_expiry: self.auth.token_expiry(),
            initial_config: Some(self.registry.node_configuration(node_id)),
        })
    }

    fn rotate(&self, request: &TokenRotationRequest) -> Result<TokenRotationResponse> {
        self.auth
            .validate_auth_token(&request.node_id, &request.current_token)?;
        self.registry
            .validate_session(&request.node_id, &request.session_id)?;

        let (new_token, expiry) = self
            .auth
            .rotate_token(&request.node_id, &request.current_token)?;
        Ok(TokenRotationResponse { new_token, expiry })
    }

    fn open_stream(&self, node_id: NodeId, inbound: Streaming<NodeStatusUpdate>) -> CommandStream {
        let handler = Arc::new(StreamHandler::new(
            node_id.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.metrics),
            self.limits.queue_capacity,
            self.limits.send_timeout,
        ));

        if self
            .streams
            .insert(node_id.clone(), Arc::clone(&handler))
            .is_some()
        {
            warn!(node_id = %node_id, "Node opened a second stream, older one stays open until it ends");
        }

        let (tx, rx) = mpsc::channel(RESPONSE_BUFFER);
        let streams = Arc::clone(&self.streams);
        let log = CallLog::start(STREAM_CONNECTION_METHOD);

        tokio::spawn(async move {
            let result = handler.handle_stream(inbound, tx.clone()).await;

            streams.remove_if(&node_id, |_, current| Arc::ptr_eq(current, &handler));

            let result = match result {
                Ok(()) => Ok(()),
                Err(ServerError::Transport(e)) if e.is_disconnect() => {
                    debug!(node_id = %node_id, "Node disconnected");
                    Ok(())
                }
                Err(e) => {
                    let status = Status::from(e);
                    // Best effort: a node that stopped reading never sees it
                    let _ = tx.try_send(Err(status.clone()));
                    Err(status)
                }
            };
            let _ = log.finish(result);
        });

        Box::pin(ReceiverStream::new(rx))
    }
}

impl std::fmt::Debug for ControlPlaneService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlPlaneService")
            .field("registry", &self.registry)
            .field("limits", &self.limits)
            .field("streams", &self.streams.len())
            .finish_non_exhaustive()
    }
}

fn register_rejected(message: impl Into<String>) -> RegisterNodeResponse {
    RegisterNodeResponse {
        success: false,
        message: message.into(),
        ..Default::default()
    }
}

fn auth_rejected(message: impl Into<String>) -> AuthenticationResponse {
    AuthenticationResponse {
        success: false,
        message: message.into(),
        ..Default::default()
    }
}

// ============================================
// NodeService
// ============================================

#[tonic::async_trait]
impl NodeService for ControlPlaneService {
    type StreamConnectionStream = CommandStream;

    async fn register_node(
        &self,
        request: Request<RegisterNodeRequest>,
    ) -> std::result::Result<Response<RegisterNodeResponse>, Status> {
        let log = CallLog::start(REGISTER_NODE_METHOD);
        let result = self
            .gate
            .check(REGISTER_NODE_METHOD, request.metadata())
            .map(|_| Response::new(self.register(request.into_inner())));
        log.finish(result)
    }

    async fn authenticate(
        &self,
        request: Request<AuthenticationRequest>,
    ) -> std::result::Result<Response<AuthenticationResponse>, Status> {
        let log = CallLog::start(AUTHENTICATE_METHOD);
        let result = self
            .gate
            .require(AUTHENTICATE_METHOD, request.metadata())
            .and_then(|_| self.authenticate_node(request.into_inner()))
            .map(Response::new);
        log.finish(result)
    }

    async fn stream_connection(
        &self,
        request: Request<Streaming<NodeStatusUpdate>>,
    ) -> std::result::Result<Response<Self::StreamConnectionStream>, Status> {
        let node_id = match self.gate.require(STREAM_CONNECTION_METHOD, request.metadata()) {
            Ok(node_id) => node_id,
            Err(status) => return CallLog::start(STREAM_CONNECTION_METHOD).finish(Err(status)),
        };

        let stream = self.open_stream(node_id, request.into_inner());
        Ok(Response::new(stream))
    }

    async fn rotate_token(
        &self,
        request: Request<TokenRotationRequest>,
    ) -> std::result::Result<Response<TokenRotationResponse>, Status> {
        let log = CallLog::start(ROTATE_TOKEN_METHOD);
        let result = self
            .gate
            .require(ROTATE_TOKEN_METHOD, request.metadata())
            .and_then(|_| self.rotate(request.get_ref()).map_err(Status::from))
            .map(Response::new);
        log.finish(result)
    }
}

// ============================================
// Tests
// ============================================
