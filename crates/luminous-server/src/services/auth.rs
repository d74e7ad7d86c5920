// ============================================
// File: crates/luminous-server/src/services/auth.rs
// ============================================
//! # Auth Manager
//!
//! ## Creation Reason
//! Single owner of the node trust decisions: it holds the CA and the
//! token codec, and every "is this caller who it says it is" question
//! goes through it.
//!
//! ## Main Functionality
//! - CSR signing and node certificate validation (via the CA)
//! - Bearer token issuing, validation and rotation
//! - Bootstrap token gate for `RegisterNode`
//! - Caller identity extraction from request metadata
//!
//! ## Token Flow
//! ```text
//! RegisterNode ──► generate_auth_token ──► token₀
//!                                            │
//! every call ────► validate_auth_token ◄─────┤
//!                                            │
//! RotateToken ───► rotate_token(token₀) ──► token₁
//!                   │
//!                   └─ revoke_on_rotate? ── yes ──► jti(token₀) revoked
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The token cache is advisory and write-only from the validation
//!   path's point of view. NEVER consult it to accept a token; validity
//!   always comes from the signature and claims.
//! - The revocation set can only reject, never accept.
//! - `validate_bootstrap_token` is an extension point that only rejects
//!   an empty token. It is not a finished security control.
//!
//! ## Last Modified
//! v0.1.0 - Initial auth manager

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tonic::metadata::MetadataMap;
use tracing::{debug, info, warn};

use luminous_common::time::unix_now;
use luminous_common::NodeId;
use luminous_core::crypto::{load_ca, CertificateAuthority, CertificateInfo, TokenClaims, TokenCodec};
use luminous_core::error::CoreError;
use luminous_core::protocol::NODE_ID_HEADER;

use crate::config::AuthConfig;
use crate::error::{Result, ServerError};

// ============================================
// AuthManager
// ============================================

/// Issues and checks node credentials.
pub struct AuthManager {
    ca: Arc<CertificateAuthority>,
    tokens: TokenCodec,
    /// Last token issued per node. Advisory only.
    token_cache: DashMap<String, String>,
    /// Superseded token ids → their expiry.
    revoked: DashMap<String, i64>,
    revoke_on_rotate: bool,
}

impl AuthManager {
    /// Loads the CA from the configured paths and builds the manager.
    ///
    /// # Errors
    /// Returns `CaMaterial` (fatal) if the CA cannot be loaded.
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let ca = load_ca(&config.ca_cert_path, &config.ca_key_path)?;
        Ok(Self::new(
            Arc::new(ca),
            config.token_secret.as_bytes(),
            config.token_duration(),
            config.revoke_on_rotate,
        ))
    }

    /// Builds the manager around an already loaded CA.
    #[must_use]
    pub fn new(
        ca: Arc<CertificateAuthority>,
        token_secret: &[u8],
        token_lifetime: Duration,
        revoke_on_rotate: bool,
    ) -> Self {
        Self {
            ca,
            tokens: TokenCodec::new(token_secret, token_lifetime),
            token_cache: DashMap::new(),
            revoked: DashMap::new(),
            revoke_on_rotate,
        }
    }

    /// Returns the CA.
    #[must_use]
    pub fn ca(&self) -> &CertificateAuthority {
        &self.ca
    }

    // ========================================
    // Certificates
    // ========================================

    /// Verifies a CSR's proof of possession and issues a client certificate.
    ///
    /// # Errors
    /// - `InvalidCsr` if the request is malformed or its signature is forged
    /// - `CaSigning` if signing fails
    pub fn sign_csr(&self, csr: &[u8]) -> Result<String> {
        self.ca.sign_request(csr).map_err(|e| {
            if e.is_suspicious() {
                warn!(error = %e, "Rejected certificate signing request");
            }
            ServerError::from(e)
        })
    }

    /// Checks a PEM certificate against the CA and the clock.
    ///
    /// # Errors
    /// `InvalidCertificate`, `UntrustedCertificate`, `CertificateExpired`
    /// or `CertificateNotYetValid`.
    pub fn validate_certificate(&self, pem: &[u8]) -> Result<CertificateInfo> {
        self.ca.validate_certificate(pem).map_err(|e| {
            if e.is_suspicious() {
                warn!(error = %e, "Rejected node certificate");
            } else {
                debug!(error = %e, "Node certificate did not validate");
            }
            ServerError::from(e)
        })
    }

    // ========================================
    // Tokens
    // ========================================

    /// Issues a bearer token for `node_id`.
    ///
    /// # Returns
    /// The token and its expiry in Unix seconds.
    ///
    /// # Errors
    /// Returns `TokenSigning` if the secret is unusable.
    pub fn generate_auth_token(&self, node_id: &str) -> Result<(String, i64)> {
        let issued = self.tokens.issue(node_id)?;
        self.token_cache
            .insert(node_id.to_string(), issued.token.clone());

        debug!(node_id = %node_id, expiry = issued.expiry, "Issued auth token");
        Ok((issued.token, issued.expiry))
    }

    /// Verifies `token` and checks it belongs to `node_id`.
    ///
    /// # Errors
    /// `InvalidToken`, `TokenExpired`, `NodeMismatch` or `TokenRevoked`.
    pub fn validate_auth_token(&self, node_id: &str, token: &str) -> Result<()> {
        self.verify(node_id, token).map(|_| ())
    }

    fn verify(&self, node_id: &str, token: &str) -> Result<TokenClaims> {
        let claims = self.tokens.verify(node_id, token).map_err(|e| {
            if e.is_suspicious() {
                warn!(node_id = %node_id, error = %e, "Token rejected");
            }
            ServerError::from(e)
        })?;

        if self.revoked.contains_key(&claims.jti) {
            warn!(node_id = %node_id, "Revoked token presented");
            return Err(CoreError::TokenRevoked.into());
        }

        Ok(claims)
    }

    /// Validates `current_token`, then issues a replacement.
    ///
    /// An invalid current token never produces a new one and leaves the
    /// token cache untouched.
    ///
    /// # Errors
    /// Whatever `validate_auth_token` rejects with, or `TokenSigning`.
    pub fn rotate_token(&self, node_id: &str, current_token: &str) -> Result<(String, i64)> {
        let claims = self.verify(node_id, current_token)?;

        // Claim the superseded jti first; only one rotation may win it
        if self.revoke_on_rotate && self.revoked.insert(claims.jti.clone(), claims.exp).is_some() {
            warn!(node_id = %node_id, "Token already rotated by a concurrent request");
            return Err(CoreError::TokenRevoked.into());
        }

        let (token, expiry) = match self.generate_auth_token(node_id) {
            Ok(issued) => issued,
            Err(e) => {
                if self.revoke_on_rotate {
                    self.revoked.remove(&claims.jti);
                }
                return Err(e);
            }
        };

        info!(
            node_id = %node_id,
            expiry = expiry,
            revoked_previous = self.revoke_on_rotate,
            "Auth token rotated"
        );
        Ok((token, expiry))
    }

    /// Returns the expiry a token minted now would carry.
    #[must_use]
    pub fn token_expiry(&self) -> i64 {
        self.tokens.next_expiry()
    }

    /// Gate for `RegisterNode`; currently only rejects an empty token.
    ///
    /// # Errors
    /// Returns `InvalidToken` for an empty token.
    pub fn validate_bootstrap_token(&self, token: &str) -> Result<()> {
        if token.is_empty() {
            return Err(CoreError::invalid_token("bootstrap token is empty").into());
        }
        Ok(())
    }

    /// Returns the last token issued to `node_id`, if any.
    ///
    /// Advisory only; never use this to decide whether a token is valid.
    #[must_use]
    pub fn cached_token(&self, node_id: &str) -> Option<String> {
        self.token_cache.get(node_id).map(|t| t.value().clone())
    }

    /// Drops revocation entries whose token would have expired anyway.
    ///
    /// # Returns
    /// Number of entries removed.
    pub fn sweep_revocations(&self) -> usize {
        let now = unix_now();
        let before = self.revoked.len();
        self.revoked.retain(|_, exp| *exp > now);
        before - self.revoked.len()
    }

    /// Returns the number of revoked tokens still tracked.
    #[must_use]
    pub fn revoked_count(&self) -> usize {
        self.revoked.len()
    }

    // ========================================
    // Identity
    // ========================================

    /// Extracts the caller's asserted node id from request metadata.
    ///
    /// # Errors
    /// Returns `MissingIdentity` if the `node-id` header is absent or blank.
    pub fn node_id_from_metadata(&self, metadata: &MetadataMap) -> Result<NodeId> {
        metadata
            .get(NODE_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| NodeId::parse(value).ok())
            .ok_or(ServerError::MissingIdentity)
    }
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("ca", &self.ca.subject())
            .field("tokens", &self.tokens)
            .field("cached_tokens", &self.token_cache.len())
            .field("revoked", &self.revoked.len())
            .field("revoke_on_rotate", &self.revoke_on_rotate)
            .finish()
    }
}

// ============================================
// Tests
// ============================================
