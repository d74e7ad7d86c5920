// ============================================
// File: crates/luminous-core/src/crypto/token.rs
// ============================================
//! # Bearer Tokens
//!
//! ## Creation Reason
//! Nodes prove their identity on every call with a short-lived bearer
//! token. `TokenCodec` mints and verifies those tokens.
//!
//! ## Main Functionality
//! - `TokenCodec::issue`: HS256 JWT with `node_id`, `iat`, `exp`, `jti`
//! - `TokenCodec::verify`: Signature, algorithm, expiry and identity check
//!
//! ## Token Layout
//! ```text
//! header  { "alg": "HS256", "typ": "JWT" }
//! claims  { "node_id": "...", "iat": 1700000000, "exp": 1700086400, "jti": "uuid" }
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Only HS256 is accepted; any other `alg` header is rejected outright
//! - No expiry leeway: a token is dead the second after `exp`
//! - `jti` makes every issued token unique, even within the same second
//!
//! ## Last Modified
//! v0.1.0 - Initial token codec

use std::fmt;
use std::time::Duration;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroizing;

use luminous_common::time::{unix_after, unix_now};

use crate::error::{CoreError, Result};

/// Claims carried by every bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Node the token was issued to.
    pub node_id: String,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds.
    pub exp: i64,
    /// Unique token id.
    pub jti: String,
}

/// A freshly minted token.
#[derive(Clone)]
pub struct IssuedToken {
    /// Encoded JWT.
    pub token: String,
    /// Expiry, Unix seconds.
    pub expiry: i64,
    /// Unique token id (the `jti` claim).
    pub jti: String,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"<redacted>")
            .field("expiry", &self.expiry)
            .field("jti", &self.jti)
            .finish()
    }
}

/// Mints and verifies HS256 bearer tokens.
pub struct TokenCodec {
    secret: Zeroizing<Vec<u8>>,
    lifetime: Duration,
    validation: Validation,
}

impl TokenCodec {
    /// Creates a codec with the shared signing secret and token lifetime.
    #[must_use]
    pub fn new(secret: impl AsRef<[u8]>, lifetime: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat"]);

        Self {
            secret: Zeroizing::new(secret.as_ref().to_vec()),
            lifetime,
            validation,
        }
    }

    /// Returns the configured token lifetime.
    #[must_use]
    pub const fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Returns the expiry a token minted right now would carry.
    #[must_use]
    pub fn next_expiry(&self) -> i64 {
        unix_after(self.lifetime)
    }

    /// Issues a token for `node_id`.
    ///
    /// # Errors
    /// Returns `TokenSigning` if no secret is configured or encoding fails.
    pub fn issue(&self, node_id: &str) -> Result<IssuedToken> {
        if self.secret.is_empty() {
            return Err(CoreError::token_signing("token secret is not configured"));
        }

        let claims = TokenClaims {
            node_id: node_id.to_string(),
            iat: unix_now(),
            exp: self.next_expiry(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|e| CoreError::token_signing(e.to_string()))?;

        Ok(IssuedToken {
            token,
            expiry: claims.exp,
            jti: claims.jti,
        })
    }

    /// Verifies `token` and checks it was issued to `node_id`.
    ///
    /// # Errors
    /// - `TokenExpired` if `exp` has passed
    /// - `InvalidToken` on bad signature, wrong algorithm or malformed token
    /// - `NodeMismatch` if the `node_id` claim differs from `node_id`
    pub fn verify(&self, node_id: &str, token: &str) -> Result<TokenClaims> {
        if self.secret.is_empty() {
            return Err(CoreError::invalid_token("token secret is not configured"));
        }

        let data = decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &self.validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => CoreError::TokenExpired,
            _ => CoreError::invalid_token(e.to_string()),
        })?;

        if data.claims.node_id != node_id {
            return Err(CoreError::NodeMismatch);
        }

        Ok(data.claims)
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("secret", &"<redacted>")
            .field("lifetime", &self.lifetime)
            .finish()
    }
}
