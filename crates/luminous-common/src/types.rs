// ============================================
// File: crates/luminous-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Creation Reason
//! Node and session identifiers cross every layer (wire messages, call
//! metadata, registry keys, token claims, log fields). Wrapping them keeps
//! the two from being swapped at a call site.
//!
//! ## Main Functionality
//! - `NodeId`: Identity of a registered node
//! - `SessionId`: Lease identifier inside a node's session map
//!
//! ## ⚠️ Important Note for Next Developer
//! - Both are generated from UUIDv4 (122 random bits)
//! - Both implement `Borrow<str>` so maps keyed by them accept `&str` lookups;
//!   `Hash`/`Eq` must stay consistent with the inner `String`
//! - Inbound ids are client-supplied text: `parse` only rejects blanks,
//!   existence is decided by the registry
//!
//! ## Last Modified
//! v0.1.0 - Initial identifier types

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CommonError;

// ============================================
// NodeId
// ============================================

/// Globally unique identity of a node.
///
/// Assigned by the control plane on successful registration and asserted by
/// the node on every later call through the `node-id` metadata header.
///
/// # Example
/// ```
/// use luminous_common::types::NodeId;
///
/// let id = NodeId::generate();
/// let parsed: NodeId = id.to_string().parse().unwrap();
/// assert_eq!(id, parsed);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Generates a fresh random node id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps a client-supplied id.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the value is empty or only whitespace.
    pub fn parse(value: impl Into<String>) -> Result<Self, CommonError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(CommonError::invalid_input("node_id", "cannot be empty"));
        }
        Ok(Self(value))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the id and returns the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodeId {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================
// SessionId
// ============================================

/// Identifier of one session lease held by a node.
///
/// A node may hold several at once; each is created by a successful
/// `Authenticate` call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a fresh random session id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps a client-supplied id.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the value is empty or only whitespace.
    pub fn parse(value: impl Into<String>) -> Result<Self, CommonError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(CommonError::invalid_input("session_id", "cannot be empty"));
        }
        Ok(Self(value))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the id and returns the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = NodeId::generate();
        let b = NodeId::generate();
        assert_ne!(a, b);

        let s1 = SessionId::generate();
        let s2 = SessionId::generate();
        assert_ne!(s1, s2);
    }

    #[test]
    fn test_parse_rejects_blank() {
        assert!(NodeId::parse("").is_err());
        assert!(NodeId::parse("   ").is_err());
        assert!(SessionId::parse("").is_err());
        assert_eq!(NodeId::parse("node-1").unwrap().as_str(), "node-1");
    }

    #[test]
    fn test_borrowed_lookup() {
        let id = NodeId::generate();
        let mut map = HashMap::new();
        map.insert(id.clone(), 7);

        assert_eq!(map.get(id.as_str()), Some(&7));
    }
}
