// ============================================
// File: crates/luminous-transport/src/tls.rs
// ============================================
//! # Server TLS Material
//!
//! ## Creation Reason
//! The gRPC listener only serves over TLS. This module reads the server
//! certificate chain and key from disk, checks that the PEM actually
//! contains what it should, and turns it into a tonic `ServerTlsConfig`.
//! It also reads the CA certificate that is advertised to nodes in
//! `ControlPlaneInfo`.
//!
//! ## Main Functionality
//! - `TlsMaterial::load`: read and sanity-check the three PEM files
//! - `TlsMaterial::server_config`: build the tonic TLS config
//!
//! ## ⚠️ Important Note for Next Developer
//! - Client certificates are NOT required at the TLS layer: a node has
//!   no certificate until `RegisterNode` returns one. Node certificates
//!   are validated in `Authenticate` instead.
//!
//! ## Last Modified
//! v0.1.0 - Initial TLS loading

use std::fs;
use std::path::Path;

use tonic::transport::{Identity, ServerTlsConfig};
use tracing::{debug, info};

use crate::error::{Result, TransportError};

// ============================================
// TlsMaterial
// ============================================

/// PEM material for the gRPC listener.
#[derive(Clone)]
pub struct TlsMaterial {
    cert_pem: Vec<u8>,
    key_pem: Vec<u8>,
    ca_pem: Vec<u8>,
}

impl TlsMaterial {
    /// Reads the server certificate chain, its key and the advertised CA.
    ///
    /// # Errors
    /// Returns `TlsMaterial` if a file is unreadable or holds no usable PEM.
    pub fn load(cert_file: &Path, key_file: &Path, ca_cert: &Path) -> Result<Self> {
        let cert_pem = read(cert_file)?;
        let cert_count = count_certificates(cert_file, &cert_pem)?;

        let key_pem = read(key_file)?;
        let has_key = rustls_pemfile::private_key(&mut key_pem.as_slice())
            .map_err(|e| TransportError::tls_material(key_file, e.to_string()))?
            .is_some();
        if !has_key {
            return Err(TransportError::tls_material(key_file, "no private key found"));
        }

        let ca_pem = read(ca_cert)?;
        count_certificates(ca_cert, &ca_pem)?;

        info!(
            cert_file = %cert_file.display(),
            chain_length = cert_count,
            "TLS material loaded"
        );

        Ok(Self {
            cert_pem,
            key_pem,
            ca_pem,
        })
    }

    /// Builds the tonic listener configuration.
    #[must_use]
    pub fn server_config(&self) -> ServerTlsConfig {
        ServerTlsConfig::new().identity(Identity::from_pem(&self.cert_pem, &self.key_pem))
    }

    /// Returns the CA certificate PEM handed to nodes.
    #[must_use]
    pub fn ca_certificate(&self) -> &[u8] {
        &self.ca_pem
    }
}

impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("cert_pem_len", &self.cert_pem.len())
            .field("key_pem", &"<redacted>")
            .field("ca_pem_len", &self.ca_pem.len())
            .finish()
    }
}

// ============================================
// Helpers
// ============================================

fn read(path: &Path) -> Result<Vec<u8>> {
    debug!(path = %path.display(), "Reading TLS material");
    fs::read(path).map_err(|e| TransportError::tls_material(path, e.to_string()))
}

fn count_certificates(path: &Path, pem: &[u8]) -> Result<usize> {
    let certs = rustls_pemfile::certs(&mut &pem[..])
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| TransportError::tls_material(path, e.to_string()))?;

    if certs.is_empty() {
        return Err(TransportError::tls_material(path, "no certificates found"));
    }
    Ok(certs.len())
}

// ============================================
// Tests
// ============================================
