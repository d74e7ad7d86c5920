// ============================================
// File: crates/luminous-core/src/crypto/ca.rs
// ============================================
//! # Certificate Authority
//!
//! ## Creation Reason
//! Every node certificate is issued by, and must chain back to, a single
//! control-plane CA. This module owns that CA for the process lifetime.
//!
//! ## Main Functionality
//! - `load_ca`: Read PEM certificate + private key from disk (one shot)
//! - `generate_serial_number`: 128-bit random serial for issued certificates
//! - `CertificateAuthority::sign_request`: Verify a CSR and issue a leaf
//! - `CertificateAuthority::validate_certificate`: Chain + validity check
//!
//! ## Issued Certificate Profile
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ Serial        random u128, never zero                │
//! │ Subject       copied from CSR                        │
//! │ Public key    copied from CSR                        │
//! │ Validity      now .. now + 365 days                  │
//! │ Key usage     digitalSignature, keyEncipherment      │
//! │ Ext key usage clientAuth                             │
//! │ Issuer        control-plane CA                       │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Private keys are tried as PKCS#8 first, then PKCS#1 (RSA)
//! - The CSR self-signature is verified BEFORE anything is signed
//! - No serial registry is kept; collisions at 128 bits are ignored
//!
//! ## Last Modified
//! v0.1.0 - Initial CA adapter

use std::fmt;
use std::path::Path;

use rand::Rng;
use rcgen::{
    Certificate, CertificateParams, CertificateSigningRequestParams, ExtendedKeyUsagePurpose,
    IsCa, KeyPair, KeyUsagePurpose, SerialNumber,
};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::EncodePrivateKey;
use rustls_pki_types::CertificateSigningRequestDer;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tracing::{debug, info};
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::{FromDer, X509Certificate, X509CertificationRequest};

use luminous_common::time::unix_now;

use crate::crypto::NODE_CERT_VALIDITY_SECS;
use crate::error::{CoreError, Result};

// ============================================
// Serial Numbers
// ============================================

/// Generates a random, non-zero, non-negative certificate serial.
///
/// Carries 128 bits of entropy; DER encoding adds a leading zero octet
/// whenever the top bit is set so the serial stays positive.
#[must_use]
pub fn generate_serial_number() -> u128 {
    let mut rng = rand::thread_rng();
    loop {
        let serial: u128 = rng.gen();
        if serial != 0 {
            return serial;
        }
    }
}

// ============================================
// Loading
// ============================================

/// Loads the CA certificate and private key from PEM files.
///
/// # Errors
/// Returns `CaMaterial` if either file is unreadable or malformed, or if
/// the key does not belong to the certificate.
pub fn load_ca(cert_path: impl AsRef<Path>, key_path: impl AsRef<Path>) -> Result<CertificateAuthority> {
    let cert_path = cert_path.as_ref();
    let key_path = key_path.as_ref();

    let cert_pem = std::fs::read_to_string(cert_path)
        .map_err(|e| CoreError::ca_material(cert_path.display().to_string(), e.to_string()))?;
    let key_pem = std::fs::read_to_string(key_path)
        .map_err(|e| CoreError::ca_material(key_path.display().to_string(), e.to_string()))?;

    let ca = CertificateAuthority::from_pem(&cert_pem, &key_pem)?;

    info!(
        subject = %ca.subject,
        cert = %cert_path.display(),
        "CA material loaded"
    );

    Ok(ca)
}

/// Decodes the first private key in `pem`, PKCS#8 first then PKCS#1.
fn parse_private_key(pem: &str) -> Result<KeyPair> {
    let mut reader = pem.as_bytes();
    if let Some(item) = rustls_pemfile::pkcs8_private_keys(&mut reader).next() {
        let pkcs8 = item.map_err(|e| CoreError::ca_material("ca key", e.to_string()))?;
        return KeyPair::try_from(pkcs8.secret_pkcs8_der())
            .map_err(|e| CoreError::ca_material("ca key", format!("unusable PKCS#8 key: {e}")));
    }

    let mut reader = pem.as_bytes();
    if let Some(item) = rustls_pemfile::rsa_private_keys(&mut reader).next() {
        let pkcs1 = item.map_err(|e| CoreError::ca_material("ca key", e.to_string()))?;
        let rsa_key = rsa::RsaPrivateKey::from_pkcs1_der(pkcs1.secret_pkcs1_der())
            .map_err(|e| CoreError::ca_material("ca key", format!("bad PKCS#1 key: {e}")))?;
        let pkcs8 = rsa_key
            .to_pkcs8_der()
            .map_err(|e| CoreError::ca_material("ca key", format!("PKCS#1 conversion: {e}")))?;
        return KeyPair::try_from(pkcs8.as_bytes())
            .map_err(|e| CoreError::ca_material("ca key", format!("unusable PKCS#1 key: {e}")));
    }

    Err(CoreError::ca_material(
        "ca key",
        "no PKCS#8 or PKCS#1 private key found",
    ))
}

// ============================================
// CertificateInfo
// ============================================

/// Summary of a certificate that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// Subject distinguished name (RFC 4514 form).
    pub subject: String,
    /// Serial number, lowercase hex.
    pub serial: String,
    /// Start of validity, Unix seconds.
    pub not_before: i64,
    /// End of validity, Unix seconds.
    pub not_after: i64,
    /// SHA-256 of the DER encoding, lowercase hex.
    pub fingerprint: String,
}

// ============================================
// CertificateAuthority
// ============================================

/// The control-plane certificate authority.
///
/// Immutable once constructed; share it behind an `Arc`.
pub struct CertificateAuthority {
    /// CA certificate as loaded (PEM).
    cert_pem: String,
    /// CA certificate DER, used as trust anchor for validation.
    cert_der: Vec<u8>,
    /// Subject DN of the CA, for logs.
    subject: String,
    /// Issuer handle rebuilt from the CA certificate for rcgen.
    issuer: Certificate,
    /// CA signing key.
    key: KeyPair,
}

impl CertificateAuthority {
    /// Builds a CA from PEM text.
    ///
    /// # Errors
    /// Returns `CaMaterial` if the certificate or key cannot be decoded or
    /// the key does not match the certificate's public key.
    pub fn from_pem(cert_pem: &str, key_pem: &str) -> Result<Self> {
        let mut reader = cert_pem.as_bytes();
        let cert_der = rustls_pemfile::certs(&mut reader)
            .next()
            .ok_or_else(|| CoreError::ca_material("ca certificate", "no certificate found"))?
            .map_err(|e| CoreError::ca_material("ca certificate", e.to_string()))?
            .to_vec();

        let (_, parsed) = X509Certificate::from_der(&cert_der)
            .map_err(|e| CoreError::ca_material("ca certificate", e.to_string()))?;
        let subject = parsed.subject().to_string();

        let key = parse_private_key(key_pem)?;
        if parsed.public_key().subject_public_key.data.as_ref() != key.public_key_raw() {
            return Err(CoreError::ca_material(
                "ca key",
                "private key does not match CA certificate",
            ));
        }

        let issuer = CertificateParams::from_ca_cert_pem(cert_pem)
            .and_then(|params| params.self_signed(&key))
            .map_err(|e| CoreError::ca_material("ca certificate", e.to_string()))?;

        Ok(Self {
            cert_pem: cert_pem.to_string(),
            cert_der,
            subject,
            issuer,
            key,
        })
    }

    /// Returns the CA certificate in PEM form.
    #[must_use]
    pub fn certificate_pem(&self) -> &str {
        &self.cert_pem
    }

    /// Returns the CA subject DN.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Verifies a CSR's proof of possession and issues a node certificate.
    ///
    /// `csr` may be DER or PEM (`CERTIFICATE REQUEST`).
    ///
    /// # Returns
    /// The PEM-encoded leaf certificate.
    ///
    /// # Errors
    /// - `InvalidCsr` if the request is malformed or its signature does not verify
    /// - `CaSigning` if building or signing the certificate fails
    pub fn sign_request(&self, csr: &[u8]) -> Result<String> {
        let der = csr_to_der(csr)?;

        let (_, request) = X509CertificationRequest::from_der(&der)
            .map_err(|e| CoreError::invalid_csr(format!("failed to parse CSR: {e}")))?;
        request
            .verify_signature()
            .map_err(|e| CoreError::invalid_csr(format!("invalid CSR signature: {e}")))?;
        let subject = request.certification_request_info.subject.to_string();

        let mut request_params =
            CertificateSigningRequestParams::from_der(&CertificateSigningRequestDer::from(der))
                .map_err(|e| CoreError::invalid_csr(e.to_string()))?;

        let serial = generate_serial_number();
        let now = unix_now();
        let params = &mut request_params.params;
        params.serial_number = Some(SerialNumber::from_slice(&serial.to_be_bytes()));
        params.not_before = OffsetDateTime::from_unix_timestamp(now)
            .map_err(|e| CoreError::ca_signing(format!("invalid not_before: {e}")))?;
        params.not_after = OffsetDateTime::from_unix_timestamp(now + NODE_CERT_VALIDITY_SECS)
            .map_err(|e| CoreError::ca_signing(format!("invalid not_after: {e}")))?;
        params.is_ca = IsCa::NoCa;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];

        let cert = request_params
            .signed_by(&self.issuer, &self.key)
            .map_err(|e| CoreError::ca_signing(e.to_string()))?;

        info!(
            subject = %subject,
            serial = %format!("{serial:032x}"),
            fingerprint = %short_fingerprint(cert.der()),
            "Issued node certificate"
        );

        Ok(cert.pem())
    }

    /// Validates a PEM certificate against this CA and the current time.
    ///
    /// # Errors
    /// - `InvalidCertificate` if the PEM or DER cannot be decoded
    /// - `UntrustedCertificate` if it is not signed by this CA
    /// - `CertificateNotYetValid` / `CertificateExpired` outside its window
    pub fn validate_certificate(&self, pem: &[u8]) -> Result<CertificateInfo> {
        let (_, block) = parse_x509_pem(pem)
            .map_err(|e| CoreError::invalid_certificate(format!("failed to decode PEM: {e}")))?;
        let cert = block
            .parse_x509()
            .map_err(|e| CoreError::invalid_certificate(e.to_string()))?;

        let (_, anchor) = X509Certificate::from_der(&self.cert_der)
            .map_err(|e| CoreError::ca_material("ca certificate", e.to_string()))?;

        cert.verify_signature(Some(anchor.public_key()))
            .map_err(|e| {
                debug!(error = %e, "Certificate signature check failed");
                CoreError::UntrustedCertificate
            })?;

        let now = unix_now();
        let not_before = cert.validity().not_before.timestamp();
        let not_after = cert.validity().not_after.timestamp();
        if now < not_before {
            return Err(CoreError::CertificateNotYetValid { not_before });
        }
        if now > not_after {
            return Err(CoreError::CertificateExpired { not_after });
        }

        Ok(CertificateInfo {
            subject: cert.subject().to_string(),
            serial: hex::encode(cert.raw_serial()),
            not_before,
            not_after,
            fingerprint: hex::encode(Sha256::digest(&block.contents)),
        })
    }
}

impl fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("subject", &self.subject)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Accepts a CSR as DER or PEM and returns DER.
fn csr_to_der(csr: &[u8]) -> Result<Vec<u8>> {
    if csr.is_empty() {
        return Err(CoreError::invalid_csr("empty CSR"));
    }
    if !csr.starts_with(b"-----BEGIN") {
        return Ok(csr.to_vec());
    }

    let (_, block) = parse_x509_pem(csr)
        .map_err(|e| CoreError::invalid_csr(format!("failed to decode PEM: {e}")))?;
    if block.label != "CERTIFICATE REQUEST" && block.label != "NEW CERTIFICATE REQUEST" {
        return Err(CoreError::invalid_csr(format!(
            "unexpected PEM label '{}'",
            block.label
        )));
    }
    Ok(block.contents)
}

/// First 16 hex chars of the SHA-256 fingerprint, for logs.
fn short_fingerprint(der: &[u8]) -> String {
    let mut digest = hex::encode(Sha256::digest(der));
    digest.truncate(16);
    digest
}

// ============================================
// Tests
// ============================================
