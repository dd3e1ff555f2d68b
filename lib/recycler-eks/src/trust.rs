//! Cluster CA trust material
//!
//! The CA bundle is validated and written to a uniquely named, owner-only
//! temporary file. The file is removed when the `TrustMaterial` is dropped.

use crate::{EksError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rustls::pki_types::CertificateDer;
use rustls::crypto::ring;
use rustls::RootCertStore;
use rustls_pemfile::certs;
use std::io::{BufReader, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

const PEM_MARKER: &[u8] = b"-----BEGIN";

/// Make `ring` the process-wide rustls provider.
///
/// The AWS SDK enables a second backend, so rustls cannot pick one on its
/// own. Safe to call repeatedly; a provider that is already installed wins.
pub fn install_crypto_provider() {
    if ring::default_provider().install_default().is_ok() {
        debug!("Installed ring as the rustls crypto provider");
    }
}

/// Validated CA bundle placed in a scoped file
#[derive(Debug)]
pub struct TrustMaterial {
    file: NamedTempFile,
    certificates: usize,
}

impl TrustMaterial {
    /// Validate CA data (PEM or base64-encoded PEM) and write it out
    pub fn from_cluster_ca(ca_data: &[u8]) -> Result<Self> {
        let pem = decode_ca(ca_data)?;
        let certificates = load_certificates(&pem)?;

        let mut roots = RootCertStore::empty();
        for cert in &certificates {
            roots.add(cert.clone()).map_err(|e| {
                EksError::Configuration(format!("Invalid cluster CA certificate: {}", e))
            })?;
        }

        let mut file = tempfile::Builder::new()
            .prefix("eks-ca-")
            .suffix(".crt")
            .tempfile()
            .map_err(|e| EksError::Configuration(format!("Failed to create CA file: {}", e)))?;
        file.write_all(&pem)
            .and_then(|_| file.flush())
            .map_err(|e| EksError::Configuration(format!("Failed to write CA certificate: {}", e)))?;

        debug!(
            "Wrote {} CA certificate(s) to {}",
            certificates.len(),
            file.path().display()
        );
        Ok(Self {
            file,
            certificates: certificates.len(),
        })
    }

    /// Location handed to the transport as its trusted root bundle
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn certificate_count(&self) -> usize {
        self.certificates
    }
}

fn decode_ca(ca_data: &[u8]) -> Result<Vec<u8>> {
    let trimmed = ca_data.trim_ascii();
    if trimmed.starts_with(PEM_MARKER) {
        return Ok(trimmed.to_vec());
    }

    let compact: Vec<u8> = trimmed
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(compact)
        .map_err(|e| EksError::Configuration(format!("Cluster CA data is not valid base64: {}", e)))
}

/// Load certificates from PEM-encoded data
pub fn load_certificates(pem_data: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = BufReader::new(pem_data);
    let certificates = certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| EksError::Configuration(format!("Failed to parse certificates: {}", e)))?;

    if certificates.is_empty() {
        return Err(EksError::Configuration(
            "No certificates found in cluster CA data".to_string(),
        ));
    }
    Ok(certificates)
}
