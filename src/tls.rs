//! rustls configuration for the API client and the certificate presentation
//! service.
use std::fs;
use std::path::Path;
use std::sync::Arc;

use rustls::crypto::ring;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore, ServerConfig};

use crate::Result;

/// Certificates the API client trusts, in addition to nothing else.
///
/// An empty set means "use the platform/webpki defaults of the HTTP client".
/// Shared read-only once loaded.
#[derive(Clone, Debug, Default)]
pub struct TrustAnchors {
    certs: Arc<Vec<CertificateDer<'static>>>,
}

impl TrustAnchors {
    /// Read all certificates of a PEM file, e.g. the `pebble.minica.pem` of a
    /// local test CA.
    pub fn from_pem_file<P: AsRef<Path>>(path: P) -> Result<TrustAnchors> {
        let pem = fs::read(path.as_ref())?;
        let anchors = Self::from_pem(&pem)?;
        debug!(
            "Loaded {} trust anchor(s) from {}",
            anchors.len(),
            path.as_ref().display()
        );
        Ok(anchors)
    }

    pub fn from_pem(pem: &[u8]) -> Result<TrustAnchors> {
        let certs = rustls_pemfile::certs(&mut &pem[..]).collect::<std::io::Result<Vec<_>>>()?;
        if certs.is_empty() {
            return Err("No certificate found in trust anchor PEM".into());
        }
        Ok(TrustAnchors {
            certs: Arc::new(certs),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub(crate) fn client_config(&self) -> Result<Option<Arc<ClientConfig>>> {
        if self.is_empty() {
            return Ok(None);
        }
        let mut roots = RootCertStore::empty();
        for cert in self.certs.iter() {
            roots.add(cert.clone())?;
        }
        let config = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth();
        Ok(Some(Arc::new(config)))
    }
}

/// Server config presenting `chain_pem` with `key_pem`.
pub(crate) fn server_config(chain_pem: &str, key_pem: &str) -> Result<Arc<ServerConfig>> {
    let chain = rustls_pemfile::certs(&mut chain_pem.as_bytes())
        .collect::<std::io::Result<Vec<CertificateDer<'static>>>>()?;
    if chain.is_empty() {
        return Err("No certificate in chain PEM".into());
    }
    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut key_pem.as_bytes())?
        .ok_or("No private key in key PEM")?;
    let config = ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(chain, key)?;
    Ok(Arc::new(config))
}
