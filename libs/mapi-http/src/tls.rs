//! TLS setup: crypto provider selection and a cached OS root store.

use crate::error::HttpError;
use rustls_pki_types::CertificateDer;
use std::sync::{Arc, OnceLock};

static NATIVE_ROOTS: OnceLock<Vec<CertificateDer<'static>>> = OnceLock::new();

fn load_native_roots() -> Vec<CertificateDer<'static>> {
    let result = rustls_native_certs::load_native_certs();
    for err in &result.errors {
        tracing::warn!(error = %err, "error loading native root certificate");
    }
    tracing::debug!(count = result.certs.len(), "loaded native root certificates");
    result.certs
}

/// OS root certificates, loaded once per process.
pub(crate) fn native_root_certs() -> &'static [CertificateDer<'static>] {
    NATIVE_ROOTS.get_or_init(load_native_roots).as_slice()
}

/// Use the process-wide default provider when one is installed, else aws-lc-rs.
pub(crate) fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

/// Client config trusting the OS root store.
///
/// # Errors
/// Returns `HttpError::Tls` when the OS store yields no usable certificate.
pub(crate) fn native_roots_client_config() -> Result<rustls::ClientConfig, HttpError> {
    let certs = native_root_certs();
    let mut root_store = rustls::RootCertStore::empty();
    let (added, ignored) = root_store.add_parsable_certificates(certs.iter().cloned());

    if added == 0 {
        return Err(HttpError::Tls(
            format!(
                "no usable native root CA certificates (found {}, {ignored} unparsable)",
                certs.len()
            )
            .into(),
        ));
    }
    if ignored > 0 {
        tracing::warn!(added, ignored, "some native root certificates could not be parsed");
    }

    let config = rustls::ClientConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| HttpError::Tls(Box::new(e)))?
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(config)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn native_roots_are_loaded_once() {
        let first = native_root_certs();
        let second = native_root_certs();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn native_config_never_panics() {
        // Minimal containers may have no OS roots; both outcomes are valid.
        match native_roots_client_config() {
            Ok(_) => {}
            Err(err) => assert!(matches!(err, HttpError::Tls(_))),
        }
    }
}
