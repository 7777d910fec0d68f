//! Detached callback signature verification.
//!
//! Card gateways sign the callback URL they call and append the signature as
//! the last query parameter:
//!
//! ```text
//! https://shop.example/callback?trx_id=..&merch_id=..&signature=<base64>
//! ```
//!
//! The signed message is the raw request URL with the trailing
//! `&signature=...` removed, percent-decoded exactly once. The signature is
//! RSA PKCS#1 v1.5 over SHA-1 with the provider's certificate key. SHA-1 is
//! fixed by the gateway protocol and cannot be negotiated.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use regex::Regex;
use ring::signature::{RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY, UnparsedPublicKey};
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::FromDer;
use x509_parser::public_key::PublicKey;
use x509_parser::x509::SubjectPublicKeyInfo;

use crate::error::Error;
use crate::request::CallbackContext;

/// Query parameter carrying the detached signature.
pub const SIGNATURE_PARAM: &str = "signature";

static TRAILING_SIGNATURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("&signature=.*$").expect("static pattern"));

/// Verifies callback signatures against one provider certificate.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    cert_path: PathBuf,
}

impl SignatureVerifier {
    /// Creates a verifier for the PEM file at `cert_path`.
    ///
    /// The file is read on every [`verify`](Self::verify) call.
    #[must_use]
    pub fn new(cert_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
        }
    }

    /// Configured certificate path.
    #[must_use]
    pub fn cert_path(&self) -> &Path {
        &self.cert_path
    }

    /// Checks that the callback was signed by the provider.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingSignature`] if the `signature` parameter is absent or
    ///   empty. This is checked before the certificate is touched.
    /// - [`Error::CertificateLoad`] if the certificate cannot be read or holds
    ///   no RSA key.
    /// - [`Error::InvalidSignature`] if the signature is not valid base64 or
    ///   does not verify.
    #[cfg_attr(feature = "telemetry", tracing::instrument(skip_all, err(level = "warn"), fields(cert = %self.cert_path.display())))]
    pub fn verify(&self, ctx: &CallbackContext) -> Result<(), Error> {
        let signature = ctx
            .param(SIGNATURE_PARAM)
            .filter(|s| !s.is_empty())
            .ok_or(Error::MissingSignature)?;

        let message = canonical_message(ctx.url());
        let public_key = load_rsa_public_key(&self.cert_path)?;
        let signature = b64
            .decode(signature.trim())
            .map_err(|_| Error::InvalidSignature)?;

        UnparsedPublicKey::new(&RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY, &public_key)
            .verify(&message, &signature)
            .map_err(|_| Error::InvalidSignature)
    }
}

/// Rebuilds the signed message from the raw request URL.
///
/// Only a trailing `&signature=...` component is removed; the remainder is
/// percent-decoded once without treating `+` as a space.
#[must_use]
pub fn canonical_message(raw_url: &str) -> Vec<u8> {
    let unsigned = TRAILING_SIGNATURE.replace(raw_url, "");
    urlencoding::decode_binary(unsigned.as_bytes()).into_owned()
}

/// Reads the DER `RSAPublicKey` out of a PEM certificate or `PUBLIC KEY` block.
fn load_rsa_public_key(path: &Path) -> Result<Vec<u8>, Error> {
    let load_error = |reason: String| Error::CertificateLoad {
        path: path.to_path_buf(),
        reason,
    };

    let data = std::fs::read(path).map_err(|e| load_error(e.to_string()))?;
    let (_, pem) = parse_x509_pem(&data).map_err(|e| load_error(format!("invalid PEM: {e}")))?;

    let key = if pem.label == "PUBLIC KEY" {
        let (_, spki) = SubjectPublicKeyInfo::from_der(&pem.contents)
            .map_err(|e| load_error(format!("invalid public key: {e}")))?;
        rsa_key_bytes(&spki).map_err(load_error)?
    } else {
        let cert = pem
            .parse_x509()
            .map_err(|e| load_error(format!("invalid certificate: {e}")))?;
        rsa_key_bytes(cert.public_key()).map_err(load_error)?
    };

    #[cfg(feature = "telemetry")]
    tracing::trace!(path = %path.display(), "Loaded provider public key");

    Ok(key)
}

fn rsa_key_bytes(spki: &SubjectPublicKeyInfo<'_>) -> Result<Vec<u8>, String> {
    match spki.parsed() {
        Ok(PublicKey::RSA(_)) => Ok(spki.subject_public_key.data.to_vec()),
        Ok(_) => Err("certificate key is not RSA".to_owned()),
        Err(e) => Err(format!("unreadable public key: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNED_URL: &str =
        "https://shop.test/callback?trx_id=ABC123&merch_id=M1&o.order_id=42&o.desc=Test%20order";
    const SIGNATURE: &str = "RtIuyHaducJgve2ISU8hC/MjSGAC1224qtmuq4l7ex++qtaY9BR5EO1oscLK++ZiFphL3BCstYvl7WPPC+PnwjJlIhwoM4X/2m6lXN+TsNx652iy6rT0Gj3T68i7JzGdnuUNTOZInQCzq/X0XpFKJhV1Uimq9t4CedL5ws1a1KcIP+sFuzRq61ma3z0zq8PMwh5+5afW1haQ5guh7PCmgXY2tFjsToX5tVRm3R7ikb8mm6SCLM2poXyqpI3U3d2S3x2NOGJ4RsKoTQ3nT8rnqrl4+tLe2p/i0a6Yma75u7G8H/+QuQ5P7jFNyBFj9KbmeeaCVBRPU5nVBR8kNsxJAQ==";

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    fn signed_ctx(url: &str) -> CallbackContext {
        let full = format!("{url}&signature={}", urlencoding::encode(SIGNATURE));
        CallbackContext::from_url(full).unwrap()
    }

    #[test]
    fn test_canonical_message_strips_trailing_signature() {
        let raw = "https://a.test/cb?x=1&y=Hello%20World&signature=abc%2Bdef%3D";
        assert_eq!(canonical_message(raw), b"https://a.test/cb?x=1&y=Hello World");
    }

    #[test]
    fn test_canonical_message_decodes_once() {
        let raw = "https://a.test/cb?y=%2541&z=a+b&signature=s";
        assert_eq!(canonical_message(raw), b"https://a.test/cb?y=%41&z=a+b");
    }

    #[test]
    fn test_canonical_message_without_signature() {
        let raw = "https://a.test/cb?x=1";
        assert_eq!(canonical_message(raw), raw.as_bytes());
    }

    #[test]
    fn test_valid_signature() {
        let verifier = SignatureVerifier::new(fixture("gateway_cert.pem"));
        verifier.verify(&signed_ctx(SIGNED_URL)).unwrap();
    }

    #[test]
    fn test_valid_signature_with_bare_public_key() {
        let verifier = SignatureVerifier::new(fixture("gateway_pubkey.pem"));
        verifier.verify(&signed_ctx(SIGNED_URL)).unwrap();
    }

    #[test]
    fn test_tampered_url_is_rejected() {
        let verifier = SignatureVerifier::new(fixture("gateway_cert.pem"));
        let tampered = SIGNED_URL.replace("ABC123", "ABC124");
        let err = verifier.verify(&signed_ctx(&tampered)).unwrap_err();
        assert!(matches!(err, Error::InvalidSignature));

        let tampered = SIGNED_URL.replace("merch_id=M1", "merch_id=M2");
        let err = verifier.verify(&signed_ctx(&tampered)).unwrap_err();
        assert!(matches!(err, Error::InvalidSignature));
    }

    #[test]
    fn test_every_character_is_covered() {
        let verifier = SignatureVerifier::new(fixture("gateway_cert.pem"));
        let query_start = SIGNED_URL.find('?').unwrap() + 1;
        for (i, c) in SIGNED_URL.char_indices().skip(query_start).step_by(7) {
            let replacement = if c == 'x' { 'y' } else { 'x' };
            let mut tampered = SIGNED_URL.to_owned();
            tampered.replace_range(i..=i, &replacement.to_string());
            let err = verifier.verify(&signed_ctx(&tampered)).unwrap_err();
            assert!(matches!(err, Error::InvalidSignature), "position {i}");
        }
    }

    #[test]
    fn test_wrong_certificate_is_rejected() {
        let verifier = SignatureVerifier::new(fixture("foreign_cert.pem"));
        let err = verifier.verify(&signed_ctx(SIGNED_URL)).unwrap_err();
        assert!(matches!(err, Error::InvalidSignature));
    }

    #[test]
    fn test_missing_signature_ignores_certificate() {
        let verifier = SignatureVerifier::new("/does/not/exist.pem");
        let ctx = CallbackContext::from_url(SIGNED_URL).unwrap();
        assert!(matches!(verifier.verify(&ctx), Err(Error::MissingSignature)));

        let ctx = CallbackContext::from_url(format!("{SIGNED_URL}&signature=")).unwrap();
        assert!(matches!(verifier.verify(&ctx), Err(Error::MissingSignature)));
    }

    #[test]
    fn test_unreadable_certificate() {
        let verifier = SignatureVerifier::new("/does/not/exist.pem");
        let err = verifier.verify(&signed_ctx(SIGNED_URL)).unwrap_err();
        assert!(matches!(err, Error::CertificateLoad { .. }));
    }

    #[test]
    fn test_malformed_certificate() {
        let verifier = SignatureVerifier::new(fixture("garbage.pem"));
        let err = verifier.verify(&signed_ctx(SIGNED_URL)).unwrap_err();
        assert!(matches!(err, Error::CertificateLoad { .. }));
    }

    #[test]
    fn test_non_base64_signature() {
        let verifier = SignatureVerifier::new(fixture("gateway_cert.pem"));
        let ctx = CallbackContext::from_url(format!("{SIGNED_URL}&signature=%21%21%21")).unwrap();
        assert!(matches!(verifier.verify(&ctx), Err(Error::InvalidSignature)));
    }

    #[cfg(feature = "telemetry")]
    #[test]
    fn test_failures_are_logged_as_warnings() {
        use std::sync::{Arc, Mutex};

        use tracing::{Event, Level, Subscriber};
        use tracing_subscriber::Layer;
        use tracing_subscriber::layer::{Context, SubscriberExt};

        #[derive(Clone, Default)]
        struct Levels(Arc<Mutex<Vec<Level>>>);

        impl<S: Subscriber> Layer<S> for Levels {
            fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
                self.0.lock().unwrap().push(*event.metadata().level());
            }
        }

        let levels = Levels::default();
        let subscriber = tracing_subscriber::registry().with(levels.clone());
        tracing::subscriber::with_default(subscriber, || {
            let verifier = SignatureVerifier::new(fixture("foreign_cert.pem"));
            assert!(verifier.verify(&signed_ctx(SIGNED_URL)).is_err());
            let verifier = SignatureVerifier::new("/does/not/exist.pem");
            assert!(verifier.verify(&signed_ctx(SIGNED_URL)).is_err());
        });

        let levels = levels.0.lock().unwrap();
        assert_eq!(levels.iter().filter(|l| **l == Level::WARN).count(), 2);
        assert!(!levels.contains(&Level::ERROR));
    }
}
