//! # auditchain-crypto: signature verification
//!
//! Wraps RSA PKCS#1 v1.5 over SHA-256 verification behind the single
//! predicate the rest of the system needs: `verify(payload, signature,
//! public_key) -> bool`. Signing itself is a client-side concern and out of
//! scope here.

use auditchain_types::{Audit, canonical_json};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha2::Sha256;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("malformed PEM public key: {0}")]
    MalformedKey(String),

    #[error("malformed base64 signature: {0}")]
    MalformedSignature(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;

/// Verifies an RSA PKCS#1 v1.5/SHA-256 signature over `payload`.
///
/// `signature` is base64; `public_key_pem` is a PEM-encoded `SubjectPublicKeyInfo`.
/// Returns `Ok(false)` for a well-formed-but-non-matching signature, and
/// `Err` only when the key or signature encoding itself is malformed — the
/// two are kept distinct so callers can log which failure mode occurred.
pub fn verify(payload: &[u8], signature: &str, public_key_pem: &str) -> Result<bool> {
    let public_key = RsaPublicKey::from_public_key_pem(public_key_pem)
        .map_err(|e| CryptoError::MalformedKey(e.to_string()))?;
    let verifying_key = VerifyingKey::<Sha256>::new(public_key);

    let sig_bytes = BASE64
        .decode(signature)
        .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;
    let signature = Signature::try_from(sig_bytes.as_slice())
        .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;

    Ok(verifying_key.verify(payload, &signature).is_ok())
}

/// Like [`verify`], but treats any malformed input as a failed verification
/// rather than a distinct error — the shape the RPC surface wants, since a
/// bad signature and a bad key both just mean "reject this audit".
pub fn verify_lenient(payload: &[u8], signature: &str, public_key_pem: &str) -> bool {
    verify(payload, signature, public_key_pem).unwrap_or(false)
}

/// Verifies an [`Audit`]'s signature over its own canonical JSON payload.
pub fn verify_audit(audit: &Audit) -> bool {
    verify_lenient(canonical_json(audit).as_bytes(), &audit.signature, &audit.public_key)
}


#[cfg(test)]
mod fuzz_like_laws {
    use super::*;
    use proptest::prelude::*;
    use rsa::pkcs8::EncodePublicKey;

    proptest! {
        /// No arbitrary byte garbage passed as signature/key ever panics
        /// `verify_lenient`; it always collapses to `false`.
        #[test]
        fn verify_lenient_never_panics_on_garbage(
            payload in proptest::collection::vec(any::<u8>(), 0..64),
            signature in "[a-zA-Z0-9+/=]{0,64}",
            public_key in "[-a-zA-Z0-9+/=\\n ]{0,128}",
        ) {
            prop_assert!(!verify_lenient(&payload, &signature, &public_key));
        }

        /// A genuine signature verifies against the matching payload and key,
        /// and fails against any other payload.
        #[test]
        fn genuine_signature_is_rejected_for_a_different_payload(
            original in proptest::collection::vec(any::<u8>(), 1..64),
            tampered in proptest::collection::vec(any::<u8>(), 1..64),
        ) {
            prop_assume!(original != tampered);
            let mut rng = rand::thread_rng();
            let private_key = rsa::RsaPrivateKey::new(&mut rng, 2048).expect("keygen");
            let public_pem = private_key
                .to_public_key()
                .to_public_key_pem(rsa::pkcs8::LineEnding::LF)
                .expect("pem encode");
            let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new(private_key);
            let signature = rsa::signature::Signer::sign(&signing_key, &original);
            let encoded = BASE64.encode(signature.to_bytes());

            prop_assert!(verify(&original, &encoded, &public_pem).unwrap());
            prop_assert!(!verify(&tampered, &encoded, &public_pem).unwrap());
        }
    }
}
