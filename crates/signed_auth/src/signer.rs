//! Detached Ed25519 signatures over a credential's unsigned body.
//!
//! Verification always rebuilds the body from the parsed fields, never from
//! the bytes that arrived on the wire.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::codec::DELIMITER;
use crate::credential::Credential;
use crate::error::SigningError;
use crate::keys::{KeyProvider, SigningKey, VerifyingKey};

pub fn sign(unsigned_body: &str, key: &SigningKey) -> String {
    STANDARD.encode(key.sign(unsigned_body.as_bytes()))
}

/// `false` for anything that does not verify, including undecodable base64.
pub fn verify(unsigned_body: &str, signature: &str, key: &VerifyingKey) -> bool {
    match STANDARD.decode(signature) {
        Ok(raw) => key.verify(unsigned_body.as_bytes(), &raw),
        Err(_) => false,
    }
}

/// Sign `credential` with the provider's private key and return it with the
/// signature attached.
///
/// The fresh signature is checked against the public key registered for the
/// credential's provider. A mismatch means the key provider hands out keys
/// that do not belong together, which is reported as
/// [`SigningError::SelfVerification`].
pub fn sign_credential(
    credential: Credential,
    keys: &dyn KeyProvider,
) -> Result<Credential, SigningError> {
    if credential.username().is_empty() {
        return Err(SigningError::EmptyUsername);
    }
    for (field, value) in [
        ("username", credential.username()),
        ("provider", credential.provider()),
    ] {
        if value.contains(DELIMITER) {
            return Err(SigningError::Delimiter {
                field,
                value: value.to_owned(),
            });
        }
    }

    let body = credential.unsigned_body();
    let signature = sign(&body, &*keys.private_key()?);

    let public_key = keys.public_key_for(credential.provider())?;
    if !verify(&body, &signature, &public_key) {
        tracing::error!(
            provider = credential.provider(),
            "Signature self-verification failed"
        );
        return Err(SigningError::SelfVerification {
            provider: credential.provider().to_owned(),
        });
    }

    Ok(credential.with_signature(signature))
}
