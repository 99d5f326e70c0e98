use std::path::PathBuf;

use crate::credential::Credential;

/// The timestamp field does not match `YYYYMMDD.HHMMSSmmm`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("error parsing timestamp: {text:?}")]
pub struct TimestampParseError {
    pub text: String,
}

/// A token string that cannot be turned into a [`Credential`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed token: expected 4 fields, found {fields}")]
    Malformed { fields: usize },

    #[error(transparent)]
    Timestamp(#[from] TimestampParseError),
}

/// Failures of the key provider.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum KeyError {
    #[error("no key found for {0}")]
    NotFound(String),

    #[error("failed to read key at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("key material for {0} is not a valid Ed25519 key")]
    InvalidKey(String),

    #[error("key material for {0} is not valid base64")]
    Decode(String),

    #[error("failed to generate key pair")]
    Generation,
}

/// Failures while producing a signature.
///
/// These are operational faults: they point at a broken key setup rather
/// than at anything the client sent.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("signature for provider {provider} does not verify against its public key; the key pair is mismatched")]
    SelfVerification { provider: String },

    #[error("username must not be empty")]
    EmptyUsername,

    #[error("{field} must not contain the token delimiter: {value:?}")]
    Delimiter { field: &'static str, value: String },

    #[error("credential for {credential} cannot be renewed: no later timestamp is representable")]
    TimestampExhausted { credential: Credential },
}

/// Why a decodable-or-not token was refused as invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    Malformed,
    TimestampFormat,
    ProviderNotAllowed,
    UnknownProviderKey,
    SignatureMismatch,
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            InvalidReason::Malformed => "malformed token",
            InvalidReason::TimestampFormat => "bad timestamp",
            InvalidReason::ProviderNotAllowed => "provider not allowed",
            InvalidReason::UnknownProviderKey => "no public key for provider",
            InvalidReason::SignatureMismatch => "signature mismatch",
        };
        f.write_str(text)
    }
}

/// Per-request rejection produced by [`crate::protocol::Protocol::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("invalid token ({reason}): {token}")]
    InvalidToken { token: String, reason: InvalidReason },

    #[error("expired token: {credential}")]
    Expired { credential: Credential },
}

impl Rejection {
    pub fn is_expired(&self) -> bool {
        matches!(self, Rejection::Expired { .. })
    }
}
