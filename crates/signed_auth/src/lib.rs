//! Stateless signed-token credentials.
//!
//! A client authenticates once and receives `username|provider|timestamp|signature`.
//! Every later request presents that token, and it is checked without any
//! database: the provider must be allowed, the token must not be older than
//! the expiry timeout, and the Ed25519 signature must match the provider's
//! public key. Old-but-valid tokens are renewed with a fresh timestamp.
//!
//! This crate does no HTTP. Keys come from a `KeyProvider`, time from a `Clock`.

pub mod clock;
pub mod codec;
pub mod credential;
pub mod error;
pub mod keys;
pub mod protocol;
pub mod signer;
pub mod timestamp;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credential::Credential;
pub use error::{DecodeError, InvalidReason, KeyError, Rejection, SigningError, TimestampParseError};
pub use keys::{
    generate_key_pair, FileSystemKeyProvider, GeneratedKeyPair, InMemoryKeyProvider, KeyProvider,
    SigningKey, VerifyingKey,
};
pub use protocol::{AuthorizeError, Decision, IssuedToken, Policy, Protocol, Timeout};
pub use timestamp::Timestamp;
