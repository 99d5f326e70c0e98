//! Token validation, renewal and issuance policy.
//!
//! Per request a presented token ends in exactly one state:
//!
//! ```text
//! Presented ─┬─ Malformed                      (invalid)
//!            └─ Decoded ─┬─ ProviderRejected   (invalid)
//!                        ├─ Expired            (expired)
//!                        ├─ SignatureInvalid   (invalid)
//!                        └─ Accepted ─┬─ Accepted
//!                                     └─ Renewed (new token issued)
//! ```
//!
//! Checks run cheapest first: provider allow-list, then expiry, then the
//! signature. A token for an unknown provider or past its expiry is refused
//! before any public key is loaded.

use std::collections::HashSet;
use std::sync::Arc;

use crate::clock::Clock;
use crate::codec;
use crate::credential::Credential;
use crate::error::{DecodeError, InvalidReason, Rejection, SigningError};
use crate::keys::KeyProvider;
use crate::signer;

/// A duration in milliseconds, or no limit at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    Unbounded,
    Millis(u64),
}

impl Timeout {
    /// `None` means unbounded.
    pub fn from_millis(millis: Option<u64>) -> Self {
        millis.map_or(Timeout::Unbounded, Timeout::Millis)
    }

    /// Strictly greater: an age equal to the timeout has not exceeded it.
    pub fn exceeded_by(&self, age_millis: i64) -> bool {
        match *self {
            Timeout::Unbounded => false,
            Timeout::Millis(limit) => i128::from(age_millis) > i128::from(limit),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Policy {
    pub issuer: String,
    pub allowed_providers: HashSet<String>,
    pub expiry: Timeout,
    pub renewal: Timeout,
}

impl Policy {
    /// Accept only tokens issued by `issuer`, with no time limits.
    pub fn new(issuer: impl Into<String>) -> Self {
        let issuer = issuer.into();
        Self {
            allowed_providers: HashSet::from([issuer.clone()]),
            issuer,
            expiry: Timeout::Unbounded,
            renewal: Timeout::Unbounded,
        }
    }

    pub fn allow_provider(mut self, provider: impl Into<String>) -> Self {
        self.allowed_providers.insert(provider.into());
        self
    }

    pub fn expire_after(mut self, expiry: Timeout) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn renew_after(mut self, renewal: Timeout) -> Self {
        self.renewal = renewal;
        self
    }

    pub fn allows(&self, provider: &str) -> bool {
        !provider.is_empty() && self.allowed_providers.contains(provider)
    }
}

/// A signed credential together with its wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub credential: Credential,
    pub token: String,
}

/// Outcome of an authorized request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Accepted(Credential),
    Renewed(IssuedToken),
}

impl Decision {
    pub fn credential(&self) -> &Credential {
        match self {
            Decision::Accepted(credential) => credential,
            Decision::Renewed(issued) => &issued.credential,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthorizeError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("failed to renew an accepted credential")]
    Renewal(#[source] SigningError),
}

pub struct Protocol {
    keys: Arc<dyn KeyProvider>,
    policy: Policy,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Protocol")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Protocol {
    pub fn new(keys: Arc<dyn KeyProvider>, policy: Policy, clock: Arc<dyn Clock>) -> Self {
        Self {
            keys,
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn keys(&self) -> &Arc<dyn KeyProvider> {
        &self.keys
    }

    pub fn validate(&self, raw_token: &str) -> Result<Credential, Rejection> {
        let invalid = |reason| Rejection::InvalidToken {
            token: raw_token.to_owned(),
            reason,
        };

        let credential = codec::decode(raw_token).map_err(|e| match e {
            DecodeError::Malformed { .. } => invalid(InvalidReason::Malformed),
            DecodeError::Timestamp(_) => invalid(InvalidReason::TimestampFormat),
        })?;

        if !self.policy.allows(credential.provider()) {
            return Err(invalid(InvalidReason::ProviderNotAllowed));
        }

        if self.is_expired(&credential) {
            return Err(Rejection::Expired { credential });
        }

        let public_key = self.keys.public_key_for(credential.provider()).map_err(|e| {
            tracing::warn!(provider = credential.provider(), error = %e, "No verification key");
            invalid(InvalidReason::UnknownProviderKey)
        })?;

        let signature = credential.signature().unwrap_or_default();
        if !signer::verify(&credential.unsigned_body(), signature, &public_key) {
            return Err(invalid(InvalidReason::SignatureMismatch));
        }

        Ok(credential)
    }

    pub fn is_expired(&self, credential: &Credential) -> bool {
        self.policy
            .expiry
            .exceeded_by(credential.age_millis(self.clock.now()))
    }

    pub fn must_renew(&self, credential: &Credential) -> bool {
        self.policy
            .renewal
            .exceeded_by(credential.age_millis(self.clock.now()))
    }

    /// Replace `credential` with a freshly signed one for the same identity.
    pub fn renew(&self, credential: &Credential) -> Result<IssuedToken, SigningError> {
        let renewed = credential.renew(self.clock.now()).ok_or_else(|| {
            SigningError::TimestampExhausted {
                credential: credential.clone(),
            }
        })?;
        let issued = self.sign_and_encode(renewed)?;
        tracing::info!(credential = %issued.credential, "Authentication token renewed");
        Ok(issued)
    }

    /// Trusted creation path used after the user has been authenticated.
    /// No allow-list or expiry checks apply.
    #[tracing::instrument(name = "Issue token", skip(self))]
    pub fn issue(&self, username: &str, provider: &str) -> Result<IssuedToken, SigningError> {
        let credential = Credential::new(username, provider, self.clock.now());
        self.sign_and_encode(credential)
    }

    /// [`Protocol::issue`] for this service's own provider.
    pub fn issue_for(&self, username: &str) -> Result<IssuedToken, SigningError> {
        self.issue(username, &self.policy.issuer)
    }

    /// Validate and, when the credential is old enough, renew it.
    #[tracing::instrument(name = "Authorize token", skip_all)]
    pub fn authorize(&self, raw_token: &str) -> Result<Decision, AuthorizeError> {
        let credential = self.validate(raw_token)?;
        if self.must_renew(&credential) {
            let issued = self.renew(&credential).map_err(AuthorizeError::Renewal)?;
            return Ok(Decision::Renewed(issued));
        }
        Ok(Decision::Accepted(credential))
    }

    fn sign_and_encode(&self, credential: Credential) -> Result<IssuedToken, SigningError> {
        let credential = signer::sign_credential(credential, self.keys.as_ref())?;
        let token = codec::encode(&credential);
        Ok(IssuedToken { credential, token })
    }
}
