use std::fmt;

use crate::timestamp::Timestamp;

/// An authenticated identity: who, vouched for by which provider, and when.
///
/// A credential is never mutated after signing. Renewal builds a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    username: String,
    provider: String,
    timestamp: Timestamp,
    signature: Option<String>,
}

impl Credential {
    pub fn new(username: impl Into<String>, provider: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            username: username.into(),
            provider: provider.into(),
            timestamp,
            signature: None,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    pub fn with_signature(self, signature: impl Into<String>) -> Self {
        Self {
            signature: Some(signature.into()),
            ..self
        }
    }

    /// The canonical `username|provider|timestamp` text that gets signed.
    pub fn unsigned_body(&self) -> String {
        format!("{}|{}|{}", self.username, self.provider, self.timestamp)
    }

    /// A fresh, unsigned credential for the same identity.
    ///
    /// The new timestamp is `now`, bumped by one millisecond if needed so it
    /// is always strictly later than this one. `None` when this credential
    /// already carries [`Timestamp::latest`] and nothing later exists.
    pub fn renew(&self, now: Timestamp) -> Option<Self> {
        let timestamp = if now > self.timestamp {
            now
        } else {
            self.timestamp.checked_offset_millis(1)?
        };
        Some(Self::new(
            self.username.clone(),
            self.provider.clone(),
            timestamp,
        ))
    }

    /// Milliseconds elapsed between this credential's creation and `now`.
    pub fn age_millis(&self, now: Timestamp) -> i64 {
        now.as_millis().saturating_sub(self.timestamp.as_millis())
    }
}

// Logs show the unsigned body only.
impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.unsigned_body())
    }
}
