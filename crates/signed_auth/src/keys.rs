//! Ed25519 key material and the providers that hand it out.
//!
//! Keys are provisioned out of band. A provider supplies this service's
//! private signing key and the public key of every provider whose tokens
//! it accepts:
//!
//! - [`FileSystemKeyProvider`] reads PKCS#8 / raw key files lazily and caches them.
//! - [`InMemoryKeyProvider`] holds base64-configured keys.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dashmap::DashMap;
use parking_lot::RwLock;
use ring::rand::SystemRandom;
use ring::signature::{self, Ed25519KeyPair, KeyPair, UnparsedPublicKey};

use crate::error::KeyError;

/// A private Ed25519 signing key.
///
/// No `Debug` implementation, so it cannot end up in logs.
pub struct SigningKey(Ed25519KeyPair);

impl SigningKey {
    /// Load from PKCS#8 DER (v1 or v2).
    pub fn from_pkcs8(der: &[u8], label: &str) -> Result<Self, KeyError> {
        Ed25519KeyPair::from_pkcs8_maybe_unchecked(der)
            .map(Self)
            .map_err(|_| KeyError::InvalidKey(label.to_owned()))
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.0.sign(message).as_ref().to_vec()
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey(self.0.public_key().as_ref().to_vec())
    }
}

/// A public Ed25519 verification key (raw 32 bytes).
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyingKey(Vec<u8>);

impl VerifyingKey {
    pub fn from_bytes(bytes: &[u8], label: &str) -> Result<Self, KeyError> {
        if bytes.len() != 32 {
            return Err(KeyError::InvalidKey(label.to_owned()));
        }
        Ok(Self(bytes.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        UnparsedPublicKey::new(&signature::ED25519, &self.0)
            .verify(message, signature)
            .is_ok()
    }
}

impl std::fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VerifyingKey({})", STANDARD.encode(&self.0))
    }
}

/// Source of key material for signing and verification.
///
/// Implementations are shared across concurrent requests. Cached entries
/// are handed out as `Arc`s, so a concurrent [`KeyProvider::clear_caches`]
/// can only make later lookups reload; it never affects a key already in use.
pub trait KeyProvider: Send + Sync {
    fn private_key(&self) -> Result<Arc<SigningKey>, KeyError>;

    fn public_key_for(&self, provider: &str) -> Result<Arc<VerifyingKey>, KeyError>;

    fn clear_caches(&self);
}

pub struct FileSystemKeyProvider {
    private_key_path: PathBuf,
    public_keys_path: PathBuf,
    private_key: RwLock<Option<Arc<SigningKey>>>,
    public_keys: DashMap<String, Arc<VerifyingKey>>,
    // Bumped by every `clear_caches`.
    generation: AtomicU64,
}

impl FileSystemKeyProvider {
    /// `$NAME` references to environment variables in either path are expanded.
    pub fn new(private_key_path: impl AsRef<str>, public_keys_path: impl AsRef<str>) -> Self {
        Self {
            private_key_path: PathBuf::from(expand_env(private_key_path.as_ref())),
            public_keys_path: PathBuf::from(expand_env(public_keys_path.as_ref())),
            private_key: RwLock::new(None),
            public_keys: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn private_key_path(&self) -> &Path {
        &self.private_key_path
    }

    pub fn public_keys_path(&self) -> &Path {
        &self.public_keys_path
    }

    /// Cache `key`, read while the cache was at `generation`, unless a clear
    /// has happened since.
    fn cache_public_key(
        &self,
        provider: &str,
        key: Arc<VerifyingKey>,
        generation: u64,
    ) -> Arc<VerifyingKey> {
        let cached = Arc::clone(
            self.public_keys
                .entry(provider.to_owned())
                .or_insert(key)
                .value(),
        );
        if self.generation.load(Ordering::SeqCst) != generation {
            self.public_keys
                .remove_if(provider, |_, entry| Arc::ptr_eq(entry, &cached));
        }
        cached
    }

    fn public_key_path(&self, provider: &str) -> Option<PathBuf> {
        let mut components = Path::new(provider).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Some(self.public_keys_path.join(provider)),
            _ => None,
        }
    }
}

impl KeyProvider for FileSystemKeyProvider {
    fn private_key(&self) -> Result<Arc<SigningKey>, KeyError> {
        if let Some(key) = self.private_key.read().as_ref() {
            return Ok(Arc::clone(key));
        }

        let mut slot = self.private_key.write();
        if let Some(key) = slot.as_ref() {
            return Ok(Arc::clone(key));
        }
        let der = read_key(&self.private_key_path)?;
        let key = Arc::new(SigningKey::from_pkcs8(
            &der,
            &self.private_key_path.display().to_string(),
        )?);
        *slot = Some(Arc::clone(&key));
        Ok(key)
    }

    fn public_key_for(&self, provider: &str) -> Result<Arc<VerifyingKey>, KeyError> {
        if let Some(key) = self.public_keys.get(provider) {
            return Ok(Arc::clone(key.value()));
        }

        let path = self
            .public_key_path(provider)
            .ok_or_else(|| KeyError::NotFound(provider.to_owned()))?;
        let generation = self.generation.load(Ordering::SeqCst);
        let bytes = read_key(&path)?;
        let key = Arc::new(VerifyingKey::from_bytes(&bytes, provider)?);
        Ok(self.cache_public_key(provider, key, generation))
    }

    fn clear_caches(&self) {
        tracing::info!(
            private_key = %self.private_key_path.display(),
            public_keys = %self.public_keys_path.display(),
            "Clearing key caches"
        );
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.private_key.write() = None;
        self.public_keys.clear();
    }
}

fn read_key(path: &Path) -> Result<Vec<u8>, KeyError> {
    tracing::debug!(path = %path.display(), "Loading key");
    std::fs::read(path).map_err(|source| {
        tracing::error!(path = %path.display(), error = %source, "Key not found");
        if source.kind() == std::io::ErrorKind::NotFound {
            KeyError::NotFound(path.display().to_string())
        } else {
            KeyError::Io {
                path: path.to_owned(),
                source,
            }
        }
    })
}

/// Replace `$NAME` with the value of environment variable `NAME`.
///
/// Longer names are substituted first so `$HOME_DIR` is not clobbered by `$HOME`.
pub fn expand_env(path: &str) -> String {
    let mut vars: Vec<(String, String)> = std::env::vars().collect();
    vars.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    vars.into_iter().fold(path.to_owned(), |acc, (name, value)| {
        acc.replace(&format!("${name}"), &value)
    })
}

/// Keys configured directly as base64 strings. Nothing to cache or clear.
#[derive(Default)]
pub struct InMemoryKeyProvider {
    private_key: Option<Arc<SigningKey>>,
    public_keys: HashMap<String, Arc<VerifyingKey>>,
}

impl InMemoryKeyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base64 of PKCS#8 DER.
    pub fn with_private_key(mut self, encoded: &str) -> Result<Self, KeyError> {
        let der = decode_base64(encoded, "private key")?;
        self.private_key = Some(Arc::new(SigningKey::from_pkcs8(&der, "private key")?));
        Ok(self)
    }

    /// Base64 of the raw 32-byte public key.
    pub fn with_public_key(mut self, provider: &str, encoded: &str) -> Result<Self, KeyError> {
        let bytes = decode_base64(encoded, provider)?;
        let key = VerifyingKey::from_bytes(&bytes, provider)?;
        self.public_keys.insert(provider.to_owned(), Arc::new(key));
        Ok(self)
    }
}

impl KeyProvider for InMemoryKeyProvider {
    fn private_key(&self) -> Result<Arc<SigningKey>, KeyError> {
        self.private_key
            .clone()
            .ok_or_else(|| KeyError::NotFound("private key".to_owned()))
    }

    fn public_key_for(&self, provider: &str) -> Result<Arc<VerifyingKey>, KeyError> {
        self.public_keys
            .get(provider)
            .cloned()
            .ok_or_else(|| KeyError::NotFound(provider.to_owned()))
    }

    fn clear_caches(&self) {}
}

impl std::fmt::Debug for InMemoryKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKeyProvider")
            .field("has_private_key", &self.private_key.is_some())
            .field("providers", &self.public_keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn decode_base64(encoded: &str, label: &str) -> Result<Vec<u8>, KeyError> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|_| KeyError::Decode(label.to_owned()))
}

/// A freshly generated Ed25519 key pair.
pub struct GeneratedKeyPair {
    /// PKCS#8 v2 DER of the private key.
    pub pkcs8: Vec<u8>,
    /// Raw 32-byte public key.
    pub public_key: Vec<u8>,
}

impl GeneratedKeyPair {
    pub fn private_key_base64(&self) -> String {
        STANDARD.encode(&self.pkcs8)
    }

    pub fn public_key_base64(&self) -> String {
        STANDARD.encode(&self.public_key)
    }

    /// An in-memory provider that signs with this pair and verifies `provider` with it.
    pub fn into_provider(self, provider: &str) -> Result<InMemoryKeyProvider, KeyError> {
        InMemoryKeyProvider::new()
            .with_private_key(&self.private_key_base64())?
            .with_public_key(provider, &self.public_key_base64())
    }
}

pub fn generate_key_pair() -> Result<GeneratedKeyPair, KeyError> {
    let rng = SystemRandom::new();
    let document = Ed25519KeyPair::generate_pkcs8(&rng).map_err(|_| KeyError::Generation)?;
    let pkcs8 = document.as_ref().to_vec();
    let key_pair = Ed25519KeyPair::from_pkcs8(&pkcs8).map_err(|_| KeyError::Generation)?;
    let public_key = key_pair.public_key().as_ref().to_vec();
    Ok(GeneratedKeyPair { pkcs8, public_key })
}
