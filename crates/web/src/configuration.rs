use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use secrecy::{ExposeSecret, Secret};
use serde_aux::field_attributes::{
    deserialize_number_from_string, deserialize_option_number_from_string,
};
use signed_auth::{
    Clock, FileSystemKeyProvider, InMemoryKeyProvider, KeyError, KeyProvider, Policy, Protocol,
    SigningError, Timeout,
};

use crate::responses::{ResponseStrategies, ResponseStrategy};
use crate::transport::CookieSettings;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub authentication: AuthenticationSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
}

#[derive(serde::Deserialize, Clone)]
pub struct AuthenticationSettings {
    /// Provider name stamped on every credential this service issues.
    pub my_provider: String,
    #[serde(default)]
    pub allowed_providers: Vec<String>,
    pub keys: KeySettings,
    /// `Max-Age` of the auth cookie in seconds; zero or negative means a session cookie.
    #[serde(
        default = "default_cookie_expiry",
        deserialize_with = "deserialize_number_from_string"
    )]
    pub cookie_expiry_timeout_secs: i64,
    /// Absent means tokens never expire.
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub expiry_timeout_ms: Option<u64>,
    /// Absent means tokens are never renewed.
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub renew_timeout_ms: Option<u64>,
    #[serde(default)]
    pub context_path: String,
    #[serde(default)]
    pub responses: ResponseSettings,
}

fn default_cookie_expiry() -> i64 {
    -1
}

#[derive(serde::Deserialize, Clone, Debug)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KeySettings {
    FileSystem {
        private_key_path: String,
        public_keys_path: String,
    },
    Inline {
        /// Base64 PKCS#8 DER.
        private_key: Secret<String>,
        /// Provider name to base64 raw public key.
        #[serde(default)]
        public_keys: HashMap<String, String>,
    },
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ResponseSettings {
    #[serde(default)]
    pub not_authenticated: ResponseStrategy,
    #[serde(default)]
    pub authentication_failed: ResponseStrategy,
    #[serde(default)]
    pub authentication_expired: ResponseStrategy,
    #[serde(default = "default_success_strategy")]
    pub authentication_succeeded: ResponseStrategy,
}

fn default_success_strategy() -> ResponseStrategy {
    ResponseStrategy::WriteToken
}

impl Default for ResponseSettings {
    fn default() -> Self {
        Self {
            not_authenticated: ResponseStrategy::Forbidden,
            authentication_failed: ResponseStrategy::Forbidden,
            authentication_expired: ResponseStrategy::Forbidden,
            authentication_succeeded: default_success_strategy(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("the name of this service's provider (`my_provider`) is required")]
    MissingProvider,

    #[error("failed to load the signing key")]
    SigningKey(#[source] KeyError),

    #[error("the configured keys cannot issue tokens for provider {provider}")]
    KeyPair {
        provider: String,
        #[source]
        source: SigningError,
    },
}

/// Validated authentication setup shared by the login route and the request filter.
#[derive(Debug)]
pub struct AuthConfig {
    pub protocol: Protocol,
    pub cookies: CookieSettings,
    pub responses: ResponseStrategies,
}

impl AuthenticationSettings {
    pub fn key_provider(&self) -> Result<Arc<dyn KeyProvider>, KeyError> {
        let provider: Arc<dyn KeyProvider> = match &self.keys {
            KeySettings::FileSystem {
                private_key_path,
                public_keys_path,
            } => Arc::new(FileSystemKeyProvider::new(private_key_path, public_keys_path)),
            KeySettings::Inline {
                private_key,
                public_keys,
            } => {
                let mut keys =
                    InMemoryKeyProvider::new().with_private_key(private_key.expose_secret())?;
                for (provider, encoded) in public_keys {
                    keys = keys.with_public_key(provider, encoded)?;
                }
                Arc::new(keys)
            }
        };
        Ok(provider)
    }

    pub fn policy(&self) -> Result<Policy, ConfigurationError> {
        let my_provider = self.my_provider.trim();
        if my_provider.is_empty() {
            return Err(ConfigurationError::MissingProvider);
        }

        let policy = self
            .allowed_providers
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .fold(Policy::new(my_provider), |policy, p| policy.allow_provider(p))
            .expire_after(Timeout::from_millis(self.expiry_timeout_ms))
            .renew_after(Timeout::from_millis(self.renew_timeout_ms));
        Ok(policy)
    }

    /// Validate the settings and load the signing key.
    ///
    /// Any error here is a deployment mistake and should stop the service
    /// from starting.
    pub fn build(&self, clock: Arc<dyn Clock>) -> Result<AuthConfig, ConfigurationError> {
        let policy = self.policy()?;

        if let (Timeout::Millis(renew), Timeout::Millis(expiry)) = (policy.renewal, policy.expiry) {
            if renew > expiry {
                tracing::warn!(
                    renew_timeout_ms = renew,
                    expiry_timeout_ms = expiry,
                    "Renew timeout exceeds expiry timeout; tokens will expire before they are renewed"
                );
            }
        }

        let keys = self.key_provider().map_err(ConfigurationError::SigningKey)?;
        keys.private_key().map_err(ConfigurationError::SigningKey)?;

        let protocol = Protocol::new(keys, policy, clock);
        protocol
            .issue_for("configuration-check")
            .map_err(|source| ConfigurationError::KeyPair {
                provider: protocol.policy().issuer.clone(),
                source,
            })?;

        tracing::info!(
            my_provider = %protocol.policy().issuer,
            allowed_providers = ?protocol.policy().allowed_providers,
            expiry = ?protocol.policy().expiry,
            renewal = ?protocol.policy().renewal,
            "Authentication configured"
        );

        let responses = ResponseStrategies {
            not_authenticated: self.responses.not_authenticated.clone(),
            authentication_failed: self.responses.authentication_failed.clone(),
            authentication_expired: self.responses.authentication_expired.clone(),
            authentication_succeeded: self.responses.authentication_succeeded.clone(),
            context_path: self.context_path.clone(),
        };

        Ok(AuthConfig {
            protocol,
            cookies: CookieSettings::new(&self.context_path, self.cookie_expiry_timeout_secs),
            responses,
        })
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let base_path = Path::new(manifest_dir);
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;
    let environment_filename = format!("{}.yaml", environment.as_str());
    let settings = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        // Add in settings from environment variables (with a prefix of APP and
        // '__' as separator)
        // E.g. `APP_AUTHENTICATION__EXPIRY_TIMEOUT_MS=60000` would set
        // `Settings.authentication.expiry_timeout_ms`
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}

#[derive(Debug)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. \
            Use either `local` or `production`.",
                other
            )),
        }
    }
}
