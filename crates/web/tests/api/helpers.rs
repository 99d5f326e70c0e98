use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use fake::faker::internet::en::SafeEmail;
use fake::Fake;
use once_cell::sync::Lazy;
use secrecy::Secret;
use signed_auth::{generate_key_pair, Clock, GeneratedKeyPair, ManualClock, Policy, Protocol};
use web::{
    configuration::{get_configuration, KeySettings, ResponseSettings},
    login::EchoPasswordAuthenticator,
    responses::ResponseStrategy,
    startup::Application,
    telemetry::{get_subscriber, init_subscriber},
};

pub const PROVIDER: &str = "Test";
/// Has a registered public key but is not an allowed provider.
pub const UNLISTED_PROVIDER: &str = "Unlisted";

pub const MINUTE_MS: u64 = 60_000;
pub const RENEW_TIMEOUT_MS: u64 = 10 * MINUTE_MS;
pub const EXPIRY_TIMEOUT_MS: u64 = 30 * MINUTE_MS;

static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();

    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        init_subscriber(subscriber);
    } else {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::sink);
        init_subscriber(subscriber);
    }
});

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub api_client: reqwest::Client,
    pub test_user: TestUser,
    pub clock: Arc<ManualClock>,
    /// Signs with the application's key, for any provider.
    pub issuer: Protocol,
}

pub struct TestUser {
    pub username: String,
    pub password: String,
}

impl TestUser {
    pub fn generate() -> Self {
        let username: String = SafeEmail().fake();
        Self {
            // The echo authenticator accepts a password equal to the username.
            password: username.clone(),
            username,
        }
    }
}

impl TestApp {
    pub async fn get_healthcheck(&self) -> reqwest::Response {
        self.api_client
            .get(&format!("{}/health_check", &self.address))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_login<Body>(&self, body: &Body) -> reqwest::Response
    where
        Body: serde::Serialize,
    {
        self.api_client
            .post(&format!("{}/login", &self.address))
            .form(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn login_test_user(&self) -> String {
        let response = self
            .post_login(&serde_json::json!({
                "username": &self.test_user.username,
                "password": &self.test_user.password,
            }))
            .await;
        assert_eq!(200, response.status().as_u16());
        response.text().await.expect("Failed to read token.")
    }

    pub async fn get_whoami(&self) -> reqwest::Response {
        self.api_client
            .get(&format!("{}/api/whoami", &self.address))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Fresh client, so only the given header carries credentials.
    pub async fn get_whoami_with_cookies(&self, cookie_header: &str) -> reqwest::Response {
        bare_client()
            .get(&format!("{}/api/whoami", &self.address))
            .header(reqwest::header::COOKIE, cookie_header)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_whoami_with_parameter(&self, token: &str) -> reqwest::Response {
        bare_client()
            .get(&format!("{}/api/whoami", &self.address))
            .query(&[("auth", token)])
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_clear_key_cache(&self) -> reqwest::Response {
        self.api_client
            .post(&format!("{}/api/admin/key-cache/clear", &self.address))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub fn token_for(&self, username: &str, provider: &str) -> String {
        self.issuer
            .issue(username, provider)
            .expect("Failed to sign token.")
            .token
    }
}

fn bare_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

pub fn assert_is_redirect_to(response: &reqwest::Response, location: &str) {
    assert_eq!(response.status().as_u16(), 302);
    assert_eq!(response.headers().get("Location").unwrap(), location);
}

/// Names of auth cookies the response asks the client to delete.
pub fn expired_cookie_names(response: &reqwest::Response) -> Vec<String> {
    response
        .cookies()
        .filter(|c| c.name().starts_with("auth") && c.value().is_empty())
        .map(|c| c.name().to_owned())
        .collect()
}

/// Value of the auth cookie the response installs, if any.
pub fn issued_cookie_token(response: &reqwest::Response) -> Option<String> {
    response
        .cookies()
        .find(|c| c.name().starts_with("auth") && !c.value().is_empty())
        .map(|c| web::transport::normalize(c.value()))
}

/// Write `private.key` and a `public/` directory holding the public key of
/// both test providers, replacing whatever was there.
pub fn write_key_files(dir: &Path) -> GeneratedKeyPair {
    let pair = generate_key_pair().expect("Failed to generate keys");
    let public_dir = dir.join("public");
    std::fs::create_dir_all(&public_dir).unwrap();
    std::fs::write(dir.join("private.key"), &pair.pkcs8).unwrap();
    for provider in [PROVIDER, UNLISTED_PROVIDER] {
        std::fs::write(public_dir.join(provider), &pair.public_key).unwrap();
    }
    pair
}

pub fn file_system_keys(dir: &Path) -> KeySettings {
    KeySettings::FileSystem {
        private_key_path: dir.join("private.key").display().to_string(),
        public_keys_path: dir.join("public").display().to_string(),
    }
}

pub async fn spawn_app() -> TestApp {
    let pair = generate_key_pair().expect("Failed to generate keys");
    let public_key = pair.public_key_base64();
    spawn_app_with_keys(KeySettings::Inline {
        private_key: Secret::new(pair.private_key_base64()),
        public_keys: HashMap::from([
            (PROVIDER.to_owned(), public_key.clone()),
            (UNLISTED_PROVIDER.to_owned(), public_key),
        ]),
    })
    .await
}

pub async fn spawn_app_with_keys(keys: KeySettings) -> TestApp {
    // Singleton Pattern
    Lazy::force(&TRACING);

    let api_client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .cookie_store(true)
        .build()
        .unwrap();

    let configuration = {
        let mut c = get_configuration().expect("Failed to read configuration");
        // Wildcard port, the system will find available port
        c.application.port = 0;
        let auth = &mut c.authentication;
        auth.my_provider = PROVIDER.into();
        auth.allowed_providers = vec![];
        auth.keys = keys;
        auth.cookie_expiry_timeout_secs = 3600;
        auth.expiry_timeout_ms = Some(EXPIRY_TIMEOUT_MS);
        auth.renew_timeout_ms = Some(RENEW_TIMEOUT_MS);
        auth.context_path = String::new();
        auth.responses = ResponseSettings {
            not_authenticated: ResponseStrategy::Forbidden,
            authentication_failed: ResponseStrategy::Redirect {
                path: "/login-failed".into(),
            },
            authentication_expired: ResponseStrategy::Redirect {
                path: "session-expired".into(),
            },
            authentication_succeeded: ResponseStrategy::WriteToken,
        };
        c
    };

    let clock = Arc::new(ManualClock::starting_now());
    let issuer = Protocol::new(
        configuration
            .authentication
            .key_provider()
            .expect("Failed to load keys"),
        Policy::new(PROVIDER).allow_provider(UNLISTED_PROVIDER),
        clock.clone() as Arc<dyn Clock>,
    );

    let app = Application::build_with(
        configuration.clone(),
        Arc::new(EchoPasswordAuthenticator),
        clock.clone(),
    )
    .await
    .expect("Failed to build application");
    let port = app.port();
    let address = format!("http://127.0.0.1:{}", port);

    // Run the application
    let _ = tokio::spawn(app.run_until_stopped());
    TestApp {
        address,
        port,
        api_client,
        test_user: TestUser::generate(),
        clock,
        issuer,
    }
}
