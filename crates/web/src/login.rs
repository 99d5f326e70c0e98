use secrecy::{ExposeSecret, Secret};

#[derive(serde::Deserialize)]
pub struct LoginForm {
    pub username: Option<String>,
    pub password: Option<Secret<String>>,
}

#[derive(Debug, thiserror::Error)]
#[error("authentication failed")]
pub struct AuthenticationFailed {
    pub must_show_error: bool,
}

/// Application-specific check of the credentials submitted to `/login`.
///
/// Returns the username to issue a token for.
pub trait LoginAuthenticator: Send + Sync {
    fn authenticate(&self, form: &LoginForm) -> Result<String, AuthenticationFailed>;
}

/// Accepts any user whose password equals the username. For demos and tests only.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoPasswordAuthenticator;

impl LoginAuthenticator for EchoPasswordAuthenticator {
    fn authenticate(&self, form: &LoginForm) -> Result<String, AuthenticationFailed> {
        let username = match form.username.as_deref() {
            Some(username) if !username.is_empty() => username,
            _ => {
                return Err(AuthenticationFailed {
                    must_show_error: false,
                })
            }
        };

        match &form.password {
            Some(password) if password.expose_secret() == username => Ok(username.to_owned()),
            _ => Err(AuthenticationFailed {
                must_show_error: true,
            }),
        }
    }
}
