use actix_web::http::header::{self, ContentType};
use actix_web::HttpResponse;

/// What to send back for a given authentication outcome.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseStrategy {
    #[default]
    Forbidden,
    /// Redirect to `path`, relative to the configured context path.
    Redirect { path: String },
    /// Write the full signed token as a plain-text body.
    WriteToken,
}

impl ResponseStrategy {
    pub fn respond(&self, context_path: &str, token: Option<&str>) -> HttpResponse {
        match self {
            ResponseStrategy::Forbidden => HttpResponse::Forbidden().finish(),
            ResponseStrategy::Redirect { path } => HttpResponse::Found()
                .insert_header((
                    header::LOCATION,
                    format!(
                        "{}{}",
                        context_path.trim_end_matches('/'),
                        redirect_path(path)
                    ),
                ))
                .finish(),
            ResponseStrategy::WriteToken => HttpResponse::Ok()
                .content_type(ContentType::plaintext())
                .body(token.unwrap_or_default().to_owned()),
        }
    }
}

fn redirect_path(path: &str) -> String {
    let path = path.trim();
    if path.is_empty() || path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    }
}

/// The ways an authentication attempt or an authenticated request can end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<'a> {
    NotAuthenticated,
    /// A login attempt was refused. When `must_show_error` is false the
    /// client is treated as if it never tried.
    AuthenticationFailed { must_show_error: bool },
    AuthenticationExpired,
    AuthenticationSucceeded { token: &'a str },
}

#[derive(Debug, Clone)]
pub struct ResponseStrategies {
    pub not_authenticated: ResponseStrategy,
    pub authentication_failed: ResponseStrategy,
    pub authentication_expired: ResponseStrategy,
    pub authentication_succeeded: ResponseStrategy,
    pub context_path: String,
}

impl ResponseStrategies {
    pub fn respond(&self, outcome: Outcome<'_>) -> HttpResponse {
        let (strategy, token) = match outcome {
            Outcome::NotAuthenticated
            | Outcome::AuthenticationFailed {
                must_show_error: false,
            } => (&self.not_authenticated, None),
            Outcome::AuthenticationFailed {
                must_show_error: true,
            } => (&self.authentication_failed, None),
            Outcome::AuthenticationExpired => (&self.authentication_expired, None),
            Outcome::AuthenticationSucceeded { token } => {
                (&self.authentication_succeeded, Some(token))
            }
        };
        strategy.respond(&self.context_path, token)
    }
}
