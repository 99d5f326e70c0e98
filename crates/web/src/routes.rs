use actix_web::web::{Data, Form, Query};
use actix_web::{get, post, HttpResponse};
use signed_auth::{IssuedToken, SigningError};

use crate::configuration::AuthConfig;
use crate::login::{LoginAuthenticator, LoginForm};
use crate::middleware::AuthenticatedUser;
use crate::responses::Outcome;
use crate::transport;

#[get("/health_check")]
pub async fn health_check() -> Result<HttpResponse, actix_web::Error> {
    Ok(HttpResponse::Ok().finish())
}

#[get("/login")]
pub async fn login_with_query(
    form: Query<LoginForm>,
    auth: Data<AuthConfig>,
    authenticator: Data<dyn LoginAuthenticator>,
) -> Result<HttpResponse, actix_web::Error> {
    login(&form, &auth, authenticator.get_ref())
}

#[post("/login")]
pub async fn login_with_form(
    form: Form<LoginForm>,
    auth: Data<AuthConfig>,
    authenticator: Data<dyn LoginAuthenticator>,
) -> Result<HttpResponse, actix_web::Error> {
    login(&form, &auth, authenticator.get_ref())
}

#[tracing::instrument(
    name = "Login",
    skip_all,
    fields(username = tracing::field::Empty)
)]
fn login(
    form: &LoginForm,
    auth: &AuthConfig,
    authenticator: &dyn LoginAuthenticator,
) -> Result<HttpResponse, actix_web::Error> {
    let username = match authenticator.authenticate(form) {
        Ok(username) => username,
        Err(failure) => {
            tracing::debug!(must_show_error = failure.must_show_error, "Authentication failed");
            return Ok(auth.responses.respond(Outcome::AuthenticationFailed {
                must_show_error: failure.must_show_error,
            }));
        }
    };
    tracing::Span::current().record("username", tracing::field::display(&username));

    let IssuedToken { credential, token } = match auth.protocol.issue_for(&username) {
        Ok(issued) => issued,
        Err(e @ (SigningError::Delimiter { .. } | SigningError::EmptyUsername)) => {
            tracing::debug!(error = %e, "Username cannot be carried in a token");
            return Ok(auth.responses.respond(Outcome::AuthenticationFailed {
                must_show_error: true,
            }));
        }
        Err(e) => {
            tracing::error!(error.cause_chain = ?e, error.message = %e, "Failed to sign credential");
            return Err(actix_web::error::ErrorInternalServerError(e));
        }
    };
    tracing::info!(credential = %credential, "User authenticated");

    let mut response = auth
        .responses
        .respond(Outcome::AuthenticationSucceeded { token: &token });
    response.add_cookie(&transport::auth_cookie(
        &token,
        &auth.cookies,
        credential.timestamp(),
    ))?;
    Ok(response)
}

#[derive(serde::Serialize)]
struct WhoAmI<'a> {
    username: &'a str,
    provider: &'a str,
    timestamp: String,
}

#[get("/whoami")]
pub async fn whoami(user: AuthenticatedUser) -> Result<HttpResponse, actix_web::Error> {
    let credential = &user.0;
    Ok(HttpResponse::Ok().json(WhoAmI {
        username: credential.username(),
        provider: credential.provider(),
        timestamp: credential.timestamp().to_string(),
    }))
}

/// Drop cached keys so rotated key files are picked up.
#[post("/admin/key-cache/clear")]
pub async fn clear_key_caches(
    user: AuthenticatedUser,
    auth: Data<AuthConfig>,
) -> Result<HttpResponse, actix_web::Error> {
    tracing::info!(requested_by = user.0.username(), "Clearing key caches");
    auth.protocol.keys().clear_caches();
    Ok(HttpResponse::NoContent().finish())
}
