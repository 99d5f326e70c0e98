//! Request filter guarding authenticated routes.
//!
//! The accepted credential is stored in the request extensions, so it lives
//! exactly as long as the request and is gone on every exit path.

use std::future::{ready, Ready};

use actix_web::body::{BoxBody, MessageBody};
use actix_web::dev::{Payload, ServiceRequest, ServiceResponse};
use actix_web::error::{ErrorInternalServerError, ErrorUnauthorized};
use actix_web::middleware::Next;
use actix_web::web::Data;
use actix_web::{FromRequest, HttpMessage, HttpRequest, HttpResponse};
use signed_auth::{AuthorizeError, Credential, Decision, Rejection};

use crate::configuration::AuthConfig;
use crate::responses::Outcome;
use crate::transport;

/// The credential of the current request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Credential);

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let credential = req.extensions().get::<Credential>().cloned();
        ready(credential.map(AuthenticatedUser).ok_or_else(|| {
            ErrorUnauthorized("request did not pass the authentication filter")
        }))
    }
}

pub async fn require_credential(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<BoxBody>, actix_web::Error> {
    let auth = req
        .app_data::<Data<AuthConfig>>()
        .cloned()
        .ok_or_else(|| ErrorInternalServerError("authentication is not configured"))?;

    let Some(token) = transport::extract_token(req.request()) else {
        tracing::debug!("No authentication token presented");
        let response = auth.responses.respond(Outcome::NotAuthenticated);
        return Ok(req.into_response(response));
    };

    match auth.protocol.authorize(&token) {
        Ok(Decision::Accepted(credential)) => {
            tracing::info!(credential = %credential, "Received authentication token");
            req.extensions_mut().insert(credential);
            Ok(next.call(req).await?.map_into_boxed_body())
        }
        Ok(Decision::Renewed(issued)) => {
            let mut cookies = transport::expired_cookies(req.request(), &auth.cookies);
            cookies.push(transport::auth_cookie(
                &issued.token,
                &auth.cookies,
                issued.credential.timestamp(),
            ));
            req.extensions_mut().insert(issued.credential);

            let mut res = next.call(req).await?;
            for cookie in &cookies {
                res.response_mut().add_cookie(cookie)?;
            }
            Ok(res.map_into_boxed_body())
        }
        Err(AuthorizeError::Rejected(rejection)) => {
            tracing::warn!(error = %rejection, "Invalid authentication token received");
            let outcome = match rejection {
                Rejection::Expired { .. } => Outcome::AuthenticationExpired,
                Rejection::InvalidToken { .. } => Outcome::NotAuthenticated,
            };
            reject(req, &auth, outcome)
        }
        Err(AuthorizeError::Renewal(e)) => {
            tracing::error!(
                error.cause_chain = ?e,
                error.message = %e,
                "Failed to renew authentication token"
            );
            reject(req, &auth, Outcome::NotAuthenticated)
        }
    }
}

fn reject(
    req: ServiceRequest,
    auth: &AuthConfig,
    outcome: Outcome<'_>,
) -> Result<ServiceResponse<BoxBody>, actix_web::Error> {
    let mut response: HttpResponse = auth.responses.respond(outcome);
    for cookie in transport::expired_cookies(req.request(), &auth.cookies) {
        response.add_cookie(&cookie)?;
    }
    Ok(req.into_response(response))
}
