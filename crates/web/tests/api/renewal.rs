use signed_auth::{codec, Clock};

use crate::helpers::{
    assert_is_redirect_to, expired_cookie_names, issued_cookie_token, spawn_app,
    EXPIRY_TIMEOUT_MS, MINUTE_MS, RENEW_TIMEOUT_MS,
};

#[tokio::test]
async fn fresh_token_is_not_renewed() {
    let app = spawn_app().await;
    app.login_test_user().await;
    app.clock.advance_millis(RENEW_TIMEOUT_MS);

    let response = app.get_whoami().await;

    assert_eq!(200, response.status().as_u16());
    assert!(issued_cookie_token(&response).is_none());
}

#[tokio::test]
async fn old_token_is_renewed_with_a_new_cookie() {
    // Arrange
    let app = spawn_app().await;
    let original = codec::decode(&app.login_test_user().await).unwrap();
    app.clock.advance_millis(RENEW_TIMEOUT_MS + 1);

    // Act
    let response = app.get_whoami().await;

    // Assert
    assert_eq!(200, response.status().as_u16());
    let renewed = codec::decode(&issued_cookie_token(&response).expect("Token was not renewed"))
        .unwrap();
    assert_eq!(renewed.username(), original.username());
    assert_eq!(renewed.provider(), original.provider());
    assert_eq!(renewed.timestamp(), app.clock.now());
    assert_eq!(
        expired_cookie_names(&response),
        vec![format!("auth{}", original.timestamp().as_millis())]
    );
}

#[tokio::test]
async fn renewed_cookie_outlives_the_original_expiry() {
    let app = spawn_app().await;
    app.login_test_user().await;

    app.clock.advance_millis(RENEW_TIMEOUT_MS + 1);
    assert_eq!(200, app.get_whoami().await.status().as_u16());

    // Past the original token's expiry, within the renewed one's.
    app.clock
        .advance_millis(EXPIRY_TIMEOUT_MS - RENEW_TIMEOUT_MS + 5 * MINUTE_MS);
    let response = app.get_whoami().await;

    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn token_at_expiry_boundary_is_still_accepted() {
    let app = spawn_app().await;
    app.login_test_user().await;
    app.clock.advance_millis(EXPIRY_TIMEOUT_MS);

    let response = app.get_whoami().await;

    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn expired_token_redirects_and_clears_cookie() {
    // Arrange
    let app = spawn_app().await;
    let original = codec::decode(&app.login_test_user().await).unwrap();
    app.clock.advance_millis(EXPIRY_TIMEOUT_MS + 1);

    // Act - Part 1 - Expired
    let response = app.get_whoami().await;

    // Assert
    assert_is_redirect_to(&response, "/session-expired");
    assert_eq!(
        expired_cookie_names(&response),
        vec![format!("auth{}", original.timestamp().as_millis())]
    );

    // Act - Part 2 - Cookie is gone
    let response = app.get_whoami().await;
    assert_eq!(403, response.status().as_u16());
}
