use signed_auth::{codec, Clock};

use crate::helpers::{assert_is_redirect_to, issued_cookie_token, spawn_app, PROVIDER};

#[tokio::test]
async fn login_writes_a_token_signed_for_my_provider() {
    // Arrange
    let app = spawn_app().await;
    let body = serde_json::json!({
        "username": &app.test_user.username,
        "password": &app.test_user.password,
    });

    // Act
    let response = app.post_login(&body).await;

    // Assert
    assert_eq!(200, response.status().as_u16());
    let cookie_token = issued_cookie_token(&response).expect("No auth cookie was set");
    let token = response.text().await.unwrap();
    assert_eq!(token, cookie_token);

    let credential = codec::decode(&token).unwrap();
    assert_eq!(credential.username(), app.test_user.username);
    assert_eq!(credential.provider(), PROVIDER);
    assert!(credential.signature().is_some());
}

#[tokio::test]
async fn login_cookie_is_named_after_issue_time() {
    let app = spawn_app().await;

    let response = app
        .post_login(&serde_json::json!({
            "username": &app.test_user.username,
            "password": &app.test_user.password,
        }))
        .await;

    let cookie = response
        .cookies()
        .find(|c| c.name().starts_with("auth"))
        .expect("No auth cookie was set");
    assert_eq!(cookie.name(), format!("auth{}", app.clock.now().as_millis()));
    assert_eq!(cookie.path(), Some("/"));
    assert_eq!(cookie.max_age(), Some(std::time::Duration::from_secs(3600)));
}

#[tokio::test]
async fn login_accepts_query_parameters() {
    let app = spawn_app().await;

    let response = app
        .api_client
        .get(&format!("{}/login", &app.address))
        .query(&[
            ("username", app.test_user.username.as_str()),
            ("password", app.test_user.password.as_str()),
        ])
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    let token = response.text().await.unwrap();
    let credential = codec::decode(&token).unwrap();
    assert_eq!(credential.username(), app.test_user.username);
}

#[tokio::test]
async fn wrong_password_redirects_to_failure_page() {
    let app = spawn_app().await;

    let response = app
        .post_login(&serde_json::json!({
            "username": &app.test_user.username,
            "password": "not-the-password",
        }))
        .await;

    assert_is_redirect_to(&response, "/login-failed");
    assert!(issued_cookie_token(&response).is_none());
}

#[tokio::test]
async fn missing_username_is_treated_as_not_authenticated() {
    let app = spawn_app().await;
    let test_cases = vec![
        (serde_json::json!({ "password": "secret" }), "missing username"),
        (
            serde_json::json!({ "username": "", "password": "" }),
            "empty username",
        ),
    ];

    for (body, description) in test_cases {
        let response = app.post_login(&body).await;

        assert_eq!(
            403,
            response.status().as_u16(),
            "The API did not return 403 Forbidden for {}.",
            description
        );
    }
}

#[tokio::test]
async fn username_with_token_delimiter_is_refused() {
    let app = spawn_app().await;

    let response = app
        .post_login(&serde_json::json!({
            "username": "alice|Test",
            "password": "alice|Test",
        }))
        .await;

    assert_is_redirect_to(&response, "/login-failed");
    assert!(issued_cookie_token(&response).is_none());
}
