use crate::helpers::spawn_app;

#[tokio::test]
async fn health_check_works() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app.get_healthcheck().await;

    // Assert
    assert!(response.status().is_success());
    assert_eq!(Some(0), response.content_length());
}

#[tokio::test]
async fn health_check_needs_no_token() {
    let app = spawn_app().await;

    let response = app.get_healthcheck().await;

    assert!(response.headers().get("Set-Cookie").is_none());
}
