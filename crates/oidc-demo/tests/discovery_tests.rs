//! Provider discovery against a mock identity provider.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use oidc_demo::client::{ProviderClient, discovery_url};
use oidc_demo::config::Config;
use oidc_demo::error::ClientError;

fn document(issuer: &str) -> serde_json::Value {
    json!({
        "issuer": issuer,
        "authorization_endpoint": format!("{issuer}/auth"),
        "token_endpoint": format!("{issuer}/token"),
        "userinfo_endpoint": format!("{issuer}/userinfo")
    })
}

async fn discover(config: Config) -> Result<ProviderClient, ClientError> {
    ProviderClient::discover(Arc::new(config)).await
}

#[tokio::test]
async fn test_discovery_reads_endpoints() {
    let mock_server = MockServer::start().await;
    let issuer = format!("{}/realms/master", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/realms/master/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(document(&issuer)))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Trailing slash on the configured URL is tolerated
    let client = discover(Config::for_testing(&format!("{issuer}/"))).await.unwrap();

    let metadata = client.metadata();
    assert_eq!(metadata.issuer, issuer);
    assert_eq!(metadata.token_endpoint, format!("{issuer}/token"));
    assert_eq!(metadata.userinfo_endpoint.as_deref(), Some(format!("{issuer}/userinfo").as_str()));
}

#[tokio::test]
async fn test_discovery_failure_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(404).set_body_string("realm not found"))
        .mount(&mock_server)
        .await;

    let err = discover(Config::for_testing(&mock_server.uri())).await.unwrap_err();
    assert!(
        matches!(err, ClientError::UnexpectedStatus { status: 404, ref message } if message.contains("realm")),
        "{err}"
    );
}

#[tokio::test]
async fn test_discovery_malformed_document() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&mock_server)
        .await;

    let err = discover(Config::for_testing(&mock_server.uri())).await.unwrap_err();
    assert!(matches!(err, ClientError::Parse(_)), "{err}");
}

#[tokio::test]
async fn test_discovery_rejects_foreign_issuer() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(document("https://other-idp.example.com")),
        )
        .mount(&mock_server)
        .await;

    let err = discover(Config::for_testing(&mock_server.uri())).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidResponse(_)), "{err}");
    assert!(err.to_string().contains("does not match"));
}

#[tokio::test]
async fn test_discovery_timeout_is_distinct() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(document(&mock_server.uri()))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let mut config = Config::for_testing(&mock_server.uri());
    config.request_timeout = Duration::from_millis(200);

    let err = discover(config).await.unwrap_err();
    assert!(err.is_timeout(), "{err}");
}

#[tokio::test]
async fn test_discovery_retries_transient_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(document(&mock_server.uri())))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = Config::for_testing(&mock_server.uri());
    config.discovery_retries = 2;

    let client = discover(config).await.unwrap();
    assert_eq!(client.metadata().issuer, mock_server.uri());
}

#[tokio::test]
async fn test_unreachable_provider() {
    // Nothing listens on port 9 (discard) in the test environment
    let err = discover(Config::for_testing("http://127.0.0.1:9")).await.unwrap_err();
    assert!(matches!(err, ClientError::Http(_) | ClientError::Middleware(_)), "{err}");
}

#[test]
fn test_discovery_url() {
    assert_eq!(
        discovery_url("http://keycloak.test.com:8080/auth/realms/master"),
        "http://keycloak.test.com:8080/auth/realms/master/.well-known/openid-configuration"
    );
}
