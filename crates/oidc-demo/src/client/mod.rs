//! OpenID Connect provider client.
//!
//! Provides async HTTP client with:
//! - Discovery of the provider's endpoints, retried with exponential backoff
//! - Authorization request URLs and code-for-token exchange through `oauth2`,
//!   sent over the same HTTP client and never retried
//! - User-info fetch, never retried
//! - Request and connect timeouts on every call

mod types;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, HttpRequest, HttpResponse, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl,
    Scope, TokenResponse, TokenUrl,
};
use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderValue};
use reqwest_middleware::ClientBuilder;
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use url::Url;

pub use types::ProviderMetadata;

use crate::config::Config;
use crate::error::{ClientError, ClientResult};

/// `oauth2` client with authorization and token endpoints set.
type OAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Path of the discovery document below the provider URL.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Client for one identity provider and one registered redirect URI.
#[derive(Clone)]
pub struct ProviderClient {
    /// HTTP client (timeouts, no retries).
    client: Client,

    /// Authorization URL and token exchange.
    oauth: OAuthClient,

    /// Relying-party configuration.
    config: Arc<Config>,

    /// Discovery document as received.
    metadata: ProviderMetadata,

    userinfo_endpoint: Url,
}

impl ProviderClient {
    /// Fetch the provider's discovery document and build a client from it.
    ///
    /// # Errors
    ///
    /// Returns error if the document cannot be fetched or lacks a usable endpoint.
    pub async fn discover(config: Arc<Config>) -> ClientResult<Self> {
        let client = build_http_client(&config)?;
        let metadata = fetch_metadata(&client, &config).await?;
        Self::with_client(client, config, metadata)
    }

    /// Build a client from already known provider metadata.
    ///
    /// # Errors
    ///
    /// Returns error if an endpoint URL is invalid or user info is not advertised.
    pub fn from_metadata(config: Arc<Config>, metadata: ProviderMetadata) -> ClientResult<Self> {
        let client = build_http_client(&config)?;
        Self::with_client(client, config, metadata)
    }

    fn with_client(
        client: Client,
        config: Arc<Config>,
        metadata: ProviderMetadata,
    ) -> ClientResult<Self> {
        let authorization_endpoint = parse_endpoint(&metadata.authorization_endpoint)?;
        let token_endpoint = parse_endpoint(&metadata.token_endpoint)?;
        let userinfo_endpoint = match metadata.userinfo_endpoint.as_deref() {
            Some(url) => parse_endpoint(url)?,
            None => {
                return Err(ClientError::InvalidResponse(
                    "provider does not advertise a userinfo_endpoint".to_string(),
                ));
            }
        };

        let redirect_url = RedirectUrl::new(config.callback_url.clone()).map_err(|source| {
            ClientError::InvalidUrl { url: config.callback_url.clone(), source }
        })?;

        let oauth = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_uri(AuthUrl::from_url(authorization_endpoint))
            .set_token_uri(TokenUrl::from_url(token_endpoint))
            .set_redirect_uri(redirect_url)
            .set_auth_type(AuthType::BasicAuth);

        if !metadata.scopes_supported.is_empty() {
            for scope in config.scopes.iter().filter(|s| !metadata.scopes_supported.contains(*s)) {
                tracing::warn!(scope = %scope, "Requested scope not advertised by provider");
            }
        }

        Ok(Self { client, oauth, config, metadata, userinfo_endpoint })
    }

    /// Discovery document the client was built from.
    #[must_use]
    pub const fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    /// Build the authorization request URL for one login attempt.
    ///
    /// Parameters are appended to any query already present on the endpoint.
    #[must_use]
    pub fn authorization_url(&self, state: &str, pkce_challenge: PkceCodeChallenge) -> Url {
        let csrf = CsrfToken::new(state.to_string());
        let (url, _) = self
            .oauth
            .authorize_url(|| csrf)
            .add_scopes(self.config.scopes.iter().cloned().map(Scope::new))
            .set_pkce_challenge(pkce_challenge)
            .url();
        url
    }

    /// Exchange an authorization code for tokens.
    ///
    /// Client credentials are sent with HTTP Basic authentication.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, timeout, an OAuth error response,
    /// malformed body, or a response without an access token.
    pub async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: PkceCodeVerifier,
    ) -> ClientResult<BasicTokenResponse> {
        let http_client = OAuthHttpClient(self);

        let token = self
            .oauth
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(pkce_verifier)
            .request_async(&http_client)
            .await
            .map_err(ClientError::from_token_request)?;

        if token.access_token().secret().is_empty() {
            return Err(ClientError::MissingAccessToken);
        }

        tracing::debug!(
            token_type = ?token.token_type(),
            expires_in = ?token.expires_in(),
            has_refresh_token = token.refresh_token().is_some(),
            "Exchanged authorization code"
        );
        Ok(token)
    }

    /// Fetch the user's claims from the user-info endpoint.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, timeout, non-2xx status, or a body
    /// that is not a JSON object.
    pub async fn user_info(&self, access_token: &str) -> ClientResult<serde_json::Value> {
        let response = self
            .client
            .get(self.userinfo_endpoint.clone())
            .bearer_auth(access_token)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let body = self.read_body(response).await?;
        let claims: serde_json::Value = serde_json::from_str(&body)?;

        if !claims.is_object() {
            return Err(ClientError::InvalidResponse("user info is not a JSON object".to_string()));
        }
        Ok(claims)
    }

    /// Send an `oauth2` request over the shared HTTP client.
    async fn execute(&self, request: HttpRequest) -> ClientResult<HttpResponse> {
        let (parts, body) = request.into_parts();

        let response = self
            .client
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers)
            .body(body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| self.classify(e))?;

        let mut http_response = HttpResponse::new(body.to_vec());
        *http_response.status_mut() = status;
        *http_response.headers_mut() = headers;
        Ok(http_response)
    }

    fn classify(&self, err: reqwest::Error) -> ClientError {
        ClientError::from_reqwest(err, self.config.request_timeout)
    }

    async fn read_body(&self, response: reqwest::Response) -> ClientResult<String> {
        let response = handle_response(response).await?;
        response.text().await.map_err(|e| self.classify(e))
    }
}

/// Sends `oauth2` requests through [`ProviderClient::execute`].
struct OAuthHttpClient<'a>(&'a ProviderClient);

impl<'c> oauth2::AsyncHttpClient<'c> for OAuthHttpClient<'_> {
    type Error = ClientError;
    type Future = Pin<Box<dyn Future<Output = ClientResult<HttpResponse>> + Send + 'c>>;

    fn call(&'c self, request: HttpRequest) -> Self::Future {
        Box::pin(self.0.execute(request))
    }
}

impl std::fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClient")
            .field("issuer", &self.metadata.issuer)
            .field("client_id", &self.config.client_id)
            .finish()
    }
}

/// `{provider_url}/.well-known/openid-configuration`, tolerating a trailing slash.
#[must_use]
pub fn discovery_url(provider_url: &str) -> String {
    format!("{}{}", provider_url.trim_end_matches('/'), DISCOVERY_PATH)
}

fn build_http_client(config: &Config) -> ClientResult<Client> {
    Client::builder()
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(ClientError::Http)
}

async fn fetch_metadata(client: &Client, config: &Config) -> ClientResult<ProviderMetadata> {
    let retry_policy = ExponentialBackoff::builder()
        .retry_bounds(Duration::from_millis(500), Duration::from_secs(10))
        .build_with_max_retries(config.discovery_retries);

    let client = ClientBuilder::new(client.clone())
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build();

    let url = discovery_url(&config.provider_url);
    tracing::debug!(url = %url, "Fetching discovery document");

    let response = client
        .get(&url)
        .header(ACCEPT, HeaderValue::from_static("application/json"))
        .send()
        .await
        .map_err(|e| ClientError::from_middleware(e, config.request_timeout))?;

    let response = handle_response(response).await?;
    let body = response
        .text()
        .await
        .map_err(|e| ClientError::from_reqwest(e, config.request_timeout))?;
    let metadata: ProviderMetadata = serde_json::from_str(&body)?;

    // Same check as OpenID Connect Discovery 1.0 §4.3
    if metadata.issuer.trim_end_matches('/') != config.provider_url.trim_end_matches('/') {
        return Err(ClientError::InvalidResponse(format!(
            "issuer '{}' does not match provider URL '{}'",
            metadata.issuer, config.provider_url
        )));
    }

    Ok(metadata)
}

fn parse_endpoint(url: &str) -> ClientResult<Url> {
    Url::parse(url).map_err(|source| ClientError::InvalidUrl { url: url.to_string(), source })
}

/// Turn non-2xx responses into errors carrying the response body.
async fn handle_response(response: reqwest::Response) -> ClientResult<reqwest::Response> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    Err(ClientError::status(status.as_u16(), text))
}
