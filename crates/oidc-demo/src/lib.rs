//! OpenID Connect relying-party demo
//!
//! Redirects a browser to an identity provider, receives the authorization
//! code on the callback route, exchanges it for tokens and answers with the
//! user's claims as JSON.
//!
//! # Features
//!
//! - **Discovery**: endpoints read from the provider's `.well-known/openid-configuration`
//! - **One-time state**: a fresh CSRF state (plus PKCE verifier) per login, expiring after 10 minutes
//! - **Timeouts**: every provider call is bounded
//! - **Embeddable**: [`server::oauth::OidcFlow::install`] adds the two routes to any router
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use oidc_demo::{client::ProviderClient, config::Config, server::OidcServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Arc::new(Config::from_env()?);
//!     let provider = ProviderClient::discover(Arc::clone(&config)).await?;
//!
//!     OidcServer::new(config, provider).run_tls().await
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod pidfile;
pub mod server;

pub use client::ProviderClient;
pub use config::Config;
pub use error::{ClientError, ConfigError, FlowError};
