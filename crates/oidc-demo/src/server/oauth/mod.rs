//! OpenID Connect authorization-code login.
//!
//! Two routes drive the flow:
//! - `GET /` issues a fresh state and redirects to the provider
//! - `GET {callback}` redeems the state, exchanges the code and returns user info
//!
//! [`OidcFlow::install`] adds both routes to an existing router.

pub mod handlers;
pub mod store;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;

pub use store::StateStore;

use crate::client::ProviderClient;
use crate::config::{Config, defaults};

/// Shared state of the login flow.
#[derive(Debug)]
pub struct OidcFlow {
    pub config: Arc<Config>,
    pub provider: ProviderClient,
    pub states: StateStore,
}

impl OidcFlow {
    #[must_use]
    pub fn new(config: Arc<Config>, provider: ProviderClient) -> Self {
        let states = StateStore::new(config.state_ttl, defaults::STATE_MAX_ENTRIES);
        Self { config, provider, states }
    }

    /// Router serving the login and callback routes.
    pub fn routes(self: Arc<Self>) -> Router {
        let callback = self.config.callback_pattern.clone();

        Router::new()
            .route("/", get(handlers::handle_login))
            .route(&callback, get(handlers::handle_callback))
            .with_state(self)
    }

    /// Add the login and callback routes to `router`.
    pub fn install(self: Arc<Self>, router: Router) -> Router {
        router.merge(self.routes())
    }
}
