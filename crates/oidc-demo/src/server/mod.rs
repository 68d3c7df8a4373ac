//! HTTPS server for the login flow.
//!
//! Serves the router over TLS (rustls) with the configured certificate and
//! key, or over plain HTTP when TLS is terminated elsewhere. Ctrl+C triggers
//! a graceful shutdown.

pub mod oauth;
pub mod router;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;

use crate::client::ProviderClient;
use crate::config::Config;
use oauth::OidcFlow;

/// Time given to in-flight requests once shutdown starts.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Relying-party server.
pub struct OidcServer {
    config: Arc<Config>,
    router: Router,
}

impl OidcServer {
    /// Create a server for a discovered provider.
    #[must_use]
    pub fn new(config: Arc<Config>, provider: ProviderClient) -> Self {
        let flow = Arc::new(OidcFlow::new(Arc::clone(&config), provider));
        let router = router::create_router(flow);

        Self { config, router }
    }

    fn addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.config.listen_port))
    }

    /// Run the server over HTTPS.
    ///
    /// # Errors
    ///
    /// Returns error if the certificate or key cannot be loaded, or the port cannot be bound.
    pub async fn run_tls(self) -> anyhow::Result<()> {
        let tls = RustlsConfig::from_pem_file(&self.config.cert_file, &self.config.key_file)
            .await
            .with_context(|| {
                format!(
                    "loading TLS certificate {} / key {}",
                    self.config.cert_file.display(),
                    self.config.key_file.display()
                )
            })?;

        let addr = self.addr();
        let handle = Handle::new();
        tokio::spawn(shutdown_signal(handle.clone()));

        tracing::info!("HTTPS server listening on https://{}/ ({})", self.config.host, addr);

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await
            .with_context(|| format!("serving on {addr}"))?;

        tracing::info!("HTTPS server shut down");
        Ok(())
    }

    /// Run the server over plain HTTP.
    ///
    /// # Errors
    ///
    /// Returns error if the port cannot be bound.
    pub async fn run_plain(self) -> anyhow::Result<()> {
        let addr = self.addr();
        let handle = Handle::new();
        tokio::spawn(shutdown_signal(handle.clone()));

        tracing::warn!("TLS disabled, HTTP server listening on http://{}", addr);

        axum_server::bind(addr)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await
            .with_context(|| format!("serving on {addr}"))?;

        tracing::info!("HTTP server shut down");
        Ok(())
    }

}

impl std::fmt::Debug for OidcServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcServer").field("addr", &self.addr()).finish()
    }
}

async fn shutdown_signal(handle: Handle) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C handler");
        return;
    }
    tracing::info!("Received shutdown signal");
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}
