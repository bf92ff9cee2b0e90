pub mod api;
pub mod error;

use crate::agent::ChatAgent;
use crate::cli::Args;
use self::api::{ router, AppState };

use axum_server::tls_rustls::RustlsConfig;
use log::info;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

pub struct Server {
    addr: String,
    agent: Arc<ChatAgent>,
    args: Args,
}

impl Server {
    pub fn new(addr: String, agent: Arc<ChatAgent>, args: Args) -> Self {
        Self { addr, agent, args }
    }

    /// Serves until the listener fails.
    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr = self.addr.parse::<SocketAddr>()?;
        let app = router(AppState::new(Arc::clone(&self.agent), self.args.rate_limit_per_second));

        if self.args.enable_tls {
            let (cert_path, key_path) = match (&self.args.tls_cert_path, &self.args.tls_key_path) {
                (Some(cert), Some(key)) => (cert, key),
                _ => {
                    return Err("TLS is enabled but --tls-cert-path or --tls-key-path is missing".into());
                }
            };

            // several providers may be compiled in; pick one before building configs
            let _ = rustls::crypto::ring::default_provider().install_default();
            let tls_config = RustlsConfig::from_pem_file(cert_path, key_path).await.map_err(|e|
                format!("Failed to load TLS certificate '{}' / key '{}': {}", cert_path, key_path, e)
            )?;

            info!("HTTPS server listening on https://{}", addr);
            axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service()).await?;
        } else {
            let listener = tokio::net::TcpListener
                ::bind(addr).await
                .map_err(|e| format!("Failed to bind HTTP server to {}: {}", addr, e))?;

            info!("HTTP server listening on http://{}", addr);
            axum::serve(listener, app.into_make_service()).await?;
        }

        Ok(())
    }
}
