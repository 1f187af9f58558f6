//! API server.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use mediaforge_config::ServerConfig;

use crate::routes::create_router;
use crate::state::AppState;

/// The HTTP server wrapping the application router.
pub struct ApiServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// The bind address.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Bind and serve until `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F) -> Result<(), Box<dyn std::error::Error>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = create_router(self.state.clone());
        let addr: SocketAddr = self.addr().parse()?;
        let listener = TcpListener::bind(addr).await?;
        info!("api server listening on {addr}");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addr_format() {
        let config = ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 9090,
        };
        // Address formatting is all that is constructible without the full
        // dependency graph; routing is covered by handler tests.
        assert_eq!(format!("{}:{}", config.host, config.port), "0.0.0.0:9090");
    }
}
