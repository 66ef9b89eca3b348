use std::sync::Arc;

use tokio::net::TcpListener;

use cairn_transport::Transport;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// Serves one transport over the mirror protocol.
pub struct MirrorServer {
    config: ServerConfig,
    state: AppState,
}

impl MirrorServer {
    pub fn new(config: ServerConfig, transport: Arc<dyn Transport>) -> Self {
        let state = AppState::new(transport, config.clone());
        Self { config, state }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Bind `bind_addr` and serve until the process exits.
    pub async fn serve(self) -> ServerResult<()> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve_on(listener).await
    }

    /// Serve on an already-bound listener.
    pub async fn serve_on(self, listener: TcpListener) -> ServerResult<()> {
        let addr = listener.local_addr()?;
        tracing::info!(
            %addr,
            transport = %self.state.transport.name(),
            "cairn mirror server listening"
        );
        axum::serve(listener, build_router(self.state))
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_transport::InMemoryTransport;

    #[test]
    fn server_construction() {
        let server = MirrorServer::new(ServerConfig::default(), Arc::new(InMemoryTransport::new()));
        assert_eq!(server.config().bind_addr, "127.0.0.1:3000".parse().unwrap());
    }

    #[tokio::test]
    async fn serve_on_accepts_connections() {
        let server = MirrorServer::new(ServerConfig::default(), Arc::new(InMemoryTransport::new()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(server.serve_on(listener));
        let stream = tokio::net::TcpStream::connect(addr).await;
        assert!(stream.is_ok());
    }
}
