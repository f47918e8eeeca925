use tokio::net::TcpListener;

use crate::config::ConsoleConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// The console's HTTP server.
pub struct DocdeskServer {
    state: AppState,
}

impl DocdeskServer {
    /// Server over the file-backed registry named in `config`.
    pub fn new(config: ConsoleConfig) -> Self {
        Self {
            state: AppState::new(config),
        }
    }

    pub fn with_state(state: AppState) -> Self {
        Self { state }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.state.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Start serving requests until the process receives Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let addr = self.state.config.bind_addr;
        let app = build_router(self.state);
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("docdesk listening on http://{addr}");
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("shutting down");
            })
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}
