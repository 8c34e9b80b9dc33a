//! Loopback HTTP endpoint serving the cached parameter.
//!
//! The function's own code calls `GET http://127.0.0.1:<port>/` and gets
//! `{"body": "<value>"}` back. Values come from the [`ParameterCache`] when
//! live, otherwise from the [`ParameterStore`], after which they are cached
//! for the configured TTL. Store failures become a 500 with the error text
//! as the body and are never cached.
//!
//! # Shutdown
//!
//! [`CachingParameterServer::serve`] runs until the shared
//! [`CancellationToken`] fires, then stops accepting and gives in-flight
//! requests the configured grace period (100 ms by default). Anything still
//! running after that is abandoned and the listener is dropped.

mod handler;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::ParameterCache;
use crate::config::ServerConfig;
use crate::store::ParameterStore;
use crate::{ExtensionError, Result};

pub use handler::ParameterResponse;

/// Shared state handed to every request.
#[derive(Clone)]
pub(crate) struct AppState {
    pub cache: Arc<ParameterCache>,
    pub store: Arc<dyn ParameterStore>,
    pub parameter_name: Arc<str>,
}

/// HTTP server answering GET requests with the cached parameter value.
pub struct CachingParameterServer {
    config: ServerConfig,
    state: AppState,
}

impl CachingParameterServer {
    /// Create a server for `parameter_name`.
    ///
    /// The cache key is the parameter name.
    pub fn new(
        config: ServerConfig,
        cache: Arc<ParameterCache>,
        store: Arc<dyn ParameterStore>,
        parameter_name: impl Into<String>,
    ) -> Self {
        Self {
            config,
            state: AppState {
                cache,
                store,
                parameter_name: Arc::from(parameter_name.into()),
            },
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router. `/` is the canonical route; any other GET path is
    /// answered the same way.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(handler::get_parameter))
            .route("/{*path}", get(handler::get_parameter))
            .with_state(self.state.clone())
    }

    /// Bind the loopback listener.
    ///
    /// A failure here is fatal: the function code depends on this endpoint.
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.address();
        TcpListener::bind(addr)
            .await
            .map_err(|source| ExtensionError::ServerBind { addr, source })
    }

    /// Bind and serve until `shutdown` is cancelled.
    pub async fn start(self, shutdown: CancellationToken) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` is cancelled.
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let grace = self.config.shutdown_grace();
        let app = self.router();
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, parameter = %self.state.parameter_name, "local endpoint listening");
        }

        let signal = shutdown.clone();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await
        });

        tokio::select! {
            joined = &mut server => return flatten(joined),
            _ = shutdown.cancelled() => {}
        }

        info!(grace_ms = grace.as_millis() as u64, "local endpoint shutting down");
        match tokio::time::timeout(grace, &mut server).await {
            Ok(joined) => flatten(joined),
            Err(_) => {
                server.abort();
                let err = ExtensionError::ShutdownTimeout(grace);
                warn!(error = %err, "closing local endpoint with requests in flight");
                Ok(())
            }
        }
    }
}

fn flatten(joined: std::result::Result<std::io::Result<()>, JoinError>) -> Result<()> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ExtensionError::Server(e.to_string())),
        Err(e) => Err(ExtensionError::Server(format!("server task failed: {e}"))),
    }
}
