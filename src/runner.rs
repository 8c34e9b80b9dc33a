//! Extension orchestration: startup sequence, event loop, coordinated shutdown.
//!
//! [`Extension::run`] owns the process lifecycle:
//!
//! 1. register with the host (failure is fatal, cancellation returns early);
//! 2. bind the local endpoint (failure is reported to the host, then fatal);
//! 3. start the server and the cache sweeper in the background;
//! 4. long-poll for events until SHUTDOWN or cancellation;
//! 5. cancel the shared token and wait for the server's bounded shutdown.
//!
//! The [`CancellationToken`] passed in is the only shutdown signal. The
//! signal handler ([`cancel_on_signal`]) writes to it, the poll loop and the
//! server observe it.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::ParameterCache;
use crate::config::Config;
use crate::lifecycle::{EventType, LifecycleClient};
use crate::server::CachingParameterServer;
use crate::store::ParameterStore;
use crate::{ExtensionError, Result, telemetry};

/// Why the event loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The host delivered a SHUTDOWN event.
    HostShutdown,
    /// The shared token was cancelled (SIGTERM/SIGINT, or by the embedder).
    Signal,
}

/// The assembled extension, ready to run.
pub struct Extension {
    client: LifecycleClient,
    store: Arc<dyn ParameterStore>,
    config: Config,
}

impl Extension {
    pub fn new(client: LifecycleClient, store: Arc<dyn ParameterStore>, config: Config) -> Self {
        Self {
            client,
            store,
            config,
        }
    }

    /// Run until the host shuts the environment down or `shutdown` fires.
    ///
    /// Returns an error only for the fatal startup failures (registration,
    /// binding the local endpoint). Once registered, the token is cancelled
    /// and the server has stopped by the time this returns.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<ShutdownReason> {
        match self.client.register(&shutdown).await {
            Ok(_) => {}
            Err(ExtensionError::Cancelled) => {
                info!("cancelled during registration");
                return Ok(ShutdownReason::Signal);
            }
            Err(e) => return Err(e),
        }

        let cache = Arc::new(ParameterCache::new(&self.config.cache_config()));
        let server = CachingParameterServer::new(
            self.config.server.clone(),
            Arc::clone(&cache),
            Arc::clone(&self.store),
            self.config.parameter.name.clone(),
        );

        let listener = match server.bind().await {
            Ok(listener) => listener,
            Err(e) => {
                if let Err(report) = self
                    .client
                    .report_init_error(e.error_type(), &e.to_string())
                    .await
                {
                    warn!(error = %report, "failed to report init error to host");
                }
                shutdown.cancel();
                return Err(e);
            }
        };

        let sweeper = Arc::clone(&cache).spawn_sweeper(shutdown.child_token());
        let server_task = tokio::spawn(server.serve(listener, shutdown.child_token()));

        let reason = self.process_events(&shutdown).await;
        info!(?reason, "event loop stopped");

        shutdown.cancel();
        join_server(server_task).await;
        if let Err(e) = sweeper.await {
            debug!(error = %e, "cache sweeper ended abnormally");
        }
        Ok(reason)
    }

    async fn process_events(&mut self, shutdown: &CancellationToken) -> ShutdownReason {
        loop {
            if shutdown.is_cancelled() {
                return ShutdownReason::Signal;
            }

            match self.client.next_event(shutdown).await {
                Ok(event) => {
                    metrics::counter!(telemetry::EVENTS_TOTAL, "event" => event.event_type.as_str())
                        .increment(1);
                    match event.event_type {
                        EventType::Invoke => {
                            debug!(request_id = %event.request_id, "invoke");
                        }
                        EventType::Shutdown => {
                            info!(
                                reason = event.shutdown_reason.as_deref().unwrap_or("unknown"),
                                "shutdown event received"
                            );
                            return ShutdownReason::HostShutdown;
                        }
                    }
                }
                Err(ExtensionError::Cancelled) => return ShutdownReason::Signal,
                // Cannot happen after a SHUTDOWN return above, but never poll again.
                Err(ExtensionError::Terminated) => return ShutdownReason::HostShutdown,
                Err(e) => {
                    metrics::counter!(telemetry::POLL_ERRORS_TOTAL).increment(1);
                    warn!(error = %e, "error while getting next event");
                }
            }
        }
    }
}

async fn join_server(task: JoinHandle<Result<()>>) {
    match task.await {
        Ok(Ok(())) => info!("local endpoint stopped"),
        Ok(Err(e)) => error!(error = %e, "local endpoint failed"),
        Err(e) => error!(error = %e, "local endpoint task panicked"),
    }
}

/// Cancel `token` on SIGINT or SIGTERM (ctrl-c only on non-unix).
///
/// The spawned task only ever writes to the token. It ends quietly if the
/// token is cancelled by someone else first, or if the handlers cannot be
/// installed (the host's SHUTDOWN event still stops the extension).
pub fn cancel_on_signal(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            signal = shutdown_signal() => match signal {
                Ok(name) => {
                    info!(signal = name, "extension stopping");
                    token.cancel();
                }
                Err(e) => error!(error = %e, "failed to listen for shutdown signals"),
            },
        }
    })
}

async fn shutdown_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate())?;
        let mut interrupt = signal(SignalKind::interrupt())?;
        tokio::select! {
            _ = terminate.recv() => Ok("SIGTERM"),
            _ = interrupt.recv() => Ok("SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("ctrl-c")
    }
}
