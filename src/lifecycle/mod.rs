//! Client for the host's extensions API.
//!
//! The protocol is a small state machine:
//!
//! ```text
//! Unregistered --register--> Registered --next_event(INVOKE)--> Registered
//!                                       --next_event(SHUTDOWN)--> ShutdownObserved
//! ```
//!
//! `register` must succeed exactly once before polling. The identifier the
//! host returns in `Lambda-Extension-Identifier` is attached to every later
//! request. `next_event` is a deliberate long-poll: the host holds the
//! request open until the next invocation, which can take minutes, so the
//! HTTP client carries no request timeout and the call is bounded only by
//! the caller's [`CancellationToken`].
//!
//! See: <https://docs.aws.amazon.com/lambda/latest/dg/runtimes-extensions-api.html>

pub mod types;

use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::DEFAULT_EXTENSION_NAME;
use crate::{ExtensionError, Result};

pub use types::{EventType, LifecycleEvent, LifecycleState, RegistrationInfo};
use types::{ErrorReport, RegisterRequest, RegisterResponse};

/// Path prefix of the extensions API, relative to the runtime API host.
pub const EXTENSION_API_PATH: &str = "/2020-01-01/extension";

pub const EXTENSION_NAME_HEADER: &str = "Lambda-Extension-Name";
pub const EXTENSION_ID_HEADER: &str = "Lambda-Extension-Identifier";
pub const EXTENSION_ERROR_TYPE_HEADER: &str = "Lambda-Extension-Function-Error-Type";

/// Events this extension subscribes to.
const SUBSCRIBED_EVENTS: &[EventType] = &[EventType::Invoke, EventType::Shutdown];

/// Client for `register`, `event/next` and `init/error`.
///
/// Owns the registration identifier for the lifetime of the process.
pub struct LifecycleClient {
    http: Client,
    base_url: String,
    extension_name: String,
    extension_id: Option<String>,
    state: LifecycleState,
}

impl LifecycleClient {
    /// Create a client for the runtime API at `runtime_api` (`host:port`, as
    /// found in `AWS_LAMBDA_RUNTIME_API`).
    pub fn new(runtime_api: &str) -> Self {
        Self::with_base_url(format!("http://{runtime_api}{EXTENSION_API_PATH}"))
    }

    /// Create a client with a full base URL (for testing with wiremock).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            extension_name: DEFAULT_EXTENSION_NAME.to_string(),
            extension_id: None,
            state: LifecycleState::Unregistered,
        }
    }

    /// Set the name sent in `Lambda-Extension-Name`.
    pub fn extension_name(mut self, name: impl Into<String>) -> Self {
        self.extension_name = name.into();
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Identifier returned by the host, once registered.
    pub fn extension_id(&self) -> Option<&str> {
        self.extension_id.as_deref()
    }

    /// Register for INVOKE and SHUTDOWN events.
    ///
    /// Returns [`ExtensionError::Cancelled`] if `cancel` fires before the
    /// host answers; the client stays unregistered.
    pub async fn register(&mut self, cancel: &CancellationToken) -> Result<RegistrationInfo> {
        if self.state != LifecycleState::Unregistered {
            return Err(ExtensionError::AlreadyRegistered);
        }

        let url = format!("{}/register", self.base_url);
        let request = self
            .http
            .post(&url)
            .header(EXTENSION_NAME_HEADER, &self.extension_name)
            .json(&RegisterRequest {
                events: SUBSCRIBED_EVENTS,
            })
            .send();

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ExtensionError::Cancelled),
            response = request => response.map_err(|e| ExtensionError::Registration(e.to_string()))?,
        };

        if response.status() != StatusCode::OK {
            return Err(ExtensionError::Registration(format!(
                "request failed with status {}",
                response.status()
            )));
        }

        let extension_id = response
            .headers()
            .get(EXTENSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                ExtensionError::Registration(format!("response is missing {EXTENSION_ID_HEADER}"))
            })?;

        let body: RegisterResponse = tokio::select! {
            _ = cancel.cancelled() => return Err(ExtensionError::Cancelled),
            body = response.json() => body
                .map_err(|e| ExtensionError::Registration(format!("malformed response body: {e}")))?,
        };

        let info = RegistrationInfo {
            function_name: body.function_name,
            function_version: body.function_version,
            handler: body.handler,
            extension_id: extension_id.clone(),
        };

        info!(
            extension = %self.extension_name,
            function = %info.function_name,
            version = %info.function_version,
            "extension registered"
        );
        self.extension_id = Some(extension_id);
        self.state = LifecycleState::Registered;
        Ok(info)
    }

    /// Block until the host delivers the next event or `cancel` fires.
    ///
    /// Returns [`ExtensionError::Cancelled`] if the token fires first; the
    /// outstanding request is dropped.
    pub async fn next_event(&mut self, cancel: &CancellationToken) -> Result<LifecycleEvent> {
        let extension_id = match self.state {
            LifecycleState::Unregistered => return Err(ExtensionError::NotRegistered),
            LifecycleState::ShutdownObserved => return Err(ExtensionError::Terminated),
            LifecycleState::Registered => self
                .extension_id
                .clone()
                .ok_or(ExtensionError::NotRegistered)?,
        };

        let url = format!("{}/event/next", self.base_url);
        let request = self
            .http
            .get(&url)
            .header(EXTENSION_ID_HEADER, extension_id)
            .send();

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ExtensionError::Cancelled),
            response = request => response.map_err(|e| ExtensionError::Poll(e.to_string()))?,
        };

        if response.status() != StatusCode::OK {
            return Err(ExtensionError::Poll(format!(
                "request failed with status {}",
                response.status()
            )));
        }

        let event: LifecycleEvent = tokio::select! {
            _ = cancel.cancelled() => return Err(ExtensionError::Cancelled),
            body = response.json() => {
                body.map_err(|e| ExtensionError::Poll(format!("malformed event body: {e}")))?
            }
        };

        debug!(
            event = event.event_type.as_str(),
            request_id = %event.request_id,
            deadline_ms = event.deadline_ms,
            "received lifecycle event"
        );
        if event.is_shutdown() {
            self.state = LifecycleState::ShutdownObserved;
        }
        Ok(event)
    }

    /// Report a failure during initialisation. The host then shuts the
    /// execution environment down.
    pub async fn report_init_error(&self, error_type: &str, message: &str) -> Result<()> {
        let extension_id = self
            .extension_id
            .as_deref()
            .ok_or(ExtensionError::NotRegistered)?;

        let url = format!("{}/init/error", self.base_url);
        let response = self
            .http
            .post(&url)
            .header(EXTENSION_ID_HEADER, extension_id)
            .header(EXTENSION_ERROR_TYPE_HEADER, error_type)
            .json(&ErrorReport {
                error_message: message,
                error_type,
                stack_trace: &[],
            })
            .send()
            .await
            .map_err(|e| ExtensionError::ErrorReport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ExtensionError::ErrorReport(format!(
                "request failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
