//! Wire and domain types of the extensions API.

use serde::{Deserialize, Serialize};

/// Type of a lifecycle event delivered by `/event/next`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Invoke,
    Shutdown,
}

impl EventType {
    /// Lowercase label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Invoke => "invoke",
            EventType::Shutdown => "shutdown",
        }
    }
}

/// Result of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationInfo {
    pub function_name: String,
    pub function_version: String,
    pub handler: String,
    /// Correlation token from the `Lambda-Extension-Identifier` header.
    pub extension_id: String,
}

/// A single event from the host. Consumed once by the poll loop.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    pub event_type: EventType,
    #[serde(default)]
    pub deadline_ms: i64,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub invoked_function_arn: String,
    /// Present on SHUTDOWN events (`spindown`, `timeout`, `failure`).
    #[serde(default)]
    pub shutdown_reason: Option<String>,
}

impl LifecycleEvent {
    pub fn is_shutdown(&self) -> bool {
        self.event_type == EventType::Shutdown
    }
}

/// Where the client is in the registration/polling protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unregistered,
    Registered,
    /// Terminal: the host sends nothing after SHUTDOWN.
    ShutdownObserved,
}

#[derive(Serialize)]
pub(crate) struct RegisterRequest<'a> {
    pub events: &'a [EventType],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegisterResponse {
    pub function_name: String,
    pub function_version: String,
    pub handler: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ErrorReport<'a> {
    pub error_message: &'a str,
    pub error_type: &'a str,
    pub stack_trace: &'a [String],
}
