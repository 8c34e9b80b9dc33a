//! parameter-extension - Lambda extension serving a cached SSM parameter
//!
//! The extension runs next to the function in the same execution
//! environment. It registers with the host's extensions API, long-polls for
//! INVOKE/SHUTDOWN events to stay alive, and exposes a loopback HTTP
//! endpoint from which the function reads one parameter. The value is
//! fetched from the parameter store on first use and cached for 30 seconds.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use parameter_extension::{Config, Extension, LifecycleClient, ParameterStore, Result};
//! use tokio_util::sync::CancellationToken;
//!
//! // Any backend works; the `ssm` feature provides `SsmParameterStore`.
//! struct StaticStore;
//!
//! #[async_trait]
//! impl ParameterStore for StaticStore {
//!     fn name(&self) -> &str {
//!         "static"
//!     }
//!
//!     async fn get_parameter(&self, _name: &str) -> Result<String> {
//!         Ok("parameter-value".to_string())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::default();
//!     let runtime_api = std::env::var("AWS_LAMBDA_RUNTIME_API").unwrap_or_default();
//!     let client = LifecycleClient::new(&runtime_api);
//!
//!     let shutdown = CancellationToken::new();
//!     parameter_extension::runner::cancel_on_signal(shutdown.clone());
//!
//!     let reason = Extension::new(client, Arc::new(StaticStore), config)
//!         .run(shutdown)
//!         .await?;
//!     println!("stopped: {reason:?}");
//!     Ok(())
//! }
//! ```
//!
//! From the function, the value is one request away:
//!
//! ```text
//! $ curl -s http://127.0.0.1:2772/
//! {"body":"parameter-value"}
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod runner;
pub mod server;
pub mod store;
pub mod telemetry;
pub mod version;

// Re-export main types at crate root
pub use cache::{CacheConfig, ParameterCache};
pub use config::{Config, ServerConfig};
pub use error::{ExtensionError, Result};
pub use lifecycle::{EventType, LifecycleClient, LifecycleEvent, LifecycleState, RegistrationInfo};
pub use runner::{Extension, ShutdownReason};
pub use server::{CachingParameterServer, ParameterResponse};
pub use store::ParameterStore;
#[cfg(feature = "ssm")]
pub use store::SsmParameterStore;
pub use version::{PKG_VERSION, version_string};
