//! Remote parameter store capability.
//!
//! The caching server only needs "give me the value of this parameter", so
//! the store is a single-method trait. The production implementation talks
//! to AWS Systems Manager ([`SsmParameterStore`], `ssm` feature); tests plug
//! in counting mocks.
//!
//! # Errors
//!
//! Implementations report every failure as
//! [`ExtensionError::RemoteFetch`](crate::ExtensionError::RemoteFetch). Its
//! message is what the local caller sees in the 500 response body.

#[cfg(feature = "ssm")]
pub mod ssm;

use async_trait::async_trait;

use crate::Result;

#[cfg(feature = "ssm")]
pub use ssm::SsmParameterStore;

/// Source of parameter values.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Store name for logging/debugging.
    fn name(&self) -> &str;

    /// Fetch the current value of the named parameter.
    async fn get_parameter(&self, name: &str) -> Result<String>;
}
