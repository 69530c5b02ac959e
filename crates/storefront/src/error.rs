//! Client construction errors.

use storefront_config::ConfigError;
use thiserror::Error;

/// Errors raised while building a [`Client`](crate::Client).
///
/// Errors from operations on a built client are [`SdkError`](storefront_core::SdkError)s.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The configuration did not validate.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client could not be created.
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for client construction.
pub type ClientResult<T> = Result<T, ClientError>;
