use std::time::Duration;

use http::header::{InvalidHeaderName, InvalidHeaderValue, ToStrError};

/// Errors raised while talking to a server.
///
/// These never reach callers of the facade directly; they are folded into
/// [`crate::Failure`] by the response normalizer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Http(#[from] http::Error),

    #[error("invalid header name: {0}")]
    InvalidHeaderName(#[from] InvalidHeaderName),

    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] InvalidHeaderValue),

    #[error("header is not printable text: {0}")]
    HeaderToStr(#[from] ToStrError),

    #[error("malformed response: {0}")]
    Protocol(String),

    #[error("proxy handshake failed: {0}")]
    Proxy(String),

    #[error("could not resolve host: {0}")]
    Resolve(String),

    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Writing the response body into the caller's sink failed.
    #[error("failed writing received data: {0}")]
    Sink(std::io::Error),
}

impl Error {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol(message.into())
    }
}
