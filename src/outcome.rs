//! The one result shape every facade call returns.
//!
//! A call either yields an [`Envelope`] (status 200) or a [`Failure`]. The
//! two failure families that come off the wire stay apart:
//! [`Failure::Transport`] when no usable response arrived at all, and
//! [`Failure::Status`] when the server answered with anything but 200.

use crate::body::{inflate_gzip, json_decode_if_valid, Body};
use crate::error::Error;
use crate::response::{parse_header_block, ResponseHeaders};
use crate::transport::{RawResponse, TransferInfo};

pub const SUCCESS_MESSAGE: &str = "The operation was successful.";

pub type Outcome = Result<Envelope, Failure>;

/// Everything known about a successful exchange.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub code: u16,
    pub message: String,
    pub body: Body,
    pub response_headers: ResponseHeaders,
    pub info: TransferInfo,
    /// The `Name: value` lines that were sent.
    pub request_headers: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum Failure {
    /// Connection, DNS, TLS, proxy or framing trouble.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The server answered, but not with 200.
    #[error("server answered with status {code}")]
    Status {
        code: u16,
        body: Body,
        response_headers: ResponseHeaders,
        info: TransferInfo,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl Failure {
    /// The HTTP status for [`Failure::Status`], `None` otherwise.
    pub fn status(&self) -> Option<u16> {
        match self {
            Failure::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Failure::Transport { .. })
    }
}

impl From<Error> for Failure {
    fn from(error: Error) -> Self {
        match error {
            Error::Sink(e) => Failure::Io(e),
            other => Failure::Transport {
                message: other.to_string(),
            },
        }
    }
}

/// Turns the transport's output into an [`Outcome`].
pub fn normalize(result: Result<RawResponse, Error>, decode_json: bool, request_headers: Vec<String>) -> Outcome {
    let raw = result?;

    let split = raw.header_size.min(raw.raw.len());
    let (head, rest) = raw.raw.split_at(split);
    let response_headers = parse_header_block(&String::from_utf8_lossy(head));

    let gzipped = response_headers
        .get("content-encoding")
        .is_some_and(|encoding| encoding.to_ascii_lowercase().contains("gzip"));
    let body = if gzipped && !rest.is_empty() {
        inflate_gzip(rest).unwrap_or_else(|e| {
            log::warn!("gzip body could not be inflated, keeping it as received: {e}");
            rest.to_vec()
        })
    } else {
        rest.to_vec()
    };

    if raw.status != 200 {
        return Err(Failure::Status {
            code: raw.status,
            body: Body::Raw(body),
            response_headers,
            info: raw.info,
        });
    }

    let body = if decode_json {
        json_decode_if_valid(body)
    } else {
        Body::Raw(body)
    };

    Ok(Envelope {
        code: raw.status,
        message: SUCCESS_MESSAGE.to_string(),
        body,
        response_headers,
        info: raw.info,
        request_headers,
    })
}
