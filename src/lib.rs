//! A small blocking HTTP convenience layer.
//!
//! Free functions in [`helpers`] and the [`Service`] object compose URLs,
//! encode bodies by content type, run the request on the crate's own
//! HTTP/1.1 transport and normalize what comes back into one [`Outcome`].
//!
//! ```no_run
//! use http_facade::{helpers, Call};
//!
//! let envelope = helpers::get("https://httpbin.org", "/get", Call::new().param("q", "rust"))?;
//! println!("{:?}", envelope.body);
//! # Ok::<(), http_facade::Failure>(())
//! ```

mod body;
mod connection;
mod error;
pub mod helpers;
mod options;
mod outcome;
mod proxy;
mod request;
mod response;
mod service;
mod transport;

use http::{Request, Response};

pub use body::{content_type, encode_body, json_decode_if_valid, Body, EncodedBody, Payload, FORM_URLENCODED};
pub use error::Error;
pub use helpers::Downloaded;
pub use options::{Options, DEFAULT_MAX_REDIRECTS};
pub use outcome::{Envelope, Failure, Outcome, SUCCESS_MESSAGE};
pub use proxy::{Proxy, ProxyKind};
pub use request::{endpoint, flatten_headers, layer_headers, set_header, Call, Headers, Params};
pub use response::{parse_header_block, ResponseHeaders, HTTP_STATUS};
pub use service::{Reply, Service};
pub use transport::TransferInfo;

pub struct HttpClient;

impl HttpClient {
    /// Sends one request and returns the response as received, without
    /// any of the facade's decoding or classification.
    pub async fn request<T>(request: &Request<T>, options: &Options) -> Result<Response<Vec<u8>>, Error>
    where
        T: AsRef<[u8]>,
    {
        let mut owned = Request::builder()
            .method(request.method().clone())
            .uri(request.uri().clone())
            .version(request.version())
            .body(request.body().as_ref().to_vec())?;
        *owned.headers_mut() = request.headers().clone();

        let raw = transport::exchange(owned, options, None).await?;
        let (head, body) = raw.raw.split_at(raw.header_size);

        let mut response = Response::builder()
            .status(raw.status)
            .version(raw.version)
            .body(body.to_vec())?;
        *response.headers_mut() = crate::response::header_map(&String::from_utf8_lossy(head));

        Ok(response)
    }
}
