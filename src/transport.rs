use std::io::Write;
use std::time::{Duration, Instant};

use async_io::Timer;
use futures_lite::{future, io::BufReader, AsyncWriteExt};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION, TRANSFER_ENCODING};
use http::{Method, Request, StatusCode, Uri, Version};

use crate::connection::AsyncConnectionFactory;
use crate::error::Error;
use crate::options::Options;
use crate::request::serialize_http_request;
use crate::response::{has_body, header_map, parse_response_status_line, read_header_block, read_response_body};

/// Transfer diagnostics reported alongside every response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferInfo {
    /// Final URL, after any redirects.
    pub url: String,
    pub http_code: u16,
    pub header_size: usize,
    /// Body bytes received on the final hop.
    pub size_download: u64,
    pub redirect_count: u32,
    pub total_time: Duration,
    pub content_type: Option<String>,
}

/// What the transport hands back: the final header block followed by the
/// body, unless the body was streamed into a caller-supplied sink.
#[derive(Debug)]
pub struct RawResponse {
    pub raw: Vec<u8>,
    pub header_size: usize,
    pub status: u16,
    pub version: Version,
    pub info: TransferInfo,
}

/// Runs one request to completion, following redirects if the options ask
/// for it.
pub async fn exchange(
    request: Request<Vec<u8>>,
    options: &Options,
    sink: Option<&mut dyn Write>,
) -> Result<RawResponse, Error> {
    match options.timeout {
        Some(limit) => {
            let deadline = async move {
                Timer::after(limit).await;
                Err(Error::Timeout(limit))
            };
            future::or(run(request, options, sink), deadline).await
        }
        None => run(request, options, sink).await,
    }
}

async fn run(
    request: Request<Vec<u8>>,
    options: &Options,
    mut sink: Option<&mut dyn Write>,
) -> Result<RawResponse, Error> {
    let started = Instant::now();
    let (parts, mut body) = request.into_parts();
    let mut headers = parts.headers;
    let mut method = parts.method;
    let mut uri = parts.uri;
    let max_redirects = options.redirects_allowed();
    let mut redirect_count = 0;

    loop {
        let connected = AsyncConnectionFactory::connect(&uri, options).await?;
        let mut stream = connected.stream;
        log::debug!("connected, encrypted = {}", stream.is_encrypted());

        // Write the HTTP request to the stream
        let serialized_request = {
            let mut hop = Request::builder()
                .method(method.clone())
                .uri(uri.clone())
                .version(parts.version)
                .body(body.as_slice())?;
            *hop.headers_mut() = headers.clone();
            serialize_http_request(&hop, options, connected.absolute_form)?
        };
        log::debug!("serialized_request = {serialized_request}");
        stream.write_all(serialized_request.as_bytes()).await?;
        if !body.is_empty() {
            stream.write_all(&body).await?;
        }
        stream.flush().await?;

        // Read the final (non-interim) header block
        let mut reader = BufReader::new(&mut stream);
        let (header_block, version, status) = loop {
            let block = read_header_block(&mut reader).await?;
            let head = String::from_utf8_lossy(&block);
            let status_line = head.lines().next().unwrap_or_default();
            log::debug!("response_status_line = {status_line}");
            let (version, status) = parse_response_status_line(status_line)?;
            if status.is_informational() && status != StatusCode::SWITCHING_PROTOCOLS {
                continue;
            }
            break (block, version, status);
        };
        let head = String::from_utf8_lossy(&header_block).into_owned();
        let response_headers = header_map(&head);
        log::debug!("response_headers = {response_headers:?}");

        if status.is_redirection() && redirect_count < max_redirects {
            if let Some(location) = response_headers.get(LOCATION).and_then(|v| v.to_str().ok()) {
                let next = resolve_location(&uri, location)?;
                log::debug!("following {} redirect to {next}", status.as_u16());
                if matches!(status.as_u16(), 301..=303) && method != Method::HEAD {
                    method = Method::GET;
                    body.clear();
                    headers.remove(CONTENT_LENGTH);
                    headers.remove(CONTENT_TYPE);
                    headers.remove(TRANSFER_ENCODING);
                }
                uri = next;
                redirect_count += 1;
                continue;
            }
        }

        let mut memory = Vec::new();
        let size_download = if has_body(&method, status) {
            let target: &mut dyn Write = match sink.take() {
                Some(sink) => sink,
                None => &mut memory,
            };
            read_response_body(&mut reader, &response_headers, target).await?
        } else {
            0
        };

        let header_size = header_block.len();
        let info = TransferInfo {
            url: uri.to_string(),
            http_code: status.as_u16(),
            header_size,
            size_download,
            redirect_count,
            total_time: started.elapsed(),
            content_type: response_headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        };

        let mut raw = header_block;
        raw.extend_from_slice(&memory);
        return Ok(RawResponse {
            raw,
            header_size,
            status: status.as_u16(),
            version,
            info,
        });
    }
}

// Resolves a Location header against the URI that produced it
pub fn resolve_location(base: &Uri, location: &str) -> Result<Uri, Error> {
    let scheme = base.scheme_str().unwrap_or("http");
    let authority = base.authority().map_or("", |a| a.as_str());

    let absolute = if location.contains("://") {
        location.to_string()
    } else if let Some(rest) = location.strip_prefix("//") {
        format!("{scheme}://{rest}")
    } else if location.starts_with('/') {
        format!("{scheme}://{authority}{location}")
    } else {
        let path = base.path();
        let dir = &path[..path.rfind('/').map_or(0, |i| i + 1)];
        let dir = if dir.is_empty() { "/" } else { dir };
        format!("{scheme}://{authority}{dir}{location}")
    };

    absolute
        .parse()
        .map_err(|_| Error::protocol(format!("bad redirect location {location:?}")))
}
