//! Module-level shortcuts for one-off requests.
//!
//! Every function here is blocking and builds a fresh request. Use
//! [`crate::Service`] when several calls share a base URL, headers or
//! options.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use futures_lite::future;
use http::{Method, Request};

use crate::body::encode_body;
use crate::outcome::{normalize, Failure, Outcome};
use crate::options::Options;
use crate::proxy::Proxy;
use crate::request::{endpoint, flatten_headers, layer_headers, set_header, Call, Headers};
use crate::transport::{exchange, TransferInfo};

/// User agent downloads present unless the caller picks another.
pub const DOWNLOAD_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Marker returned by a finished download.
#[derive(Debug, Clone)]
pub struct Downloaded {
    /// Where the body was written.
    pub storage: PathBuf,
    pub info: TransferInfo,
}

/// Sends `call` to `base + path` with whatever method it names.
pub fn request(base: &str, path: &str, call: Call) -> Outcome {
    perform(base, path, call, None)
}

pub fn get(base: &str, path: &str, call: Call) -> Outcome {
    request(base, path, call.method("GET"))
}

pub fn post(base: &str, path: &str, call: Call) -> Outcome {
    request(base, path, call.method("POST"))
}

pub fn put(base: &str, path: &str, call: Call) -> Outcome {
    request(base, path, call.method("PUT"))
}

pub fn delete(base: &str, path: &str, call: Call) -> Outcome {
    request(base, path, call.method("DELETE"))
}

/// Any other method (`PATCH`, `OPTIONS`, `PURGE`, ...), uppercased.
pub fn other(method: &str, base: &str, path: &str, call: Call) -> Outcome {
    request(base, path, call.method(method))
}

/// Streams the response body into `out`.
///
/// Redirects are followed by default. On any failure the file is removed
/// before the failure is returned; on success it has been flushed, synced
/// and closed.
pub fn download(base: &str, path: &str, out: impl AsRef<Path>, call: Call) -> Result<Downloaded, Failure> {
    let out = out.as_ref();
    let mut file = File::create(out)?;

    let defaults = Options::new()
        .follow_redirects(true)
        .user_agent(DOWNLOAD_USER_AGENT);
    let options = call.options.or(&defaults);
    let call = call.options(options).raw();

    let result = perform(base, path, call, Some(&mut file)).and_then(|envelope| {
        file.flush()?;
        file.sync_all()?;
        Ok(envelope)
    });
    drop(file);

    match result {
        Ok(envelope) => Ok(Downloaded {
            storage: out.to_path_buf(),
            info: envelope.info,
        }),
        Err(failure) => {
            discard(out);
            Err(failure)
        }
    }
}

fn discard(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => log::debug!("removed partial download {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("could not remove partial download {}: {e}", path.display()),
    }
}

/// Probes `base + path` with `HEAD`.
///
/// Only an unreachable URL or a status line mentioning `404` counts as
/// missing; any other status, errors included, counts as present.
pub fn exists(base: &str, path: &str) -> bool {
    let call = Call::new().method("HEAD").raw();
    let status_line = match perform(base, path, call, None) {
        Ok(envelope) => envelope.response_headers.status_line().to_string(),
        Err(Failure::Status { response_headers, .. }) => response_headers.status_line().to_string(),
        Err(failure) => {
            log::debug!("existence probe failed: {failure}");
            return false;
        }
    };
    !status_line.contains("404")
}

/// Parses a proxy URL, see [`Proxy::parse`].
pub fn proxy(url: &str) -> Option<Proxy> {
    Proxy::parse(url)
}

// Builds the request, hands it to the transport and normalizes the result
fn perform(base: &str, path: &str, call: Call, sink: Option<&mut dyn Write>) -> Outcome {
    let url = endpoint(&format!("{base}{path}"), &call.params);
    let method = call.method.trim().to_ascii_uppercase();
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| Failure::InvalidRequest(format!("bad method {:?}", call.method)))?;

    let mut headers = layer_headers(&Headers::new(), call.headers);
    let mut request_headers = flatten_headers(&headers);

    let mut body = Vec::new();
    if method != Method::GET {
        if let Some(payload) = call.data.as_ref().filter(|payload| !payload.is_empty()) {
            let encoded = encode_body(&request_headers, payload)?;
            if let Some(content_type) = encoded.implied_content_type {
                set_header(&mut headers, "Content-Type".to_string(), content_type.to_string());
                request_headers = flatten_headers(&headers);
            }
            body = encoded.bytes;
        }
    }

    let mut builder = Request::builder().method(method).uri(url.as_str());
    for (name, value) in &headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    let request = builder
        .body(body)
        .map_err(|e| Failure::InvalidRequest(format!("{url}: {e}")))?;

    let result = future::block_on(exchange(request, &call.options, sink));
    normalize(result, call.decode_json, request_headers)
}
