use std::collections::BTreeMap;

use http::header::{CONNECTION, CONTENT_LENGTH, HOST, USER_AGENT};
use http::{Method, Request, Version};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::body::Payload;
use crate::error::Error;
use crate::options::Options;

pub type Params = BTreeMap<String, String>;
pub type Headers = BTreeMap<String, String>;

/// Unreserved characters stay literal, everything else is escaped.
pub(crate) const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Everything about one request except where it goes.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: String,
    pub params: Params,
    pub data: Option<Payload>,
    pub headers: Headers,
    pub options: Options,
    /// Try to decode a successful body as JSON.
    pub decode_json: bool,
}

impl Default for Call {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            params: Params::new(),
            data: None,
            headers: Headers::new(),
            options: Options::default(),
            decode_json: true,
        }
    }
}

impl Call {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        set_header(&mut self.headers, name.into(), value.into());
        self
    }

    pub fn data(mut self, payload: impl Into<Payload>) -> Self {
        self.data = Some(payload.into());
        self
    }

    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Keep the body as received, even if it is valid JSON.
    pub fn raw(mut self) -> Self {
        self.decode_json = false;
        self
    }
}

pub(crate) fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Appends `?k=v&...` to `url` when there are parameters.
pub fn endpoint(url: &str, params: &Params) -> String {
    if params.is_empty() {
        return url.to_string();
    }

    let query = params
        .iter()
        .map(|(key, value)| format!("{}={}", encode_component(key), encode_component(value)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{url}?{query}")
}

/// Sets `name`, replacing any header spelled with different case.
pub fn set_header(headers: &mut Headers, name: String, value: String) {
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
    headers.insert(name, value);
}

/// Layers `overrides` on top of `defaults`; header names compare case-insensitively.
pub fn layer_headers(defaults: &Headers, overrides: Headers) -> Headers {
    let mut headers = defaults.clone();
    for (name, value) in overrides {
        set_header(&mut headers, name, value);
    }
    headers
}

/// Turns a header mapping into `Name: value` lines.
pub fn flatten_headers(headers: &Headers) -> Vec<String> {
    headers
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect()
}

fn expects_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

// Serializes the HTTP request head into a string format that can be sent over the network
pub fn serialize_http_request<T>(req: &Request<T>, options: &Options, absolute_form: bool) -> Result<String, Error>
where
    T: AsRef<[u8]>,
{
    let method = req.method();
    let uri = req.uri();

    let target = if absolute_form {
        uri.to_string()
    } else {
        uri.path_and_query().map_or("/", |pq| pq.as_str()).to_string()
    };

    let version = match req.version() {
        Version::HTTP_10 => "HTTP/1.0",
        _ => "HTTP/1.1",
    };

    let mut request_line = format!("{method} {target} {version}\r\n");

    let headers = req.headers();
    if !headers.contains_key(HOST) {
        if let Some(authority) = uri.authority() {
            request_line.push_str(&format!("Host: {}\r\n", authority.as_str()));
        }
    }

    for (name, value) in headers {
        request_line.push_str(&format!("{}: {}\r\n", name.as_str(), value.to_str()?));
    }

    if !headers.contains_key(USER_AGENT) {
        if let Some(user_agent) = &options.user_agent {
            request_line.push_str(&format!("User-Agent: {user_agent}\r\n"));
        }
    }

    let body_len = req.body().as_ref().len();
    if !headers.contains_key(CONTENT_LENGTH) && (body_len > 0 || expects_body(method)) {
        request_line.push_str(&format!("Content-Length: {body_len}\r\n"));
    }

    if !headers.contains_key(CONNECTION) {
        request_line.push_str("Connection: close\r\n");
    }

    request_line.push_str("\r\n");

    Ok(request_line)
}
