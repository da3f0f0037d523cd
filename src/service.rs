use crate::body::Body;
use crate::helpers;
use crate::options::Options;
use crate::outcome::{Envelope, Failure};
use crate::request::{layer_headers, Call, Headers};

/// What a [`Service`] hands back on success.
#[derive(Debug, Clone)]
pub enum Reply {
    Body(Body),
    Envelope(Envelope),
}

impl Reply {
    pub fn body(&self) -> &Body {
        match self {
            Reply::Body(body) => body,
            Reply::Envelope(envelope) => &envelope.body,
        }
    }

    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            Reply::Envelope(envelope) => Some(envelope),
            Reply::Body(_) => None,
        }
    }
}

/// A client bound to one base URL with default headers and options.
///
/// By default only the response body is returned; call
/// [`Service::just_response`] with `false` to get the whole envelope.
/// Failures are always returned in full.
#[derive(Debug, Clone)]
pub struct Service {
    base: String,
    headers: Headers,
    options: Options,
    just_response: bool,
}

impl Service {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            headers: Headers::new(),
            options: Options::default(),
            just_response: true,
        }
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn just_response(&mut self, value: bool) -> &mut Self {
        self.just_response = value;
        self
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn returns_body_only(&self) -> bool {
        self.just_response
    }

    /// Sends `call` to `endpoint`, layering the service defaults under it.
    pub fn request(&self, endpoint: &str, mut call: Call) -> Result<Reply, Failure> {
        call.headers = layer_headers(&self.headers, std::mem::take(&mut call.headers));
        call.options = call.options.or(&self.options);

        let envelope = helpers::request(&self.base, endpoint, call)?;
        Ok(if self.just_response {
            Reply::Body(envelope.body)
        } else {
            Reply::Envelope(envelope)
        })
    }

    pub fn get(&self, endpoint: &str, call: Call) -> Result<Reply, Failure> {
        self.request(endpoint, call.method("GET"))
    }

    pub fn post(&self, endpoint: &str, call: Call) -> Result<Reply, Failure> {
        self.request(endpoint, call.method("POST"))
    }

    pub fn put(&self, endpoint: &str, call: Call) -> Result<Reply, Failure> {
        self.request(endpoint, call.method("PUT"))
    }

    pub fn delete(&self, endpoint: &str, call: Call) -> Result<Reply, Failure> {
        self.request(endpoint, call.method("DELETE"))
    }
}
