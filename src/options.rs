use std::time::Duration;

use crate::proxy::Proxy;

pub const DEFAULT_MAX_REDIRECTS: u32 = 10;

/// Per-request transport settings.
///
/// Every field is optional so that several layers (call, service, built-in
/// defaults) can be stacked with [`Options::or`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// Skip TLS certificate and host name verification.
    pub insecure: Option<bool>,
    pub proxy: Option<Proxy>,
    pub follow_redirects: Option<bool>,
    pub max_redirects: Option<u32>,
    pub user_agent: Option<String>,
    /// Upper bound for the whole exchange, redirects included.
    pub timeout: Option<Duration>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insecure(mut self, value: bool) -> Self {
        self.insecure = Some(value);
        self
    }

    pub fn proxy(mut self, proxy: Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn follow_redirects(mut self, value: bool) -> Self {
        self.follow_redirects = Some(value);
        self
    }

    pub fn max_redirects(mut self, value: u32) -> Self {
        self.max_redirects = Some(value);
        self
    }

    pub fn user_agent(mut self, value: impl Into<String>) -> Self {
        self.user_agent = Some(value.into());
        self
    }

    pub fn timeout(mut self, value: Duration) -> Self {
        self.timeout = Some(value);
        self
    }

    /// Fills every unset field of `self` from `fallback`.
    pub fn or(&self, fallback: &Options) -> Options {
        Options {
            insecure: self.insecure.or(fallback.insecure),
            proxy: self.proxy.clone().or_else(|| fallback.proxy.clone()),
            follow_redirects: self.follow_redirects.or(fallback.follow_redirects),
            max_redirects: self.max_redirects.or(fallback.max_redirects),
            user_agent: self.user_agent.clone().or_else(|| fallback.user_agent.clone()),
            timeout: self.timeout.or(fallback.timeout),
        }
    }

    pub(crate) fn verify_tls(&self) -> bool {
        !self.insecure.unwrap_or(false)
    }

    pub(crate) fn redirects_allowed(&self) -> u32 {
        if self.follow_redirects.unwrap_or(false) {
            self.max_redirects.unwrap_or(DEFAULT_MAX_REDIRECTS)
        } else {
            0
        }
    }
}
