use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::SystemTime;

use async_io::Async;
use async_tls::client::TlsStream;
use async_tls::TlsConnector;
use futures_lite::{AsyncRead, AsyncWrite};
use http::Uri;
use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{Certificate, ClientConfig, ServerName};

use crate::error::Error;
use crate::options::Options;
use crate::proxy::{self, ProxyKind};

pub trait AsyncConnection: AsyncRead + AsyncWrite + Send + Sync + Unpin {
    fn is_encrypted(&self) -> bool;
}

impl AsyncConnection for Async<TcpStream> {
    fn is_encrypted(&self) -> bool {
        false
    }
}

impl AsyncConnection for TlsStream<Async<TcpStream>> {
    fn is_encrypted(&self) -> bool {
        true
    }
}

/// An open stream plus how the request line must address the target.
pub struct Connected {
    pub stream: Box<dyn AsyncConnection>,
    /// Plain HTTP through an HTTP proxy wants `GET http://host/path`.
    pub absolute_form: bool,
}

#[derive(Debug)]
pub struct Target {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl Target {
    // Extracts the scheme, host, and port from the request URI
    pub fn from_uri(uri: &Uri) -> Result<Self, Error> {
        let authority = uri
            .authority()
            .ok_or_else(|| Error::protocol(format!("no host in URL {uri}")))?;
        let scheme = uri
            .scheme_str()
            .ok_or_else(|| Error::UnsupportedScheme(String::new()))?
            .to_ascii_lowercase();

        let port = match (authority.port_u16(), scheme.as_str()) {
            (Some(port), "http" | "https") => port,
            (None, "http") => 80,
            (None, "https") => 443,
            _ => return Err(Error::UnsupportedScheme(scheme.clone())),
        };

        Ok(Self {
            scheme,
            host: authority.host().to_string(),
            port,
        })
    }

    fn is_secure(&self) -> bool {
        self.scheme == "https"
    }
}

pub struct AsyncConnectionFactory;

impl AsyncConnectionFactory {
    pub async fn connect(uri: &Uri, options: &Options) -> Result<Connected, Error> {
        let target = Target::from_uri(uri)?;
        log::debug!("connecting to {}://{}:{}", target.scheme, target.host, target.port);

        let (stream, absolute_form) = match &options.proxy {
            None => (Self::tcp(&format!("{}:{}", target.host, target.port)).await?, false),
            Some(proxy) => {
                log::debug!("using {:?} proxy {}", proxy.kind, proxy.address);
                let mut stream = Self::tcp(&proxy.address).await?;
                match proxy.kind {
                    ProxyKind::Http if target.is_secure() => {
                        proxy::http_connect(&mut stream, &target.host, target.port).await?;
                        (stream, false)
                    }
                    ProxyKind::Http => (stream, true),
                    ProxyKind::Socks5 => {
                        proxy::socks5_connect(&mut stream, &target.host, target.port).await?;
                        (stream, false)
                    }
                    ProxyKind::Socks4 => {
                        proxy::socks4_connect(&mut stream, &target.host, target.port).await?;
                        (stream, false)
                    }
                }
            }
        };

        // Optionally add TLS based on the scheme
        let stream: Box<dyn AsyncConnection> = if target.is_secure() {
            let connector = tls_connector(options.verify_tls());
            let host = target.host.trim_start_matches('[').trim_end_matches(']');
            Box::new(connector.connect(host, stream).await?)
        } else {
            stream.get_ref().set_nodelay(true)?;
            Box::new(stream)
        };
        if absolute_form {
            log::debug!("sending absolute-form request through proxy");
        }

        Ok(Connected { stream, absolute_form })
    }

    async fn tcp(address: &str) -> Result<Async<TcpStream>, Error> {
        let addr = address
            .to_socket_addrs()
            .map_err(|e| Error::Resolve(format!("{address}: {e}")))?
            .next()
            .ok_or_else(|| Error::Resolve(address.to_string()))?;
        Ok(Async::<TcpStream>::connect(addr).await?)
    }
}

fn tls_connector(verify: bool) -> TlsConnector {
    if verify {
        return TlsConnector::new();
    }

    log::warn!("TLS certificate verification is disabled for this request");
    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

// Only installed when the caller opts in with `Options::insecure`
struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}
