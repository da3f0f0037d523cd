use std::net::{IpAddr, TcpStream, ToSocketAddrs};

use async_io::Async;
use futures_lite::{AsyncReadExt, AsyncWriteExt};
use http::Uri;

use crate::error::Error;

const SOCKS5_VERSION: u8 = 0x05;
const SOCKS4_VERSION: u8 = 0x04;
const SOCKS_CMD_CONNECT: u8 = 0x01;
const SOCKS4_GRANTED: u8 = 0x5a;
const MAX_CONNECT_RESPONSE: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    Http,
    Socks4,
    Socks5,
}

/// A proxy endpoint: its protocol plus `host:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy {
    pub kind: ProxyKind,
    pub address: String,
}

impl Proxy {
    pub fn new(kind: ProxyKind, address: impl Into<String>) -> Self {
        Self {
            kind,
            address: address.into(),
        }
    }

    /// Parses `scheme://host:port`.
    ///
    /// Returns `None` when the scheme, host or an explicit port is missing,
    /// or when the scheme is not one of `http`, `https`, `socks`, `socks5`,
    /// `socks4`.
    pub fn parse(url: &str) -> Option<Proxy> {
        let uri: Uri = url.trim().parse().ok()?;
        let scheme = uri.scheme_str()?.to_ascii_lowercase();
        let authority = uri.authority()?;
        let host = authority.host();
        let port = authority.port_u16()?;
        if host.is_empty() {
            return None;
        }

        let kind = match scheme.as_str() {
            "http" | "https" => ProxyKind::Http,
            "socks" | "socks5" => ProxyKind::Socks5,
            "socks4" => ProxyKind::Socks4,
            _ => return None,
        };

        Some(Proxy::new(kind, format!("{host}:{port}")))
    }
}

// Opens a CONNECT tunnel through an HTTP proxy
pub(crate) async fn http_connect(stream: &mut Async<TcpStream>, host: &str, port: u16) -> Result<(), Error> {
    let request = format!("CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\n\r\n");
    stream.write_all(request.as_bytes()).await?;
    stream.flush().await?;

    // Read byte by byte so nothing past the blank line is consumed
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if stream.read(&mut byte).await? == 0 {
            return Err(Error::Proxy("connection closed during CONNECT".into()));
        }
        head.push(byte[0]);
        if head.len() > MAX_CONNECT_RESPONSE {
            return Err(Error::Proxy("CONNECT response too large".into()));
        }
    }

    let head = String::from_utf8_lossy(&head);
    let status_line = head.lines().next().unwrap_or_default();
    log::debug!("proxy CONNECT status_line = {status_line}");
    let status = status_line.split_whitespace().nth(1).and_then(|code| code.parse::<u16>().ok());
    match status {
        Some(code) if (200..300).contains(&code) => Ok(()),
        _ => Err(Error::Proxy(format!("CONNECT refused: {status_line}"))),
    }
}

// Performs the SOCKS5 no-auth greeting and a CONNECT by domain name
pub(crate) async fn socks5_connect(stream: &mut Async<TcpStream>, host: &str, port: u16) -> Result<(), Error> {
    stream.write_all(&[SOCKS5_VERSION, 1, 0x00]).await?;
    let mut choice = [0u8; 2];
    stream.read_exact(&mut choice).await?;
    if choice != [SOCKS5_VERSION, 0x00] {
        return Err(Error::Proxy("SOCKS5 proxy requires authentication".into()));
    }

    let host = host.trim_start_matches('[').trim_end_matches(']');
    let mut request = vec![SOCKS5_VERSION, SOCKS_CMD_CONNECT, 0x00];
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => {
            request.push(0x01);
            request.extend_from_slice(&ip.octets());
        }
        Ok(IpAddr::V6(ip)) => {
            request.push(0x04);
            request.extend_from_slice(&ip.octets());
        }
        Err(_) => {
            let name = host.as_bytes();
            let len = u8::try_from(name.len())
                .map_err(|_| Error::Proxy("host name too long for SOCKS5".into()))?;
            request.push(0x03);
            request.push(len);
            request.extend_from_slice(name);
        }
    }
    request.extend_from_slice(&port.to_be_bytes());
    stream.write_all(&request).await?;

    let mut reply = [0u8; 4];
    stream.read_exact(&mut reply).await?;
    if reply[1] != 0x00 {
        return Err(Error::Proxy(format!("SOCKS5 connect rejected with code {}", reply[1])));
    }

    // Skip the bound address
    let remaining = match reply[3] {
        0x01 => 4 + 2,
        0x04 => 16 + 2,
        0x03 => {
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await?;
            len[0] as usize + 2
        }
        other => return Err(Error::Proxy(format!("SOCKS5 reply has unknown address type {other}"))),
    };
    let mut bound = vec![0u8; remaining];
    stream.read_exact(&mut bound).await?;
    Ok(())
}

// SOCKS4 only carries IPv4 targets, so the host is resolved locally
pub(crate) async fn socks4_connect(stream: &mut Async<TcpStream>, host: &str, port: u16) -> Result<(), Error> {
    let ip = (host, port)
        .to_socket_addrs()?
        .find_map(|addr| match addr.ip() {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(_) => None,
        })
        .ok_or_else(|| Error::Resolve(format!("{host} has no IPv4 address for SOCKS4")))?;

    let mut request = vec![SOCKS4_VERSION, SOCKS_CMD_CONNECT];
    request.extend_from_slice(&port.to_be_bytes());
    request.extend_from_slice(&ip.octets());
    request.push(0x00);
    stream.write_all(&request).await?;

    let mut reply = [0u8; 8];
    stream.read_exact(&mut reply).await?;
    if reply[1] != SOCKS4_GRANTED {
        return Err(Error::Proxy(format!("SOCKS4 connect rejected with code {:#x}", reply[1])));
    }
    Ok(())
}
