use std::collections::BTreeMap;
use std::io::Write;
use std::str::FromStr;

use futures_lite::{io::BufReader, AsyncBufReadExt, AsyncRead, AsyncReadExt};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Version};

use crate::error::Error;

/// Key under which the status line is kept.
pub const HTTP_STATUS: &str = "http_status";

const COPY_BUFFER: usize = 16 * 1024;
const MAX_HEADER_BLOCK: usize = 256 * 1024;

/// Response headers as a flat name to value mapping.
///
/// The status line lives under [`HTTP_STATUS`]. Repeated names keep the
/// last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    fields: BTreeMap<String, String>,
}

impl ResponseHeaders {
    pub fn status_line(&self) -> &str {
        self.fields.get(HTTP_STATUS).map_or("", String::as_str)
    }

    /// Looks a header up ignoring ASCII case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .rev()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Parses a raw header block: status line first, then `Name: value` lines.
pub fn parse_header_block(block: &str) -> ResponseHeaders {
    let mut lines = block.split('\n').map(|line| line.strip_suffix('\r').unwrap_or(line));
    let mut fields = BTreeMap::new();
    fields.insert(HTTP_STATUS.to_string(), lines.next().unwrap_or_default().to_string());

    for line in lines.filter(|line| !line.is_empty()) {
        match line.split_once(": ") {
            Some((name, value)) => {
                fields.insert(name.to_string(), value.to_string());
            }
            None => log::warn!("Failed to parse header line: {line}"),
        }
    }

    ResponseHeaders { fields }
}

// Parses the response status line into a version and status code
pub fn parse_response_status_line(response_status_line: &str) -> Result<(Version, StatusCode), Error> {
    let response_status_line_parts: Vec<&str> = response_status_line.split_whitespace().collect();
    if response_status_line_parts.len() < 2 {
        return Err(Error::protocol(format!("bad status line {response_status_line:?}")));
    }

    let response_version = match response_status_line_parts[0] {
        "HTTP/1.0" => Version::HTTP_10,
        "HTTP/1.1" => Version::HTTP_11,
        "HTTP/2.0" | "HTTP/2" => Version::HTTP_2,
        other => return Err(Error::protocol(format!("unsupported HTTP version {other}"))),
    };

    let code = response_status_line_parts[1]
        .parse::<u16>()
        .map_err(|_| Error::protocol(format!("bad status code in {response_status_line:?}")))?;
    let response_status = StatusCode::from_u16(code)
        .map_err(|_| Error::protocol(format!("status code {code} out of range")))?;
    Ok((response_version, response_status))
}

// Reads the raw header block (status line included, blank line included)
pub async fn read_header_block<S>(reader: &mut BufReader<S>) -> Result<Vec<u8>, Error>
where
    S: AsyncRead + Unpin,
{
    let mut block = Vec::new();
    loop {
        let start = block.len();
        let limit = (MAX_HEADER_BLOCK + 1 - start) as u64;
        if (&mut *reader).take(limit).read_until(b'\n', &mut block).await? == 0 {
            return Err(Error::protocol("connection closed before headers were complete"));
        }
        if block.len() > MAX_HEADER_BLOCK {
            return Err(Error::protocol("header block too large"));
        }
        let line = &block[start..];
        if line == b"\r\n" || line == b"\n" {
            // A blank line straight away is stray whitespace, not the end of headers
            if start == 0 {
                block.clear();
                continue;
            }
            return Ok(block);
        }
    }
}

// Builds a header map for framing decisions out of a raw header block
pub fn header_map(block: &str) -> HeaderMap<HeaderValue> {
    let mut headers = HeaderMap::new();
    for line in block.lines().skip(1) {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match (HeaderName::from_str(&key.trim().to_lowercase()), HeaderValue::from_str(value.trim())) {
            (Ok(header_name), Ok(header_value)) => {
                headers.append(header_name, header_value);
            }
            _ => log::warn!("Ignoring unparseable header line: {line}"),
        }
    }
    headers
}

fn write_sink(sink: &mut dyn Write, bytes: &[u8]) -> Result<(), Error> {
    sink.write_all(bytes).map_err(Error::Sink)
}

// Copies exactly `len` bytes, or everything until EOF when `len` is None
async fn copy_body<S>(reader: &mut BufReader<S>, len: Option<u64>, sink: &mut dyn Write) -> Result<u64, Error>
where
    S: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; COPY_BUFFER];
    let mut copied = 0u64;
    loop {
        let want = match len {
            Some(len) if copied >= len => break,
            Some(len) => buffer.len().min((len - copied) as usize),
            None => buffer.len(),
        };
        let read = reader.read(&mut buffer[..want]).await?;
        if read == 0 {
            if len.is_some() {
                return Err(Error::protocol(format!("body ended after {copied} bytes")));
            }
            break;
        }
        write_sink(sink, &buffer[..read])?;
        copied += read as u64;
    }
    Ok(copied)
}

// Reads a chunked HTTP body from the provided BufReader
pub async fn read_chunked_body<S>(reader: &mut BufReader<S>, sink: &mut dyn Write) -> Result<u64, Error>
where
    S: AsyncRead + Unpin,
{
    let mut total = 0u64;
    let mut chunk_size_line = String::new();

    loop {
        chunk_size_line.clear();
        if reader.read_line(&mut chunk_size_line).await? == 0 {
            return Err(Error::protocol("connection closed inside chunked body"));
        }
        let size_field = chunk_size_line.split(';').next().unwrap_or_default().trim();
        let chunk_size = u64::from_str_radix(size_field, 16)
            .map_err(|_| Error::protocol(format!("bad chunk size {size_field:?}")))?;

        if chunk_size == 0 {
            break;
        }

        total += copy_body(reader, Some(chunk_size), sink).await?;

        let mut crlf = [0; 2];
        reader.read_exact(&mut crlf).await?;
        if &crlf != b"\r\n" {
            return Err(Error::protocol("invalid chunked encoding: missing CRLF"));
        }
    }

    // Discard trailers
    loop {
        chunk_size_line.clear();
        let read = reader.read_line(&mut chunk_size_line).await?;
        if read == 0 || chunk_size_line.trim().is_empty() {
            break;
        }
    }

    Ok(total)
}

/// Whether a response to `method` with `status` carries a body at all.
pub fn has_body(method: &http::Method, status: StatusCode) -> bool {
    !(*method == http::Method::HEAD
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

// Reads the response body based on headers, writing it into `sink`
pub async fn read_response_body<S>(
    reader: &mut BufReader<S>,
    headers: &HeaderMap<HeaderValue>,
    sink: &mut dyn Write,
) -> Result<u64, Error>
where
    S: AsyncRead + Unpin,
{
    let chunked = headers
        .get_all("transfer-encoding")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.to_ascii_lowercase().contains("chunked"));

    if chunked {
        read_chunked_body(reader, sink).await
    } else if let Some(content_length_value) = headers.get("content-length") {
        let content_length = content_length_value
            .to_str()?
            .trim()
            .parse::<u64>()
            .map_err(|_| Error::protocol("bad content-length"))?;
        copy_body(reader, Some(content_length), sink).await
    } else {
        copy_body(reader, None, sink).await
    }
}
