use std::io::Read;

use flate2::read::MultiGzDecoder;
use miniserde::json::{self, Number, Value};

use crate::outcome::Failure;
use crate::request::encode_component;

pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// What a caller wants to send as the request body.
#[derive(Debug, Clone)]
pub enum Payload {
    Bytes(Vec<u8>),
    Text(String),
    /// Encoded according to the request's content type.
    Structured(Value),
}

impl Payload {
    /// Converts any serializable value into a structured payload.
    pub fn structured<T: miniserde::Serialize + ?Sized>(value: &T) -> Result<Self, Failure> {
        let text = json::to_string(value);
        json::from_str::<Value>(&text)
            .map(Payload::Structured)
            .map_err(|_| Failure::Encoding(format!("value does not serialize to JSON: {text}")))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Bytes(bytes) => bytes.is_empty(),
            Payload::Text(text) => text.is_empty(),
            Payload::Structured(Value::Null) => true,
            Payload::Structured(Value::Object(fields)) => fields.is_empty(),
            Payload::Structured(Value::Array(items)) => items.is_empty(),
            Payload::Structured(_) => false,
        }
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Structured(value)
    }
}

/// A response body, decoded when it was JSON.
#[derive(Debug, Clone)]
pub enum Body {
    Raw(Vec<u8>),
    Json(Value),
}

impl Body {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Body::Json(value) => Some(value),
            Body::Raw(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Body::Raw(bytes) => Some(bytes),
            Body::Json(_) => None,
        }
    }

    /// The raw body as text, if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        self.as_bytes().and_then(|bytes| std::str::from_utf8(bytes).ok())
    }
}

/// Parses `bytes` as JSON, handing them back untouched when that fails.
pub fn json_decode_if_valid(bytes: Vec<u8>) -> Body {
    let parsed = std::str::from_utf8(&bytes)
        .ok()
        .and_then(|text| json::from_str::<Value>(text).ok());
    match parsed {
        Some(value) => Body::Json(value),
        None => Body::Raw(bytes),
    }
}

/// Finds the content type among flattened `Name: value` header lines.
pub fn content_type(header_lines: &[String]) -> Option<String> {
    header_lines
        .iter()
        .find(|line| line.to_ascii_lowercase().contains("content-type"))
        .map(|line| match line.split_once(':') {
            Some((_, value)) => value.trim().to_string(),
            None => line.clone(),
        })
}

/// The encoded body plus a content type to add when the caller set none.
#[derive(Debug)]
pub struct EncodedBody {
    pub bytes: Vec<u8>,
    pub implied_content_type: Option<&'static str>,
}

pub fn encode_body(header_lines: &[String], payload: &Payload) -> Result<EncodedBody, Failure> {
    let value = match payload {
        Payload::Bytes(bytes) => return Ok(passthrough(bytes.clone())),
        Payload::Text(text) => return Ok(passthrough(text.clone().into_bytes())),
        Payload::Structured(value) => value,
    };

    let content_type = content_type(header_lines).map(|ct| ct.to_ascii_lowercase());
    match content_type.as_deref() {
        Some(ct) if ct.contains("json") => Ok(passthrough(encode_json(value)?.into_bytes())),
        Some(ct) if ct.contains("x-www-form-urlencoded") => Ok(passthrough(encode_form(value)?.into_bytes())),
        Some(_) => Ok(passthrough(encode_json(value)?.into_bytes())),
        None => Ok(EncodedBody {
            bytes: encode_form(value)?.into_bytes(),
            implied_content_type: Some(FORM_URLENCODED),
        }),
    }
}

fn passthrough(bytes: Vec<u8>) -> EncodedBody {
    EncodedBody {
        bytes,
        implied_content_type: None,
    }
}

pub fn encode_json(value: &Value) -> Result<String, Failure> {
    ensure_finite(value)?;
    Ok(json::to_string(value))
}

fn ensure_finite(value: &Value) -> Result<(), Failure> {
    match value {
        Value::Number(Number::F64(f)) if !f.is_finite() => {
            Err(Failure::Encoding(format!("{f} cannot be represented in JSON")))
        }
        Value::Array(items) => items.iter().try_for_each(ensure_finite),
        Value::Object(fields) => fields.values().try_for_each(ensure_finite),
        _ => Ok(()),
    }
}

/// Form-encodes an object or array using `key[sub]=value` nesting.
pub fn encode_form(value: &Value) -> Result<String, Failure> {
    let mut pairs = Vec::new();
    match value {
        Value::Object(fields) => {
            for (key, field) in fields.iter() {
                collect_pairs(key.clone(), field, &mut pairs);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                collect_pairs(index.to_string(), item, &mut pairs);
            }
        }
        _ => return Err(Failure::Encoding("form bodies need an object or an array".into())),
    }

    Ok(pairs
        .iter()
        .map(|(key, value)| format!("{}={}", encode_component(key), encode_component(value)))
        .collect::<Vec<_>>()
        .join("&"))
}

fn collect_pairs(prefix: String, value: &Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Bool(b) => pairs.push((prefix, if *b { "1" } else { "0" }.to_string())),
        Value::Number(n) => pairs.push((prefix, number_text(n))),
        Value::String(s) => pairs.push((prefix, s.clone())),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                collect_pairs(format!("{prefix}[{index}]"), item, pairs);
            }
        }
        Value::Object(fields) => {
            for (key, field) in fields.iter() {
                collect_pairs(format!("{prefix}[{key}]"), field, pairs);
            }
        }
    }
}

fn number_text(number: &Number) -> String {
    match number {
        Number::U64(n) => n.to_string(),
        Number::I64(n) => n.to_string(),
        Number::F64(n) => n.to_string(),
    }
}

/// Inflates a gzip body (concatenated members included).
pub fn inflate_gzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut inflated = Vec::new();
    MultiGzDecoder::new(bytes).read_to_end(&mut inflated)?;
    Ok(inflated)
}
