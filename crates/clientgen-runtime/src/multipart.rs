//! `multipart/form-data` request bodies.
//!
//! Generated clients serialize a form model to JSON as usual and describe
//! its top-level properties with a static table of [`PartSpec`]s. The table
//! decides how each property goes on the wire: scalars as text parts,
//! structured values as `application/json` parts, and bytes as file parts.
//!
//! A file property is either the encoded bytes themselves or an object with
//! a `content` member plus optional `filename` and `contentType` members.

// Internal imports (std, crate)
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::encoding;
use crate::error::{Result, RuntimeError};

// External imports (alphabetized)
use serde_json::Value as JsonValue;

/// Content type of a part that carries JSON
pub const JSON_PART: &str = "application/json";
/// Content type of a file part that names none
pub const DEFAULT_FILE_PART: &str = "application/octet-stream";

static BOUNDARY_SEQ: AtomicU64 = AtomicU64::new(0);

/// How one form property goes on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Text,
    Json,
    File,
    /// One file part per array element, all under the same name
    Files,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartSpec {
    pub name: &'static str,
    pub kind: PartKind,
}

impl PartSpec {
    pub const fn text(name: &'static str) -> Self {
        Self { name, kind: PartKind::Text }
    }

    pub const fn json(name: &'static str) -> Self {
        Self { name, kind: PartKind::Json }
    }

    pub const fn file(name: &'static str) -> Self {
        Self { name, kind: PartKind::File }
    }

    pub const fn files(name: &'static str) -> Self {
        Self { name, kind: PartKind::Files }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormPart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// An ordered set of parts plus the boundary separating them
#[derive(Debug, Clone, PartialEq)]
pub struct MultipartForm {
    boundary: String,
    parts: Vec<FormPart>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    pub fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        let seq = BOUNDARY_SEQ.fetch_add(1, Ordering::Relaxed);
        Self::with_boundary(format!("clientgen-{:016x}{:04x}", nanos, seq & 0xffff))
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    /// Build the parts of `value`, an object, as `specs` describe them.
    ///
    /// Properties that are absent or `null` produce no part. A property
    /// with no entry in `specs` is an error.
    pub fn from_value(value: &JsonValue, specs: &[PartSpec]) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| RuntimeError::request("a multipart body must serialize to an object"))?;
        if let Some(unknown) = object.keys().find(|key| !specs.iter().any(|s| s.name == key.as_str())) {
            return Err(RuntimeError::request(format!(
                "multipart body property '{}' has no part declaration",
                unknown
            )));
        }

        let mut form = Self::new();
        for spec in specs {
            let Some(property) = object.get(spec.name).filter(|v| !v.is_null()) else {
                continue;
            };
            form = match spec.kind {
                PartKind::Text => form.text(spec.name, text_of(spec.name, property)?),
                PartKind::Json => form.json(spec.name, property)?,
                PartKind::File => form.file_value(spec.name, property)?,
                PartKind::Files => {
                    let items = property.as_array().ok_or_else(|| {
                        RuntimeError::request(format!("multipart part '{}' must be an array of files", spec.name))
                    })?;
                    items.iter().try_fold(form, |form, item| form.file_value(spec.name, item))?
                }
            };
        }
        Ok(form)
    }

    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.parts.push(FormPart {
            name: name.to_string(),
            filename: None,
            content_type: None,
            data: value.into().into_bytes(),
        });
        self
    }

    pub fn json(mut self, name: &str, value: &JsonValue) -> Result<Self> {
        self.parts.push(FormPart {
            name: name.to_string(),
            filename: None,
            content_type: Some(JSON_PART.to_string()),
            data: serde_json::to_vec(value)?,
        });
        Ok(self)
    }

    pub fn file(
        mut self,
        name: &str,
        data: Vec<u8>,
        filename: Option<String>,
        content_type: Option<String>,
    ) -> Self {
        self.parts.push(FormPart {
            name: name.to_string(),
            filename: Some(filename.unwrap_or_else(|| name.to_string())),
            content_type: Some(content_type.unwrap_or_else(|| DEFAULT_FILE_PART.to_string())),
            data,
        });
        self
    }

    fn file_value(self, name: &str, value: &JsonValue) -> Result<Self> {
        match value {
            JsonValue::String(raw) => Ok(self.file(name, decode_bytes(raw)?, None, None)),
            JsonValue::Object(details) => {
                let content = details.get("content").and_then(JsonValue::as_str).ok_or_else(|| {
                    RuntimeError::request(format!("file part '{}' has no content", name))
                })?;
                let text = |key: &str| details.get(key).and_then(JsonValue::as_str).map(str::to_string);
                Ok(self.file(name, decode_bytes(content)?, text("filename"), text("contentType")))
            }
            other => Err(RuntimeError::request(format!(
                "file part '{}' must be encoded bytes or file details, found {}",
                name, other
            ))),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    /// `Content-Type` header value and encoded body.
    ///
    /// The boundary is lengthened until no part contains it.
    pub fn into_body(mut self) -> (String, Vec<u8>) {
        while self.parts.iter().any(|p| contains(&p.data, self.boundary.as_bytes())) {
            self.boundary.push('x');
        }
        let content_type = format!("multipart/form-data; boundary={}", self.boundary);
        (content_type, self.encode())
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for part in &self.parts {
            out.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
            let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", escape(&part.name));
            if let Some(filename) = &part.filename {
                disposition.push_str(&format!("; filename=\"{}\"", escape(filename)));
            }
            out.extend_from_slice(disposition.as_bytes());
            out.extend_from_slice(b"\r\n");
            if let Some(content_type) = &part.content_type {
                out.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
            }
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(&part.data);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        out
    }
}

fn text_of(name: &str, value: &JsonValue) -> Result<String> {
    match value {
        JsonValue::String(text) => Ok(text.clone()),
        JsonValue::Number(number) => Ok(number.to_string()),
        JsonValue::Bool(flag) => Ok(flag.to_string()),
        other => Err(RuntimeError::request(format!(
            "text part '{}' cannot hold {}",
            name, other
        ))),
    }
}

/// Standard base64 first, then the url-safe alphabet
fn decode_bytes(raw: &str) -> Result<Vec<u8>> {
    encoding::decode_base64(raw).or_else(|_| encoding::decode_base64url(raw))
}

/// Quotes and line breaks are percent-encoded in header parameters
fn escape(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|window| window == needle)
}
