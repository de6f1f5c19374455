//! Request/response types and the transport seam.
//!
//! Generated clients never talk to a socket. They assemble a [`Request`] with
//! [`RequestBuilder`], hand it to a caller-supplied [`Transport`], and route
//! the returned [`Response`] by status.

// Internal imports (std, crate)
use std::fmt;

use crate::error::{Result, RuntimeError};
use crate::multipart::{MultipartForm, PartSpec};

// External imports (alphabetized)
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Post,
    Patch,
    Delete,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content type of a JSON merge patch (RFC 7396)
pub const MERGE_PATCH: &str = "application/merge-patch+json";

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(JsonValue),
    /// Already encoded; the `content-type` header describes it
    Bytes(Vec<u8>),
}

impl RequestBody {
    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            Self::Json(value) => Some(value),
            Self::Bytes(_) => None,
        }
    }

    /// Wire bytes of the body
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Self::Json(value) => Ok(serde_json::to_vec(value)?),
            Self::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl Request {
    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Body as JSON; an empty body reads as `null`
    pub fn json_value(&self) -> Result<JsonValue> {
        if self.body.is_empty() {
            return Ok(JsonValue::Null);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.json_value()?)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Error for a declared error response, after checking the body decodes
    /// as the type declared for `response_key`
    pub fn service_error<T: DeserializeOwned + Serialize>(&self, response_key: &str) -> RuntimeError {
        let body = match self.json::<T>().and_then(|typed| Ok(serde_json::to_value(typed)?)) {
            Ok(body) => body,
            Err(e) => return e,
        };
        RuntimeError::Service {
            status: self.status,
            response: response_key.to_string(),
            body,
        }
    }

    /// Error for a status no declared response covers
    pub fn unexpected(&self) -> RuntimeError {
        RuntimeError::UnexpectedStatus {
            status: self.status,
            body: self.text(),
        }
    }
}

/// Sends requests on behalf of a generated client
pub trait Transport {
    fn send(&self, request: Request) -> Result<Response>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: Request) -> Result<Response> {
        (**self).send(request)
    }
}

/// Builds a [`Request`] from an endpoint and a path template such as
/// `/widgets/{id}:analyze`.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Method,
    endpoint: String,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<RequestBody>,
}

impl RequestBuilder {
    pub fn new(method: Method, endpoint: &str, path_template: &str) -> Self {
        Self {
            method,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            path: path_template.to_string(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Substitute `{name}` with the percent-encoded value
    pub fn path_param(mut self, name: &str, value: impl fmt::Display) -> Self {
        let encoded = percent_encode(&value.to_string());
        self.path = self.path.replace(&format!("{{{}}}", name), &encoded);
        self
    }

    pub fn query(mut self, name: &str, value: impl fmt::Display) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, name: &str, value: impl fmt::Display) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn json_body<B: Serialize>(self, body: &B) -> Result<Self> {
        let value = serde_json::to_value(body)?;
        Ok(self.body(RequestBody::Json(value), "application/json"))
    }

    /// Body sent as a JSON merge patch; `null` members clear the property
    pub fn merge_patch_body<B: Serialize>(self, body: &B) -> Result<Self> {
        let value = serde_json::to_value(body)?;
        if !value.is_object() {
            return Err(RuntimeError::request("a merge patch body must serialize to an object"));
        }
        Ok(self.body(RequestBody::Json(value), MERGE_PATCH))
    }

    /// Body sent as `multipart/form-data`, one part per property of `body`
    pub fn multipart_body<B: Serialize>(self, body: &B, parts: &[PartSpec]) -> Result<Self> {
        let form = MultipartForm::from_value(&serde_json::to_value(body)?, parts)?;
        let (content_type, bytes) = form.into_body();
        Ok(self.body(RequestBody::Bytes(bytes), &content_type))
    }

    fn body(mut self, body: RequestBody, content_type: &str) -> Self {
        self.body = Some(body);
        self.headers
            .push(("content-type".to_string(), content_type.to_string()));
        self
    }

    pub fn build(self) -> Result<Request> {
        if let Some(start) = self.path.find('{') {
            let rest = &self.path[start..];
            let placeholder = rest.split_inclusive('}').next().unwrap_or(rest);
            return Err(RuntimeError::request(format!(
                "path parameter {} was never bound",
                placeholder
            )));
        }

        let raw = if self.path.starts_with('/') {
            format!("{}{}", self.endpoint, self.path)
        } else {
            format!("{}/{}", self.endpoint, self.path)
        };
        let mut url = Url::parse(&raw)
            .map_err(|e| RuntimeError::request(format!("invalid url '{}': {}", raw, e)))?;
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &self.query {
                pairs.append_pair(name, value);
            }
        }

        Ok(Request {
            method: self.method,
            url,
            headers: self.headers,
            body: self.body,
        })
    }
}

/// Request for a follow-up URL such as a next link or a polling location
pub fn follow(method: Method, link: &str) -> Result<Request> {
    let url = Url::parse(link).map_err(|e| RuntimeError::request(format!("invalid link '{}': {}", link, e)))?;
    Ok(Request {
        method,
        url,
        headers: Vec::new(),
        body: None,
    })
}

fn percent_encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_binds_path_query_and_headers() -> Result<()> {
        let request = RequestBuilder::new(Method::Post, "https://example.test/", "/widgets/{id}:analyze")
            .path_param("id", "a b/c")
            .query("api-version", "2024-06-01")
            .header("x-ms-client-request-id", "42")
            .json_body(&json!({"color": "red"}))?
            .build()?;

        assert_eq!(
            request.url.as_str(),
            "https://example.test/widgets/a%20b%2Fc:analyze?api-version=2024-06-01"
        );
        assert_eq!(request.headers.len(), 2);
        assert_eq!(request.header("Content-Type"), Some("application/json"));
        assert_eq!(request.body, Some(RequestBody::Json(json!({"color": "red"}))));
        Ok(())
    }

    #[test]
    fn test_merge_patch_body_keeps_explicit_nulls() -> Result<()> {
        let request = RequestBuilder::new(Method::Patch, "https://example.test", "/widgets/w1")
            .merge_patch_body(&json!({"color": null, "weight": 3}))?
            .build()?;
        assert_eq!(request.header("content-type"), Some(MERGE_PATCH));
        let body = request.body.as_ref().and_then(RequestBody::as_json);
        assert_eq!(body, Some(&json!({"color": null, "weight": 3})));

        let scalar = RequestBuilder::new(Method::Patch, "https://example.test", "/widgets/w1")
            .merge_patch_body(&3);
        assert!(matches!(scalar, Err(RuntimeError::Request(_))));
        Ok(())
    }

    #[test]
    fn test_multipart_body_is_encoded_bytes() -> Result<()> {
        let request = RequestBuilder::new(Method::Post, "https://example.test", "/widgets/w1/photos")
            .multipart_body(
                &json!({"caption": "front", "photo": "aGk="}),
                &[PartSpec::text("caption"), PartSpec::file("photo")],
            )?
            .build()?;
        let content_type = request.header("content-type").unwrap_or_default();
        let boundary = content_type
            .strip_prefix("multipart/form-data; boundary=")
            .expect("multipart content type");
        let body = match &request.body {
            Some(body) => String::from_utf8(body.to_bytes()?).expect("ascii body"),
            None => panic!("multipart body missing"),
        };
        assert!(body.starts_with(&format!("--{}\r\n", boundary)));
        assert!(body.contains("name=\"caption\"\r\n\r\nfront\r\n"));
        assert!(body.contains("name=\"photo\"; filename=\"photo\""));
        assert!(body.ends_with(&format!("--{}--\r\n", boundary)));
        Ok(())
    }

    #[test]
    fn test_unbound_placeholder_is_an_error() {
        let result = RequestBuilder::new(Method::Get, "https://example.test", "/widgets/{id}").build();
        assert!(matches!(result, Err(RuntimeError::Request(msg)) if msg.contains("{id}")));
    }

    #[test]
    fn test_response_helpers() -> Result<()> {
        let response = Response {
            status: 200,
            headers: vec![("Operation-Location".to_string(), "https://example.test/ops/1".to_string())],
            body: br#"{"id": "w1"}"#.to_vec(),
        };
        assert_eq!(response.header("operation-location"), Some("https://example.test/ops/1"));
        assert_eq!(response.json_value()?, json!({"id": "w1"}));

        let empty = Response { status: 204, headers: Vec::new(), body: Vec::new() };
        assert_eq!(empty.json_value()?, JsonValue::Null);
        Ok(())
    }

    #[test]
    fn test_service_error_checks_the_declared_body() {
        let response = Response {
            status: 404,
            headers: Vec::new(),
            body: br#"{"code": "NotFound"}"#.to_vec(),
        };
        match response.service_error::<JsonValue>("404") {
            RuntimeError::Service { status, response, body } => {
                assert_eq!((status, response.as_str()), (404, "404"));
                assert_eq!(body, json!({"code": "NotFound"}));
            }
            other => panic!("unexpected error {other:?}"),
        }
        // a body that does not match the declared type surfaces as a JSON error
        assert!(matches!(response.service_error::<Vec<u32>>("404"), RuntimeError::Json(_)));
        assert!(matches!(response.unexpected(), RuntimeError::UnexpectedStatus { status: 404, .. }));
    }
}
