//! HTTP transport seam
//!
//! The client builds [`HttpRequest`] values and hands them to an
//! [`HttpTransport`]. [`ReqwestTransport`] sends them with the blocking
//! reqwest client; tests plug in a scripted transport instead.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// One part of a multipart form
#[derive(Debug, Clone, PartialEq)]
pub struct MultipartPart {
    pub name: String,
    /// Sent verbatim as the part's file name
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl MultipartPart {
    pub fn file(name: impl Into<String>, filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            filename: Some(filename.into()),
            content_type: None,
            data,
        }
    }

    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filename: None,
            content_type: None,
            data: text.into().into_bytes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(Vec<MultipartPart>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Full URL including the query string
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Final URL after redirects
    pub url: String,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Failure to get any response at all
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// Timeouts, refused or reset connections: worth another attempt
    #[error("{0}")]
    Transient(String),
    #[error("{0}")]
    Fatal(String),
}

/// Sends one request and returns the raw response
pub trait HttpTransport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for &T {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

impl<T: HttpTransport + ?Sized> HttpTransport for Box<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

/// Transport backed by `reqwest::blocking`
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Fatal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    fn build_request(
        &self,
        request: &HttpRequest,
    ) -> Result<reqwest::blocking::RequestBuilder, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(parts) => {
                let mut form = reqwest::blocking::multipart::Form::new();
                for part in parts {
                    let mut field = reqwest::blocking::multipart::Part::bytes(part.data.clone());
                    if let Some(filename) = &part.filename {
                        field = field.file_name(filename.clone());
                    }
                    if let Some(content_type) = &part.content_type {
                        field = field.mime_str(content_type).map_err(|e| {
                            TransportError::Fatal(format!("Invalid content type: {}", e))
                        })?;
                    }
                    form = form.part(part.name.clone(), field);
                }
                builder.multipart(form)
            }
        };

        Ok(builder)
    }
}

impl HttpTransport for ReqwestTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let response = self.build_request(request)?.send().map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                TransportError::Transient(e.to_string())
            } else if e.is_builder() {
                TransportError::Fatal(e.to_string())
            } else {
                // Resets and other mid-flight failures
                TransportError::Transient(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response
            .bytes()
            .map_err(|e| TransportError::Transient(format!("Failed to read response: {}", e)))?
            .to_vec();

        Ok(HttpResponse { status, url, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let request = HttpRequest {
            method: HttpMethod::Get,
            url: "https://api.test/v1/queues".to_string(),
            headers: vec![("Authorization".to_string(), "Token abc".to_string())],
            body: RequestBody::Empty,
        };
        assert_eq!(request.header("authorization"), Some("Token abc"));
        assert_eq!(request.header("accept"), None);
    }

    #[test]
    fn test_success_range() {
        let response = |status| HttpResponse {
            status,
            url: String::new(),
            body: Vec::new(),
        };
        assert!(response(200).is_success());
        assert!(response(204).is_success());
        assert!(!response(301).is_success());
        assert!(!response(401).is_success());
    }

    #[test]
    fn test_builds_reqwest_client() {
        assert!(ReqwestTransport::new(Some(Duration::from_secs(5))).is_ok());
    }
}
