//! HTTP transport types and the transport seam.
//!
//! # Design
//! Requests and responses are plain data. The controller builds an
//! `HttpRequest` for every fetch cycle and hands it to a `Transport`; the
//! host decides how the bytes actually move (an async client, a blocking
//! client on a worker thread, or a C caller behind the FFI crate).
//!
//! All fields use owned types (`String`, `Vec`) so values can cross FFI
//! boundaries without lifetime concerns.

use std::future::Future;

use crate::error::ClientError;

/// HTTP method for a request. GraphQL operations are always POSTed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Post => "POST",
        }
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data.
///
/// The status is carried for diagnostics only; the controller hands every
/// non-error response to the JSON decode step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// A `200 OK` response with the given body and no headers.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }
}

/// Executes built requests against the network.
///
/// Any `Fn(HttpRequest) -> impl Future<Output = Result<HttpResponse, ClientError>>`
/// closure is a transport, which keeps test doubles short.
pub trait Transport: Send + Sync + 'static {
    fn perform(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, ClientError>> + Send;
}

impl<F, Fut> Transport for F
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse, ClientError>> + Send,
{
    fn perform(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, ClientError>> + Send {
        self(request)
    }
}
