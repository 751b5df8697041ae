use crate::api::error::TransportError;
use anyhow::{anyhow, Context};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A fully prepared request; GET parameters are already encoded in `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub bearer_token: String,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Moves a request to the server and brings back whatever it answered.
///
/// Non-success statuses are not errors at this level, only failures to
/// exchange bytes at all are.
pub trait Transport {
    fn send(&mut self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UreqTransport;

impl Transport for UreqTransport {
    fn send(&mut self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let authorization = format!("Bearer {}", request.bearer_token);
        let http_response = match request.method {
            Method::Get => ureq::get(&request.url)
                .set("Authorization", &authorization)
                .call(),
            Method::Post => ureq::post(&request.url)
                .set("Authorization", &authorization)
                .set("Content-Type", "application/json")
                .send_string(request.body.as_deref().unwrap_or("{}")),
        };
        if let Some(error) = http_response.synthetic_error() {
            return Err(anyhow!("{:?} {} failed: {}", request.method, request.url, error));
        }
        let status = http_response.status();
        let body = http_response
            .into_string()
            .context("failed to turn response into string")?;
        Ok(HttpResponse { status, body })
    }
}
