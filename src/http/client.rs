use std::error::Error as _;
use std::fmt::{self, Display};
use std::time::{Duration, Instant};

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, redirect};
use serde::Serialize;
use thiserror::Error;

use super::request::RequestInput;
use super::response::HttpResponse;

/// Why a request never produced a usable response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportErrorKind {
    InvalidRequest,
    DnsError,
    ConnectError,
    TlsError,
    Timeout,
    ReadError,
    MalformedBody,
}

impl Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportErrorKind::InvalidRequest => "INVALID_REQUEST",
            TransportErrorKind::DnsError => "DNS_ERROR",
            TransportErrorKind::ConnectError => "CONNECT_ERROR",
            TransportErrorKind::TlsError => "TLS_ERROR",
            TransportErrorKind::Timeout => "TIMEOUT",
            TransportErrorKind::ReadError => "READ_ERROR",
            TransportErrorKind::MalformedBody => "MALFORMED_BODY",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::new(classify_reqwest_error(&err), err.to_string())
    }
}

#[derive(Debug, Error)]
#[error("failed to build HTTP client: {0}")]
pub struct ClientBuildError(#[from] reqwest::Error);

/// Sequential HTTP client: each `send` resolves before the caller issues the next.
/// No retries are attempted.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, ClientBuildError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }

    pub async fn send(&self, request: &RequestInput) -> Result<HttpResponse, TransportError> {
        let headers = build_headers(&request.headers)?;

        let mut builder = self
            .client
            .request(request.method.into(), &request.url)
            .headers(headers);

        if let Some(body) = &request.body {
            if request.method.allows_body() {
                builder = builder.json(body);
            }
        }

        let start = Instant::now();
        let response = builder.send().await?;
        let elapsed = start.elapsed().as_millis() as u64;

        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or("Unknown").to_string();

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("text/plain")
            .to_string();

        let bytes = response.bytes().await?;

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text,
            content_type,
            body: String::from_utf8_lossy(&bytes).into_owned(),
            duration_ms: elapsed,
        })
    }
}

fn build_headers(input: &[(String, String)]) -> Result<HeaderMap, TransportError> {
    let mut headers = HeaderMap::new();

    for (key, value) in input {
        if key.is_empty() {
            continue;
        }

        let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|err| {
            TransportError::new(
                TransportErrorKind::InvalidRequest,
                format!("Invalid header name `{key}`: {err}"),
            )
        })?;
        // The value may be a credential, so it stays out of the message.
        let header_value = HeaderValue::from_str(value).map_err(|err| {
            TransportError::new(
                TransportErrorKind::InvalidRequest,
                format!("Invalid header value for `{key}`: {err}"),
            )
        })?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

fn classify_reqwest_error(err: &reqwest::Error) -> TransportErrorKind {
    if err.is_builder() {
        return TransportErrorKind::InvalidRequest;
    }
    if err.is_timeout() {
        return TransportErrorKind::Timeout;
    }

    // reqwest's own message embeds the request URL, so only the causes are inspected.
    let message = source_chain(err).to_ascii_lowercase();
    if message.contains("dns") || message.contains("failed to lookup address") {
        return TransportErrorKind::DnsError;
    }
    if message.contains("tls") || message.contains("ssl") || message.contains("certificate") {
        return TransportErrorKind::TlsError;
    }
    if err.is_connect() {
        return TransportErrorKind::ConnectError;
    }

    TransportErrorKind::ReadError
}

fn source_chain(err: &reqwest::Error) -> String {
    let mut message = String::new();
    let mut source = err.source();
    while let Some(inner) = source {
        if !message.is_empty() {
            message.push_str(": ");
        }
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}
