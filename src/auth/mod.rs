//! # Authentication
//!
//! Logs in once per run and keeps the issued bearer token in the
//! [`Session`]. A failed login is not a contract violation: it yields
//! [`AuthOutcome::Skipped`] and dependent cases are skipped.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::http::client::HttpClient;
use crate::http::method::HttpMethod;
use crate::http::request::RequestInput;

pub const LOGIN_PATH: &str = "/api/auth/login";

/// Email and password used for the login step.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    email: String,
    password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<LoginUser>,
}

#[derive(Debug, Deserialize)]
pub struct LoginUser {
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Opaque credential issued at login. Attached verbatim, never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub enum AuthOutcome {
    Authenticated { token: BearerToken, user_email: Option<String> },
    Skipped { reason: String },
}

/// Base URL plus the token obtained by the login step.
#[derive(Debug, Clone)]
pub struct Session {
    base_url: String,
    token: Option<BearerToken>,
}

impl Session {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&BearerToken> {
        self.token.as_ref()
    }

    /// Store the login token. The first token wins; later calls are ignored
    /// so every authenticated request in a run carries the same credential.
    pub fn set_token(&mut self, token: BearerToken) -> bool {
        if self.token.is_some() {
            tracing::warn!("Ignoring second bearer token for this session");
            return false;
        }
        self.token = Some(token);
        true
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }
}

/// POST the credentials to the login endpoint.
pub async fn authenticate(
    client: &HttpClient,
    base_url: &str,
    credentials: &Credentials,
) -> AuthOutcome {
    let body = match serde_json::to_value(LoginRequest {
        email: credentials.email(),
        password: credentials.password(),
    }) {
        Ok(body) => body,
        Err(err) => {
            return AuthOutcome::Skipped {
                reason: format!("Failed to encode login request: {err}"),
            };
        }
    };

    let request = RequestInput {
        method: HttpMethod::Post,
        url: format!("{base_url}{LOGIN_PATH}"),
        headers: vec![("Content-Type".to_string(), "application/json".to_string())],
        body: Some(body),
    };

    let response = match client.send(&request).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(error = %err, "Login request did not complete");
            return AuthOutcome::Skipped {
                reason: format!("Login request failed: {err}"),
            };
        }
    };

    if response.status != 200 {
        tracing::warn!(status = response.status, "Login rejected");
        return AuthOutcome::Skipped {
            reason: format!("Login returned {} {}", response.status, response.status_text),
        };
    }

    let login: LoginResponse = match serde_json::from_str(&response.body) {
        Ok(login) => login,
        Err(err) => {
            return AuthOutcome::Skipped {
                reason: format!("Login response was not valid JSON: {err}"),
            };
        }
    };

    match login.token.filter(|token| !token.is_empty()) {
        Some(token) => {
            let (user_email, role) = login
                .user
                .map(|user| (Some(user.email), user.role))
                .unwrap_or_default();
            tracing::info!(role = ?role, "Authenticated");
            AuthOutcome::Authenticated {
                token: BearerToken::new(token),
                user_email,
            }
        }
        None => AuthOutcome::Skipped {
            reason: "Login response did not contain a token".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;
    use std::time::Duration;

    fn client() -> HttpClient {
        HttpClient::new(Duration::from_secs(5)).expect("client")
    }

    fn credentials() -> Credentials {
        Credentials::new("admin@example.com", "s3cret")
    }

    #[tokio::test]
    async fn authenticate_returns_token_on_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", LOGIN_PATH)
            .match_body(Matcher::Json(json!({"email": "admin@example.com", "password": "s3cret"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token":"tok-123","user":{"email":"admin@example.com","role":"admin"}}"#)
            .create_async()
            .await;

        let outcome = authenticate(&client(), &server.url(), &credentials()).await;

        mock.assert_async().await;
        match outcome {
            AuthOutcome::Authenticated { token, user_email } => {
                assert_eq!(token.header_value(), "Bearer tok-123");
                assert_eq!(user_email.as_deref(), Some("admin@example.com"));
            }
            AuthOutcome::Skipped { reason } => panic!("unexpected skip: {reason}"),
        }
    }

    #[tokio::test]
    async fn authenticate_skips_on_rejection() {
        let mut server = mockito::Server::new_async().await;
        let _login = server
            .mock("POST", LOGIN_PATH)
            .with_status(401)
            .with_body(r#"{"detail":"Invalid credentials"}"#)
            .create_async()
            .await;

        let outcome = authenticate(&client(), &server.url(), &credentials()).await;

        assert!(matches!(outcome, AuthOutcome::Skipped { reason } if reason.contains("401")));
    }

    #[tokio::test]
    async fn authenticate_skips_when_token_missing() {
        let mut server = mockito::Server::new_async().await;
        let _login = server
            .mock("POST", LOGIN_PATH)
            .with_status(200)
            .with_body(r#"{"token":"","user":{"email":"admin@example.com"}}"#)
            .create_async()
            .await;

        let outcome = authenticate(&client(), &server.url(), &credentials()).await;

        assert!(matches!(outcome, AuthOutcome::Skipped { .. }));
    }

    #[tokio::test]
    async fn authenticate_skips_when_service_unreachable() {
        let outcome = authenticate(&client(), "http://127.0.0.1:1", &credentials()).await;

        assert!(matches!(
            outcome,
            AuthOutcome::Skipped { reason } if reason.starts_with("Login request failed")
        ));
    }

    #[test]
    fn session_keeps_first_token() {
        let mut session = Session::new("https://api.example.com");
        assert!(session.set_token(BearerToken::new("first")));
        assert!(!session.set_token(BearerToken::new("second")));

        assert_eq!(session.token().map(BearerToken::header_value).as_deref(), Some("Bearer first"));
    }

    #[test]
    fn session_joins_paths() {
        let session = Session::new("https://api.example.com");
        assert_eq!(session.url("/api/projects"), "https://api.example.com/api/projects");
        assert_eq!(session.url("api/projects"), "https://api.example.com/api/projects");
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let rendered = format!("{:?} {:?}", credentials(), BearerToken::new("tok-123"));
        assert!(!rendered.contains("s3cret"));
        assert!(!rendered.contains("tok-123"));
    }
}
