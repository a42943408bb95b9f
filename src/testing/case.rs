use std::collections::BTreeSet;
use std::fmt::{self, Display};

use serde::Serialize;
use serde_json::Value;

use super::assertion::Assertion;
use crate::http::method::HttpMethod;

/// How a case relates to the login step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthRequirement {
    /// Public endpoint; no Authorization header.
    None,
    /// Sends the session's bearer token. Skipped when login failed.
    Bearer,
    /// Deliberately omits the Authorization header to check a protected
    /// endpoint rejects the request. Runs whether or not login succeeded.
    Anonymous,
}

/// Status codes a case accepts. Several endpoints legitimately answer with
/// one of a few codes depending on the state of the remote account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSet(BTreeSet<u16>);

impl StatusSet {
    pub fn of(codes: impl IntoIterator<Item = u16>) -> Self {
        Self(codes.into_iter().collect())
    }

    pub fn contains(&self, status: u16) -> bool {
        self.0.contains(&status)
    }
}

impl Display for StatusSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes = self.0.iter().map(u16::to_string).collect::<Vec<_>>();
        match codes.as_slice() {
            [single] => write!(f, "{single}"),
            _ => write!(f, "one of {{{}}}", codes.join(", ")),
        }
    }
}

/// One request and the expectations its response must meet.
///
/// Built once with the `with_*`/`expect_*` methods and read-only afterwards.
#[derive(Debug, Clone)]
pub struct TestCase {
    name: String,
    method: HttpMethod,
    path: String,
    auth: AuthRequirement,
    body: Option<Value>,
    expected_status: StatusSet,
    assertions: Vec<Assertion>,
    repeat: u32,
}

impl TestCase {
    pub fn new(name: impl Into<String>, method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            path: path.into(),
            auth: AuthRequirement::None,
            body: None,
            expected_status: StatusSet::of([200]),
            assertions: Vec::new(),
            repeat: 1,
        }
    }

    pub fn get(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, HttpMethod::Get, path)
    }

    pub fn post(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, HttpMethod::Post, path)
    }

    pub fn delete(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, HttpMethod::Delete, path)
    }

    pub fn with_auth(mut self, auth: AuthRequirement) -> Self {
        self.auth = auth;
        self
    }

    pub fn bearer(self) -> Self {
        self.with_auth(AuthRequirement::Bearer)
    }

    pub fn anonymous(self) -> Self {
        self.with_auth(AuthRequirement::Anonymous)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn expect_status(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.expected_status = StatusSet::of(codes);
        self
    }

    pub fn expect(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    /// Send the request `times` times; every attempt must pass.
    pub fn repeated(mut self, times: u32) -> Self {
        self.repeat = times.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn auth(&self) -> AuthRequirement {
        self.auth
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn expected_status(&self) -> &StatusSet {
        &self.expected_status
    }

    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }

    pub fn repeat(&self) -> u32 {
        self.repeat
    }
}
