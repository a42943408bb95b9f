use std::collections::HashMap;
use std::time::Instant;

use super::assertion::{Assertion, Violation};
use super::case::{AuthRequirement, StatusSet, TestCase};
use super::report::{AuthSummary, CaseResult, Outcome, RunReport};
use crate::auth::{self, AuthOutcome, Credentials, Session};
use crate::environment::{interpolate, interpolate_value};
use crate::http::client::{HttpClient, TransportError, TransportErrorKind};
use crate::http::request::RequestInput;
use crate::http::response::HttpResponse;

/// Executes test cases one at a time against a live service.
pub struct Runner {
    client: HttpClient,
    session: Session,
    credentials: Credentials,
    variables: HashMap<String, String>,
    filter: Option<String>,
    auth_failure: Option<String>,
}

impl Runner {
    pub fn new(
        client: HttpClient,
        session: Session,
        credentials: Credentials,
        variables: HashMap<String, String>,
    ) -> Self {
        Self {
            client,
            session,
            credentials,
            variables,
            filter: None,
            auth_failure: None,
        }
    }

    /// Only run cases whose name contains `filter`.
    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter.filter(|value| !value.is_empty());
        self
    }

    /// Log in and keep the token for every `Bearer` case that follows.
    pub async fn authenticate(&mut self) -> AuthSummary {
        match auth::authenticate(&self.client, self.session.base_url(), &self.credentials).await {
            AuthOutcome::Authenticated { token, user_email } => {
                tracing::debug!(user = ?user_email, "Storing session token");
                self.session.set_token(token);
                self.auth_failure = None;
                AuthSummary::Authenticated
            }
            AuthOutcome::Skipped { reason } => {
                tracing::warn!(%reason, "Authentication failed; dependent cases will be skipped");
                self.auth_failure = Some(reason.clone());
                AuthSummary::Skipped { reason }
            }
        }
    }

    pub async fn run_case(&self, case: &TestCase) -> CaseResult {
        let path = interpolate(case.path(), &self.variables);
        let started = Instant::now();

        let mut result = CaseResult {
            name: case.name().to_string(),
            method: case.method(),
            path: path.clone(),
            auth: case.auth(),
            outcome: Outcome::Passed,
            status: None,
            body: None,
            attempts: 0,
            duration_ms: 0,
        };

        let mut headers = Vec::new();
        if case.auth() == AuthRequirement::Bearer {
            let Some(token) = self.session.token() else {
                let reason = match &self.auth_failure {
                    Some(reason) => format!("Authentication unavailable: {reason}"),
                    None => "Authentication unavailable: no bearer token in session".to_string(),
                };
                tracing::info!(case = %case.name(), "Skipped");
                result.outcome = Outcome::Skipped { reason };
                return result;
            };
            headers.push(("Authorization".to_string(), token.header_value()));
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }

        let request = RequestInput {
            method: case.method(),
            url: self.session.url(&path),
            headers,
            body: case.body().map(|body| interpolate_value(body, &self.variables)),
        };
        let assertions = case
            .assertions()
            .iter()
            .map(|assertion| assertion.resolve(&self.variables))
            .collect::<Vec<_>>();

        for attempt in 1..=case.repeat() {
            result.attempts = attempt;

            match self.client.send(&request).await {
                Ok(response) => {
                    tracing::debug!(
                        case = %case.name(),
                        attempt,
                        status = response.status,
                        elapsed_ms = response.duration_ms,
                        "Response received"
                    );
                    result.status = Some(response.status);
                    result.body = Some(CaseResult::capture_body(&response.body));
                    result.outcome = evaluate(case.expected_status(), &assertions, &response);
                }
                Err(err) => {
                    result.status = None;
                    result.body = None;
                    result.outcome = Outcome::InfrastructureFailure { error: err };
                }
            }

            if !matches!(result.outcome, Outcome::Passed) {
                break;
            }
        }

        result.duration_ms = started.elapsed().as_millis() as u64;

        match &result.outcome {
            Outcome::Passed => {
                tracing::info!(
                    case = %case.name(),
                    status = ?result.status,
                    attempts = result.attempts,
                    "Passed"
                );
            }
            Outcome::Failed { violations } => {
                tracing::info!(
                    case = %case.name(),
                    status = ?result.status,
                    violations = violations.len(),
                    "Failed"
                );
            }
            Outcome::InfrastructureFailure { error } => {
                tracing::warn!(case = %case.name(), error = %error, "Request did not complete");
            }
            Outcome::Skipped { .. } => {}
        }

        result
    }

    /// Run `cases` in declaration order. Login happens first, and only when
    /// a selected case needs a bearer token.
    pub async fn run_suite(mut self, cases: &[TestCase]) -> RunReport {
        let started = Instant::now();
        let selected = cases
            .iter()
            .filter(|case| self.filter.as_deref().is_none_or(|filter| case.name().contains(filter)))
            .collect::<Vec<_>>();

        tracing::info!(
            selected = selected.len(),
            total = cases.len(),
            base_url = %self.session.base_url(),
            "Running suite"
        );

        let authentication = if selected.iter().any(|case| case.auth() == AuthRequirement::Bearer) {
            self.authenticate().await
        } else {
            AuthSummary::NotRequired
        };

        let mut results = Vec::with_capacity(selected.len());
        for case in selected {
            results.push(self.run_case(case).await);
        }

        RunReport::from_results(authentication, results, started.elapsed().as_millis() as u64)
    }
}

/// Status first; body checks only run once the status is acceptable.
fn evaluate(expected: &StatusSet, assertions: &[Assertion], response: &HttpResponse) -> Outcome {
    if !expected.contains(response.status) {
        return Outcome::Failed {
            violations: vec![Violation {
                check: "status".to_string(),
                expected: expected.to_string(),
                actual: format!("{} {}", response.status, response.status_text),
            }],
        };
    }

    if assertions.is_empty() {
        return Outcome::Passed;
    }

    let body = match response.json() {
        Ok(body) => body,
        Err(err) => {
            return Outcome::InfrastructureFailure {
                error: TransportError::new(
                    TransportErrorKind::MalformedBody,
                    format!("Response body is not JSON ({}): {err}", response.content_type),
                ),
            };
        }
    };

    let violations = assertions
        .iter()
        .filter_map(|assertion| assertion.evaluate(&body).err())
        .collect::<Vec<_>>();

    if violations.is_empty() {
        Outcome::Passed
    } else {
        Outcome::Failed { violations }
    }
}
