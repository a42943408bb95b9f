use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use super::assertion::Violation;
use super::case::AuthRequirement;
use crate::http::client::TransportError;
use crate::http::method::HttpMethod;

pub const EXIT_OK: u8 = 0;
pub const EXIT_CONTRACT_FAILURE: u8 = 1;
pub const EXIT_INFRASTRUCTURE_FAILURE: u8 = 3;

/// Captured bodies are cut to this many characters.
const MAX_CAPTURED_BODY_CHARS: usize = 4096;
const MAX_PRINTED_BODY_CHARS: usize = 512;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write report file `{}`: {source}", .path.display())]
    Write { path: PathBuf, source: std::io::Error },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed { violations: Vec<Violation> },
    InfrastructureFailure { error: TransportError },
    Skipped { reason: String },
}

impl Outcome {
    fn label(&self) -> &'static str {
        match self {
            Outcome::Passed => "PASS",
            Outcome::Failed { .. } => "FAIL",
            Outcome::InfrastructureFailure { .. } => "INFRA",
            Outcome::Skipped { .. } => "SKIP",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseResult {
    pub name: String,
    pub method: HttpMethod,
    pub path: String,
    pub auth: AuthRequirement,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub status: Option<u16>,
    pub body: Option<String>,
    pub attempts: u32,
    pub duration_ms: u64,
}

impl CaseResult {
    pub fn capture_body(body: &str) -> String {
        truncate(body, MAX_CAPTURED_BODY_CHARS)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AuthSummary {
    NotRequired,
    Authenticated,
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub infrastructure_failures: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub authentication: AuthSummary,
    pub results: Vec<CaseResult>,
}

impl RunReport {
    pub fn from_results(
        authentication: AuthSummary,
        results: Vec<CaseResult>,
        duration_ms: u64,
    ) -> Self {
        let count = |predicate: fn(&Outcome) -> bool| {
            results.iter().filter(|r| predicate(&r.outcome)).count()
        };

        Self {
            total: results.len(),
            passed: count(|o| matches!(o, Outcome::Passed)),
            failed: count(|o| matches!(o, Outcome::Failed { .. })),
            infrastructure_failures: count(|o| matches!(o, Outcome::InfrastructureFailure { .. })),
            skipped: count(|o| matches!(o, Outcome::Skipped { .. })),
            duration_ms,
            authentication,
            results,
        }
    }

    /// Contract failures dominate infrastructure failures; skips only fail
    /// the run when `fail_on_skip` is set.
    pub fn exit_code(&self, fail_on_skip: bool) -> u8 {
        if self.failed > 0 || (fail_on_skip && self.skipped > 0) {
            EXIT_CONTRACT_FAILURE
        } else if self.infrastructure_failures > 0 {
            EXIT_INFRASTRUCTURE_FAILURE
        } else {
            EXIT_OK
        }
    }

    pub fn render_text(&self, verbose: bool) -> String {
        let mut out = String::new();

        for result in &self.results {
            if !verbose && matches!(result.outcome, Outcome::Passed) {
                continue;
            }

            let _ = write!(
                out,
                "{:<5} {} {}  {}",
                result.outcome.label(),
                result.method,
                result.path,
                result.name
            );
            if let Some(status) = result.status {
                let _ = write!(out, " [{status}]");
            }
            let _ = writeln!(out, " ({} ms)", result.duration_ms);

            match &result.outcome {
                Outcome::Passed => {}
                Outcome::Failed { violations } => {
                    for violation in violations {
                        let _ = writeln!(out, "      {violation}");
                    }
                    if result.attempts > 1 {
                        let _ = writeln!(out, "      failed on attempt {}", result.attempts);
                    }
                }
                Outcome::InfrastructureFailure { error } => {
                    let _ = writeln!(out, "      {error}");
                }
                Outcome::Skipped { reason } => {
                    let _ = writeln!(out, "      {reason}");
                }
            }

            if !matches!(result.outcome, Outcome::Passed) {
                if let Some(body) = result.body.as_deref().filter(|body| !body.is_empty()) {
                    let _ = writeln!(out, "      body: {}", truncate(body, MAX_PRINTED_BODY_CHARS));
                }
            }
        }

        match &self.authentication {
            AuthSummary::NotRequired => {}
            AuthSummary::Authenticated => {
                let _ = writeln!(out, "auth: authenticated");
            }
            AuthSummary::Skipped { reason } => {
                let _ = writeln!(out, "auth: skipped dependent cases ({reason})");
            }
        }

        let _ = writeln!(
            out,
            "{} cases: {} passed, {} failed, {} infrastructure failures, {} skipped in {} ms",
            self.total,
            self.passed,
            self.failed,
            self.infrastructure_failures,
            self.skipped,
            self.duration_ms
        );

        out
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<(), ReportError> {
        let raw = self.to_json()?;
        fs::write(path, raw).map_err(|source| ReportError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => format!("{}…", &text[..index]),
        None => text.to_string(),
    }
}
