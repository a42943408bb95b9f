//! # Settings & Variables
//!
//! Resolves where the suite runs and as whom. Sources are layered, lowest
//! precedence first: built-in defaults, a TOML file, `BLUEVIEW_*` environment
//! variables (after loading `.env`), then command-line overrides.
//!
//! Also provides `{{variable}}` interpolation for path templates, request
//! bodies and expected values.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, Source};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::auth::Credentials;

pub const DEFAULT_CONFIG_FILE: &str = "contract.toml";
pub const ENV_PREFIX: &str = "BLUEVIEW";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("missing required setting `{key}` (set {env} or `{key}` in the config file)")]
    Missing { key: &'static str, env: &'static str },
    #[error("invalid base URL `{url}`: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("timeout_ms must be greater than zero")]
    ZeroTimeout,
}

#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    base_url: Option<String>,
    email: Option<String>,
    password: Option<String>,
    timeout_ms: Option<u64>,
    expected_role: Option<String>,
}

/// Command-line values; these win over every other source.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
}

/// Validated settings for one suite run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub base_url: String,
    pub credentials: Credentials,
    pub timeout: Duration,
    /// Role the logged-in user must carry, when set.
    pub expected_role: Option<String>,
}

impl Settings {
    /// Load settings from `.env`, the config file and the process environment.
    ///
    /// An explicit `config_path` must exist; the default `contract.toml` is optional.
    pub fn load(config_path: Option<&Path>, overrides: &Overrides) -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }

        let environment = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .ignore_empty(true);

        match config_path {
            Some(path) => {
                Self::from_sources(File::from(path).required(true), environment, overrides)
            }
            None => Self::from_sources(
                File::with_name(DEFAULT_CONFIG_FILE).required(false),
                environment,
                overrides,
            ),
        }
    }

    fn from_sources<F>(
        file: F,
        environment: Environment,
        overrides: &Overrides,
    ) -> Result<Self, ConfigError>
    where
        F: Source + Send + Sync + 'static,
    {
        let raw = Config::builder()
            .add_source(file)
            .add_source(environment)
            .build()?
            .try_deserialize::<RawSettings>()?;

        Self::validate(raw, overrides)
    }

    fn validate(raw: RawSettings, overrides: &Overrides) -> Result<Self, ConfigError> {
        let base_url = overrides
            .base_url
            .clone()
            .or(raw.base_url)
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::Missing {
                key: "base_url",
                env: "BLUEVIEW_BASE_URL",
            })?;
        let base_url = normalize_base_url(&base_url)?;

        let email = raw.email.filter(|value| !value.trim().is_empty()).ok_or(ConfigError::Missing {
            key: "email",
            env: "BLUEVIEW_EMAIL",
        })?;
        let password = raw.password.filter(|value| !value.is_empty()).ok_or(ConfigError::Missing {
            key: "password",
            env: "BLUEVIEW_PASSWORD",
        })?;

        let timeout_ms = overrides.timeout_ms.or(raw.timeout_ms).unwrap_or(DEFAULT_TIMEOUT_MS);
        if timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(Self {
            base_url,
            credentials: Credentials::new(email.trim(), password),
            timeout: Duration::from_millis(timeout_ms),
            expected_role: raw.expected_role.filter(|value| !value.trim().is_empty()),
        })
    }
}

fn normalize_base_url(input: &str) -> Result<String, ConfigError> {
    let trimmed = input.trim().trim_end_matches('/');
    let url = reqwest::Url::parse(trimmed).map_err(|err| ConfigError::InvalidBaseUrl {
        url: trimmed.to_string(),
        reason: err.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidBaseUrl {
            url: trimmed.to_string(),
            reason: format!("unsupported scheme `{}`", url.scheme()),
        });
    }

    Ok(trimmed.to_string())
}

/// Build the variable map used for interpolation.
/// Priority: settings override suite defaults.
pub fn build_variable_map(
    settings: &Settings,
    suite_variables: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut variables = suite_variables.clone();

    variables.insert("base_url".to_string(), settings.base_url.clone());
    variables.insert("email".to_string(), settings.credentials.email().to_string());
    variables.insert("password".to_string(), settings.credentials.password().to_string());
    if let Some(role) = &settings.expected_role {
        variables.insert("expected_role".to_string(), role.clone());
    }

    variables
}

/// Interpolate `{{key}}` placeholders in a string using the provided variable map.
///
/// A single left-to-right pass: substituted values are never rescanned, and
/// unknown placeholders are left in place.
pub fn interpolate(input: &str, variables: &HashMap<String, String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find("{{") {
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("}}") else {
            break;
        };
        let key = &after_open[..close];

        // `{{a {{b}}`: only the innermost opening brace pairs with the close.
        if let Some(inner) = key.rfind("{{") {
            let literal = open + 2 + inner;
            result.push_str(&rest[..literal]);
            rest = &rest[literal..];
            continue;
        }

        result.push_str(&rest[..open]);
        match variables.get(key) {
            Some(value) => result.push_str(value),
            None => result.push_str(&rest[open..open + 2 + close + 2]),
        }
        rest = &after_open[close + 2..];
    }

    result.push_str(rest);
    result
}

/// Interpolate every string inside a JSON document. Keys are left untouched.
pub fn interpolate_value(input: &Value, variables: &HashMap<String, String>) -> Value {
    match input {
        Value::String(text) => Value::String(interpolate(text, variables)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| interpolate_value(item, variables))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), interpolate_value(value, variables)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;
    use serde_json::json;

    fn env(pairs: &[(&str, &str)]) -> Environment {
        let map = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .ignore_empty(true)
            .source(Some(map))
    }

    fn toml(content: &str) -> File<config::FileSourceString, FileFormat> {
        File::from_str(content, FileFormat::Toml)
    }

    #[test]
    fn loads_everything_from_environment() {
        let settings = Settings::from_sources(
            toml(""),
            env(&[
                ("BLUEVIEW_BASE_URL", "https://api.example.com/"),
                ("BLUEVIEW_EMAIL", "admin@example.com"),
                ("BLUEVIEW_PASSWORD", "s3cret"),
                ("BLUEVIEW_TIMEOUT_MS", "2500"),
            ]),
            &Overrides::default(),
        )
        .expect("settings");

        assert_eq!(settings.base_url, "https://api.example.com");
        assert_eq!(settings.credentials.email(), "admin@example.com");
        assert_eq!(settings.credentials.password(), "s3cret");
        assert_eq!(settings.timeout, Duration::from_millis(2500));
        assert!(settings.expected_role.is_none());
    }

    #[test]
    fn environment_overrides_file_and_flags_override_both() {
        let file = toml(
            r#"
            base_url = "https://file.example.com"
            email = "file@example.com"
            password = "from-file"
            timeout_ms = 4000
            expected_role = "admin"
            "#,
        );
        let overrides = Overrides {
            base_url: Some("http://localhost:8000".to_string()),
            timeout_ms: None,
        };

        let settings = Settings::from_sources(
            file,
            env(&[("BLUEVIEW_EMAIL", "env@example.com")]),
            &overrides,
        )
        .expect("settings");

        assert_eq!(settings.base_url, "http://localhost:8000");
        assert_eq!(settings.credentials.email(), "env@example.com");
        assert_eq!(settings.credentials.password(), "from-file");
        assert_eq!(settings.timeout, Duration::from_millis(4000));
        assert_eq!(settings.expected_role.as_deref(), Some("admin"));
    }

    #[test]
    fn default_timeout_applies() {
        let settings = Settings::from_sources(
            toml("base_url = \"https://a.example.com\"\nemail = \"a@b.c\"\npassword = \"pw\""),
            env(&[]),
            &Overrides::default(),
        )
        .expect("settings");

        assert_eq!(settings.timeout, Duration::from_millis(DEFAULT_TIMEOUT_MS));
    }

    #[test]
    fn numeric_password_is_kept_verbatim() {
        let settings = Settings::from_sources(
            toml(""),
            env(&[
                ("BLUEVIEW_BASE_URL", "https://a.example.com"),
                ("BLUEVIEW_EMAIL", "a@b.c"),
                ("BLUEVIEW_PASSWORD", "00123"),
            ]),
            &Overrides::default(),
        )
        .expect("settings");

        assert_eq!(settings.credentials.password(), "00123");
    }

    #[test]
    fn missing_base_url_is_fatal() {
        let err = Settings::from_sources(
            toml(""),
            env(&[("BLUEVIEW_EMAIL", "a@b.c"), ("BLUEVIEW_PASSWORD", "pw")]),
            &Overrides::default(),
        )
        .expect_err("missing base url");

        assert!(matches!(err, ConfigError::Missing { key: "base_url", .. }));
    }

    #[test]
    fn missing_credentials_are_fatal() {
        let err = Settings::from_sources(
            toml(""),
            env(&[("BLUEVIEW_BASE_URL", "https://a.example.com"), ("BLUEVIEW_EMAIL", "a@b.c")]),
            &Overrides::default(),
        )
        .expect_err("missing password");

        assert!(matches!(err, ConfigError::Missing { key: "password", .. }));
    }

    #[test]
    fn rejects_non_http_base_url() {
        let err = Settings::from_sources(
            toml(""),
            env(&[
                ("BLUEVIEW_BASE_URL", "ftp://files.example.com"),
                ("BLUEVIEW_EMAIL", "a@b.c"),
                ("BLUEVIEW_PASSWORD", "pw"),
            ]),
            &Overrides::default(),
        )
        .expect_err("bad scheme");

        assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn rejects_zero_timeout() {
        let overrides = Overrides {
            base_url: None,
            timeout_ms: Some(0),
        };
        let err = Settings::from_sources(
            toml("base_url = \"https://a.example.com\"\nemail = \"a@b.c\"\npassword = \"pw\""),
            env(&[]),
            &overrides,
        )
        .expect_err("zero timeout");

        assert!(matches!(err, ConfigError::ZeroTimeout));
    }

    #[test]
    fn interpolate_replaces_placeholders() {
        let mut vars = HashMap::new();
        vars.insert("project_id".to_string(), "invalid_id".to_string());

        let result = interpolate("/api/projects/{{project_id}}/dropbox-files", &vars);
        assert_eq!(result, "/api/projects/invalid_id/dropbox-files");
    }

    #[test]
    fn interpolate_leaves_unknown_placeholders() {
        let result = interpolate("/api/projects/{{unknown}}", &HashMap::new());
        assert_eq!(result, "/api/projects/{{unknown}}");
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let vars = || {
            HashMap::from([
                ("email".to_string(), "admin@example.com".to_string()),
                ("password".to_string(), "p{{email}}w".to_string()),
            ])
        };

        // Fresh maps get fresh iteration orders.
        for _ in 0..32 {
            assert_eq!(
                interpolate("{{email}}:{{password}}", &vars()),
                "admin@example.com:p{{email}}w"
            );
        }
        let vars = vars();
        assert_eq!(interpolate("{{open {{email}} }}", &vars), "{{open admin@example.com }}");
        assert_eq!(interpolate("{{email", &vars), "{{email");
    }

    #[test]
    fn interpolate_value_walks_nested_documents() {
        let mut vars = HashMap::new();
        vars.insert("email".to_string(), "admin@example.com".to_string());

        let body = json!({
            "email": "{{email}}",
            "tags": ["{{email}}", 3],
            "nested": {"{{email}}": true}
        });
        let resolved = interpolate_value(&body, &vars);

        assert_eq!(
            resolved,
            json!({
                "email": "admin@example.com",
                "tags": ["admin@example.com", 3],
                "nested": {"{{email}}": true}
            })
        );
    }

    #[test]
    fn settings_variables_override_suite_defaults() {
        let settings = Settings::from_sources(
            toml("base_url = \"https://a.example.com\"\nemail = \"a@b.c\"\npassword = \"pw\""),
            env(&[]),
            &Overrides::default(),
        )
        .expect("settings");
        let mut suite = HashMap::new();
        suite.insert("email".to_string(), "placeholder".to_string());
        suite.insert("project_id".to_string(), "invalid_id".to_string());

        let vars = build_variable_map(&settings, &suite);
        assert_eq!(vars.get("email").map(String::as_str), Some("a@b.c"));
        assert_eq!(vars.get("project_id").map(String::as_str), Some("invalid_id"));
    }
}
