//! # Collections
//!
//! A collection is an ordered list of test cases plus the variables its
//! templates refer to. [`Collection::blueview`] is the contract of the
//! Blueview construction-management API: authentication, projects and the
//! Dropbox integration endpoints.

use std::collections::HashMap;

use serde_json::json;

use crate::auth::LOGIN_PATH;
use crate::http::method::HttpMethod;
use crate::testing::assertion::{Assertion, JsonKind};
use crate::testing::case::{AuthRequirement, TestCase};

/// Project id that no deployment should recognise.
pub const INVALID_PROJECT_ID: &str = "invalid_id";

const PROJECT_FILES_PATH: &str = "/api/projects/{{project_id}}/dropbox-files";

#[derive(Debug, Clone, Default)]
pub struct Collection {
    pub name: String,
    pub cases: Vec<TestCase>,
    pub variables: HashMap<String, String>,
}

impl Collection {
    /// `expected_role`, when set, is asserted on the login response's `user.role`.
    pub fn blueview(expected_role: Option<&str>) -> Self {
        let mut variables = HashMap::new();
        variables.insert("project_id".to_string(), INVALID_PROJECT_ID.to_string());

        let mut login = TestCase::post("login with valid credentials", LOGIN_PATH)
            .with_body(json!({"email": "{{email}}", "password": "{{password}}"}))
            .expect_status([200])
            .expect(Assertion::field_not_empty("token"))
            .expect(Assertion::field_present("user"))
            .expect(Assertion::field_equals("user.email", "{{email}}"));
        if expected_role.is_some() {
            login = login.expect(Assertion::field_equals("user.role", "{{expected_role}}"));
        }

        let mut cases = vec![
            login,
            TestCase::post("login with invalid credentials", LOGIN_PATH)
                .with_body(json!({"email": "invalid@example.com", "password": "wrongpassword"}))
                .expect_status([401]),
            TestCase::get("current user", "/api/auth/me")
                .bearer()
                .expect_status([200])
                .expect(Assertion::field_equals("email", "{{email}}")),
            TestCase::get("dropbox status", "/api/dropbox/status")
                .bearer()
                .expect_status([200])
                .expect(Assertion::field_is("connected", JsonKind::Boolean))
                .expect(Assertion::field_present("connected_at")),
            TestCase::get("dropbox auth url", "/api/dropbox/auth-url")
                .bearer()
                .expect_status([200])
                .expect(Assertion::field_contains("authorize_url", "dropbox.com/oauth2/authorize"))
                .expect(Assertion::field_contains("authorize_url", "client_id=")),
            TestCase::get("list projects", "/api/projects")
                .bearer()
                .expect_status([200])
                .expect(Assertion::body_is(JsonKind::Array)),
            // Not connected yields 400/403/404 depending on the deployment.
            TestCase::get("dropbox folders", "/api/dropbox/folders")
                .bearer()
                .expect_status([200, 400, 403, 404]),
            TestCase::get("dropbox files for invalid project", PROJECT_FILES_PATH)
                .bearer()
                .expect_status([400, 404, 422]),
            TestCase::delete("dropbox disconnect is idempotent", "/api/dropbox/disconnect")
                .bearer()
                .expect_status([200, 400, 404])
                .repeated(2),
        ];

        for (name, method, path) in [
            ("current user requires auth", HttpMethod::Get, "/api/auth/me"),
            ("dropbox status requires auth", HttpMethod::Get, "/api/dropbox/status"),
            ("dropbox auth url requires auth", HttpMethod::Get, "/api/dropbox/auth-url"),
            ("dropbox folders requires auth", HttpMethod::Get, "/api/dropbox/folders"),
            ("dropbox disconnect requires auth", HttpMethod::Delete, "/api/dropbox/disconnect"),
            ("list projects requires auth", HttpMethod::Get, "/api/projects"),
            ("dropbox files requires auth", HttpMethod::Get, PROJECT_FILES_PATH),
        ] {
            cases.push(
                TestCase::new(name, method, path)
                    .with_auth(AuthRequirement::Anonymous)
                    .expect_status([401, 403]),
            );
        }

        Self {
            name: "blueview".to_string(),
            cases,
            variables,
        }
    }
}
