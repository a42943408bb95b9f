use serde_json::Value;

use super::method::HttpMethod;

/// A fully resolved request, ready to be sent.
#[derive(Debug, Clone)]
pub struct RequestInput {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}
