//! Request descriptors and the request/response types of the storefront API.

use reqwest::header::HeaderMap;
use reqwest::multipart::Form;
use reqwest::Method;
use serde::{Deserialize, Serialize};

/// Body of an outgoing request.
pub enum Payload {
    Empty,
    Json(serde_json::Value),
    /// Multipart form; the transport sets its own boundary content type.
    Multipart(Form),
}

impl Payload {
    pub fn is_multipart(&self) -> bool {
        matches!(self, Payload::Multipart(_))
    }
}

impl From<Form> for Payload {
    fn from(form: Form) -> Self {
        Payload::Multipart(form)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}

/// One call, as described by the caller. Consumed by `ApiClient::execute`.
pub struct RequestDescriptor {
    pub method: Method,
    /// Path relative to the API base URL, e.g. `/products/42`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub payload: Payload,
    /// Applied after the defaults and replacing them.
    pub headers: HeaderMap,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            payload: Payload::Empty,
            headers: HeaderMap::new(),
        }
    }

    pub fn query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// Standard response wrapper: `{ success, message?, data }`.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub data: T,
}

/// Login request body sent to POST /auth/login.
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Registration request body sent to POST /auth/register.
#[derive(Debug, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

/// Signed-in user as returned by the auth endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Response from POST /auth/login and POST /auth/register.
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

/// Contact form submission sent to POST /contact.
#[derive(Debug, Serialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub category_id: Option<u64>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
}

/// Listing filters for GET /products.
#[derive(Debug, Default, Serialize)]
pub struct ProductQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_missing_optional_fields() {
        let parsed: Envelope<Vec<Category>> =
            serde_json::from_str(r#"{"data":[{"id":1,"name":"Shoes"}]}"#).unwrap();
        assert!(!parsed.success);
        assert!(parsed.message.is_none());
        assert_eq!(parsed.data[0].name, "Shoes");
    }

    #[test]
    fn test_auth_response_with_user() {
        let json = r#"{"success":true,"token":"tok","user":{"id":1,"name":"Ada","email":"a@x.io","role":"admin"}}"#;
        let parsed: AuthResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.token.as_deref(), Some("tok"));
        assert_eq!(parsed.user.unwrap().role.as_deref(), Some("admin"));
    }

    #[test]
    fn test_product_query_skips_unset() {
        let query = ProductQuery {
            page: Some(2),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&query).unwrap(), serde_json::json!({"page": 2}));
    }

    #[test]
    fn test_descriptor_builder() {
        let desc = RequestDescriptor::new(Method::PUT, "/admin/products/1")
            .payload(serde_json::json!({"name": "x"}));
        assert_eq!(desc.method, Method::PUT);
        assert!(!desc.payload.is_multipart());
        assert!(desc.query.is_empty());
    }
}
