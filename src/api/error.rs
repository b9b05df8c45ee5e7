//! Typed API errors and the mapping from backend failures into them.
//!
//! The backend reports failures in several loosely documented shapes
//! (`message`, a field-keyed `errors` object, or a bare `fields` array).
//! [`ErrorBody::parse`] reads whatever is there and [`map_status`] turns
//! (status, body, auth cause) into one closed [`ApiError`].

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Longest raw-text body kept as an error message.
const MAX_TEXT_MESSAGE: usize = 200;

/// HTTP status code, or a sentinel for failures below the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Http(u16),
    NetworkUnreachable,
    CrossOriginRejected,
    Timeout,
    /// Any other failure with no HTTP response.
    Transport,
}

impl Status {
    /// The HTTP code, if a response was received.
    pub fn code(&self) -> Option<u16> {
        match self {
            Status::Http(code) => Some(*code),
            _ => None,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.code().is_none()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Http(code) => write!(f, "{}", code),
            Status::NetworkUnreachable => f.write_str("network-unreachable"),
            Status::CrossOriginRejected => f.write_str("cross-origin-rejected"),
            Status::Timeout => f.write_str("timeout"),
            Status::Transport => f.write_str("transport"),
        }
    }
}

/// Per-field validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Messages for one field.
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// First message in field order, used when the backend sent no summary.
    pub fn first_message(&self) -> Option<&str> {
        self.0.values().flatten().map(String::as_str).next()
    }

    fn from_field_names(fields: &[String]) -> Self {
        let mut errors = Self::new();
        for field in fields {
            errors.insert(field.as_str(), format!("The {} field is invalid.", field));
        }
        errors
    }

    /// Read the `errors` member in either shape the backend sends: an object
    /// of field to message(s), or an array of field names. Entries that are
    /// neither a string nor an array of strings are skipped.
    fn from_json(value: &Value) -> Option<Self> {
        let errors = match value {
            Value::Object(map) => {
                let mut errors = Self::new();
                for (field, messages) in map {
                    match messages {
                        Value::String(m) => errors.insert(field.as_str(), m.as_str()),
                        Value::Array(ms) => {
                            for m in ms.iter().filter_map(Value::as_str) {
                                errors.insert(field.as_str(), m);
                            }
                        }
                        _ => {}
                    }
                }
                errors
            }
            Value::Array(_) => Self::from_field_names(&string_items(value)?),
            _ => return None,
        };
        (!errors.is_empty()).then_some(errors)
    }
}

/// Error returned by every API call.
///
/// `message()` is never empty and `status()` is always present.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("{message}")]
    AuthRequired { message: String },

    #[error("{message}")]
    AuthExpired { message: String },

    #[error("{message}")]
    InvalidCredentials { message: String },

    #[error("{message}")]
    AccessDenied { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    ValidationFailed {
        message: String,
        errors: ValidationErrors,
    },

    #[error("{message}")]
    BadRequest {
        message: String,
        errors: Option<ValidationErrors>,
    },

    #[error("{message}")]
    ServerError { status: u16, message: String },

    #[error("{message}")]
    NetworkUnreachable { message: String },

    #[error("{message}")]
    CrossOriginRejected { message: String },

    #[error("{message}")]
    Timeout { message: String },

    #[error("{message}")]
    Unknown { status: Status, message: String },
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::AuthRequired { .. }
            | ApiError::AuthExpired { .. }
            | ApiError::InvalidCredentials { .. } => Status::Http(401),
            ApiError::AccessDenied { .. } => Status::Http(403),
            ApiError::NotFound { .. } => Status::Http(404),
            ApiError::ValidationFailed { .. } => Status::Http(422),
            ApiError::BadRequest { .. } => Status::Http(400),
            ApiError::ServerError { status, .. } => Status::Http(*status),
            ApiError::NetworkUnreachable { .. } => Status::NetworkUnreachable,
            ApiError::CrossOriginRejected { .. } => Status::CrossOriginRejected,
            ApiError::Timeout { .. } => Status::Timeout,
            ApiError::Unknown { status, .. } => *status,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::AuthRequired { message }
            | ApiError::AuthExpired { message }
            | ApiError::InvalidCredentials { message }
            | ApiError::AccessDenied { message }
            | ApiError::NotFound { message }
            | ApiError::ValidationFailed { message, .. }
            | ApiError::BadRequest { message, .. }
            | ApiError::ServerError { message, .. }
            | ApiError::NetworkUnreachable { message }
            | ApiError::CrossOriginRejected { message }
            | ApiError::Timeout { message }
            | ApiError::Unknown { message, .. } => message,
        }
    }

    /// Field-level messages, for validation failures that carry them.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            ApiError::ValidationFailed { errors, .. } => Some(errors),
            ApiError::BadRequest { errors, .. } => errors.as_ref(),
            _ => None,
        }
    }

    /// Whether this is one of the 401 kinds.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            ApiError::AuthRequired { .. }
                | ApiError::AuthExpired { .. }
                | ApiError::InvalidCredentials { .. }
        )
    }

    /// Low-level failure with the attempted URL for context.
    pub fn transport(url: &str, detail: impl fmt::Display) -> Self {
        ApiError::Unknown {
            status: Status::Transport,
            message: format!("Request to {} failed: {}", url, detail),
        }
    }
}

/// What a 401 means for the request that received it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthCause {
    /// The login call itself was rejected.
    InvalidCredentials,
    /// The profile fetch failed: the session is gone.
    SessionExpired,
    /// An admin call failed: the admin session is gone.
    AdminSessionExpired,
    /// Anything else that needs a signed-in user.
    Required,
}

/// Failure body as far as it could be understood.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorBody {
    pub message: Option<String>,
    pub errors: Option<ValidationErrors>,
    pub fields: Option<Vec<String>>,
    /// Raw body when it was not JSON.
    pub text: Option<String>,
}

impl ErrorBody {
    /// JSON first, then raw text; an empty or unreadable body yields nothing.
    ///
    /// Each JSON member is read on its own, so a badly shaped one is dropped
    /// without losing the others.
    pub fn parse(bytes: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(map)) => Self {
                message: map
                    .get("message")
                    .and_then(Value::as_str)
                    .filter(|m| !m.trim().is_empty())
                    .map(str::to_string),
                errors: map.get("errors").and_then(ValidationErrors::from_json),
                fields: map
                    .get("fields")
                    .or_else(|| map.get("failed_fields"))
                    .and_then(string_items)
                    .filter(|f| !f.is_empty()),
                text: None,
            },
            Ok(Value::String(message)) if !message.trim().is_empty() => Self {
                message: Some(truncate(&message, MAX_TEXT_MESSAGE)),
                ..Self::default()
            },
            _ => {
                let text = String::from_utf8_lossy(bytes).trim().to_string();
                Self {
                    text: (!text.is_empty()).then(|| truncate(&text, MAX_TEXT_MESSAGE)),
                    ..Self::default()
                }
            }
        }
    }

    /// Field map from `errors`, else from `fields`.
    fn validation_errors(&self) -> Option<ValidationErrors> {
        self.errors.clone().or_else(|| {
            self.fields
                .as_deref()
                .map(ValidationErrors::from_field_names)
        })
    }

    /// Best message the body offers, else one naming the status.
    fn derived_message(&self, status: u16) -> String {
        self.message
            .clone()
            .or_else(|| self.text.clone())
            .unwrap_or_else(|| format!("Request failed with status {}", status))
    }
}

/// Map a non-2xx response to an [`ApiError`].
///
/// `auth` is only consulted for 401.
pub fn map_status(status: u16, body: &ErrorBody, auth: AuthCause) -> ApiError {
    match status {
        401 => match auth {
            AuthCause::InvalidCredentials => ApiError::InvalidCredentials {
                message: body
                    .message
                    .clone()
                    .filter(|m| m != "Unauthenticated.")
                    .unwrap_or_else(|| "Invalid email or password.".to_string()),
            },
            AuthCause::SessionExpired => ApiError::AuthExpired {
                message: "Your session has expired. Please sign in again.".to_string(),
            },
            AuthCause::AdminSessionExpired => ApiError::AuthExpired {
                message: "Your admin session has expired. Please sign in again to continue."
                    .to_string(),
            },
            AuthCause::Required => ApiError::AuthRequired {
                message: "Authentication required. Please sign in to continue.".to_string(),
            },
        },
        403 => ApiError::AccessDenied {
            message: body.message.clone().unwrap_or_else(|| {
                "Access denied. You do not have permission to perform this action.".to_string()
            }),
        },
        404 => ApiError::NotFound {
            message: body
                .message
                .clone()
                .unwrap_or_else(|| "The requested resource was not found.".to_string()),
        },
        422 => {
            let errors = body.validation_errors().unwrap_or_default();
            let message = body
                .message
                .clone()
                .or_else(|| errors.first_message().map(str::to_string))
                .or_else(|| body.text.clone())
                .unwrap_or_else(|| "Validation failed.".to_string());
            ApiError::ValidationFailed { message, errors }
        }
        400 => ApiError::BadRequest {
            message: body
                .message
                .clone()
                .unwrap_or_else(|| "Bad request. Please check your input.".to_string()),
            errors: body.validation_errors(),
        },
        500..=599 => ApiError::ServerError {
            status,
            message: "Server error. Please try again later.".to_string(),
        },
        _ => ApiError::Unknown {
            status: Status::Http(status),
            message: body.derived_message(status),
        },
    }
}

/// String members of a JSON array; `None` when `value` is not an array.
fn string_items(value: &Value) -> Option<Vec<String>> {
    let items = value.as_array()?;
    Some(
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
    )
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
