//! HTTP client with per-route credential injection and typed errors.
//!
//! Every call is classified against the route table. Protected calls carry
//! the stored bearer credential when there is one; public calls never do.
//! Non-2xx responses and transport failures come back as [`ApiError`].
//! A 401 may clear the stored session, which is announced on the session
//! event channel rather than acted on here.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::Form;
use reqwest::redirect::Policy;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

use super::error::{map_status, ApiError, AuthCause, ErrorBody, Status};
use super::routes::{self, RouteTable};
use super::types::{Payload, RequestDescriptor};
use crate::config::{ClientConfig, ConfigError};
use crate::session::{ClearReason, Credential, CredentialStore, SessionEvent, SessionEvents};

/// Redirect hops followed before giving up.
const MAX_REDIRECTS: usize = 10;

const JSON: &str = "application/json";

/// Redirect to a different origin, refused so neither the bearer header nor
/// any other request state leaves the API origin.
#[derive(Debug, Error)]
#[error("redirect to {to} rejected: cross-origin")]
struct CrossOriginRedirect {
    to: String,
}

/// HTTP client for the storefront API.
///
/// Holds no global state: the credential store is injected, so several
/// clients (or tests) can run side by side.
pub struct ApiClient {
    http: Client,
    base_url: String,
    routes: RouteTable,
    credentials: Arc<CredentialStore>,
    events: SessionEvents,
    current_view: RwLock<Option<String>>,
    login_view: String,
    redirect_delay: Duration,
    grace_window: Duration,
}

impl ApiClient {
    /// Create a client for `config.api_base_url` using the storefront route table.
    pub fn new(config: &ClientConfig, credentials: Arc<CredentialStore>) -> Result<Self, ConfigError> {
        reqwest::Url::parse(&config.api_base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: config.api_base_url.clone(),
            reason: e.to_string(),
        })?;

        // No cookie store: the bearer header is the only auth channel.
        let mut builder = Client::builder()
            .user_agent(format!("storefront-client/{}", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.connect_timeout)
            .redirect(same_origin_redirects());
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            routes: RouteTable::storefront(),
            credentials,
            events: SessionEvents::new(),
            current_view: RwLock::new(None),
            login_view: config.login_view.clone(),
            redirect_delay: config.redirect_delay,
            grace_window: config.grace_window,
        })
    }

    /// Replace the route table.
    pub fn with_routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Receive session events (credential cleared, login redirect).
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Tell the client which view the application is showing.
    ///
    /// Used to decide whether a lost admin session should redirect to login.
    pub fn set_current_view(&self, view: impl Into<String>) {
        *self.current_view.write().unwrap_or_else(|e| e.into_inner()) = Some(view.into());
    }

    /// Drop the stored credential and session data and announce it.
    pub fn clear_session(&self, reason: ClearReason) {
        self.credentials.clear_credential();
        self.events.emit(SessionEvent::CredentialCleared(reason));
    }

    // ── Verb façade ─────────────────────────────────────────────────────

    /// GET with `params` serialized into the query string (`&()` for none).
    pub async fn get<Q>(&self, path: &str, params: &Q) -> Result<Value, ApiError>
    where
        Q: Serialize + ?Sized,
    {
        let query = query_pairs(params)?;
        self.execute(RequestDescriptor::new(Method::GET, path).query(query))
            .await
    }

    pub async fn post<B>(&self, path: &str, body: &B) -> Result<Value, ApiError>
    where
        B: Serialize + ?Sized,
    {
        self.send_json(Method::POST, path, body).await
    }

    pub async fn put<B>(&self, path: &str, body: &B) -> Result<Value, ApiError>
    where
        B: Serialize + ?Sized,
    {
        self.send_json(Method::PUT, path, body).await
    }

    pub async fn patch<B>(&self, path: &str, body: &B) -> Result<Value, ApiError>
    where
        B: Serialize + ?Sized,
    {
        self.send_json(Method::PATCH, path, body).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        self.execute(RequestDescriptor::new(Method::DELETE, path))
            .await
    }

    /// POST a multipart form (file and image uploads).
    pub async fn post_multipart(&self, path: &str, form: Form) -> Result<Value, ApiError> {
        self.execute(RequestDescriptor::new(Method::POST, path).payload(form))
            .await
    }

    async fn send_json<B>(&self, method: Method, path: &str, body: &B) -> Result<Value, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Unknown {
            status: Status::Transport,
            message: format!("Failed to serialize request body for {}: {}", path, e),
        })?;
        self.execute(RequestDescriptor::new(method, path).payload(body))
            .await
    }

    // ── Executor ────────────────────────────────────────────────────────

    /// Send one request and settle it into a JSON body or an [`ApiError`].
    pub async fn execute(&self, request: RequestDescriptor) -> Result<Value, ApiError> {
        let RequestDescriptor {
            method,
            path,
            query,
            payload,
            mut headers,
        } = request;

        // 1. Resolve URL and classify
        let url = self.resolve_url(&path, &query);
        let public = !self.routes.requires_auth(&method, &path);

        // 2. Credential only for protected routes
        let credential = if public {
            None
        } else {
            self.credentials.credential()
        };
        log::debug!(
            "{} {} ({}{})",
            method,
            routes::route_path(&path),
            if public { "public" } else { "protected" },
            if credential.is_some() { ", bearer" } else { "" }
        );

        // 3. Build: defaults, then caller overrides, then the credential
        let mut builder = self.http.request(method, &url).header(ACCEPT, JSON);
        builder = match payload {
            Payload::Empty => builder.header(CONTENT_TYPE, JSON),
            Payload::Json(body) => builder.header(CONTENT_TYPE, JSON).json(&body),
            Payload::Multipart(form) => {
                headers.remove(CONTENT_TYPE);
                builder.multipart(form)
            }
        };
        headers.remove(AUTHORIZATION);
        builder = builder.headers(headers);
        if let Some(ref c) = credential {
            builder = builder.bearer_auth(c.expose());
        }

        // 4. Send
        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(&url, e))?;

        // 5. Settle
        if status.is_success() {
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(Value::Null);
            }
            return serde_json::from_slice(&bytes)
                .map_err(|e| ApiError::transport(&url, format!("invalid JSON in response: {}", e)));
        }

        let body = ErrorBody::parse(&bytes);
        let cause = if status.as_u16() == 401 {
            self.handle_unauthorized(&path, public, credential.as_ref())
        } else {
            AuthCause::Required
        };
        let err = map_status(status.as_u16(), &body, cause);
        log::debug!("{} failed: {} ({})", routes::route_path(&path), err, err.status());
        Err(err)
    }

    /// Session cleanup for a 401, returning what the 401 means.
    fn handle_unauthorized(
        &self,
        path: &str,
        public: bool,
        sent: Option<&Credential>,
    ) -> AuthCause {
        let route = routes::route_path(path).to_string();

        if routes::is_login_path(path) {
            return AuthCause::InvalidCredentials;
        }

        if public {
            // A public call never needs a credential, so whatever is stored is stale.
            if self.credentials.credential().is_some() {
                log::warn!("Public endpoint {} returned 401, clearing stored credential", route);
                self.clear_session(ClearReason::StaleOnPublic { path: route });
            }
            return AuthCause::Required;
        }

        let cause = if routes::is_profile_path(path) {
            AuthCause::SessionExpired
        } else if routes::is_admin_path(path) {
            AuthCause::AdminSessionExpired
        } else {
            AuthCause::Required
        };

        let current = self.credentials.credential();
        if let (Some(sent), Some(current)) = (sent, current.as_ref()) {
            if sent != current {
                log::info!("401 from {} used a replaced credential, keeping the new one", route);
                return cause;
            }
        }
        if self.within_grace_window() {
            log::info!("401 from {} within the post-login grace window, keeping credential", route);
            return cause;
        }

        if current.is_some() {
            log::warn!("Protected endpoint {} returned 401, clearing session", route);
            self.clear_session(ClearReason::Unauthorized { path: route });
        }
        if self.on_admin_view() {
            self.events
                .schedule_redirect(self.login_view.clone(), self.redirect_delay);
        }
        cause
    }

    fn within_grace_window(&self) -> bool {
        self.credentials
            .credential_age()
            .is_some_and(|age| age < self.grace_window)
    }

    /// Whether the current view is an admin view other than the login view.
    fn on_admin_view(&self) -> bool {
        let view = self.current_view.read().unwrap_or_else(|e| e.into_inner());
        view.as_deref().is_some_and(|v| {
            routes::is_admin_path(v) && routes::route_path(v) != routes::route_path(&self.login_view)
        })
    }

    fn resolve_url(&self, path: &str, query: &[(String, String)]) -> String {
        let mut url = self.base_url.clone();
        if !path.starts_with('/') {
            url.push('/');
        }
        url.push_str(path);

        if !query.is_empty() {
            url.push(if path.contains('?') { '&' } else { '?' });
            let encoded: Vec<String> = query
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect();
            url.push_str(&encoded.join("&"));
        }
        url
    }
}

/// Deserialize a response body into a typed value.
pub fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Unknown {
        status: Status::Transport,
        message: format!("Unexpected response from {}: {}", path, e),
    })
}

/// Flatten query parameters into key/value pairs.
///
/// Top-level object fields become pairs, `null` is skipped, arrays repeat as
/// `key[]`. `()` or `None` yields no pairs.
pub fn query_pairs<Q: Serialize + ?Sized>(params: &Q) -> Result<Vec<(String, String)>, ApiError> {
    let invalid = |detail: String| ApiError::Unknown {
        status: Status::Transport,
        message: format!("Invalid query parameters: {}", detail),
    };

    let map = match serde_json::to_value(params).map_err(|e| invalid(e.to_string()))? {
        Value::Null => return Ok(Vec::new()),
        Value::Object(map) => map,
        other => return Err(invalid(format!("expected an object, got {}", other))),
    };

    let mut pairs = Vec::new();
    for (key, value) in map {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                let key = format!("{}[]", key);
                for item in items {
                    if let Some(v) = scalar(item) {
                        pairs.push((key.clone(), v));
                    }
                }
            }
            other => {
                if let Some(v) = scalar(other) {
                    pairs.push((key, v));
                }
            }
        }
    }
    Ok(pairs)
}

fn scalar(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Refuse redirects that leave the origin of the original request.
fn same_origin_redirects() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() > MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        let target = attempt.url().origin();
        let crosses = attempt
            .previous()
            .first()
            .is_some_and(|first| first.origin() != target);
        if crosses {
            let to = target.ascii_serialization();
            attempt.error(CrossOriginRedirect { to })
        } else {
            attempt.follow()
        }
    })
}

/// Classify a failure that produced no HTTP response.
fn transport_error(url: &str, err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout {
            message: "The server took too long to respond. Please try again.".to_string(),
        };
    }
    if is_cross_origin(&err) {
        return ApiError::CrossOriginRejected {
            message: "The request was blocked because the server redirected to a different origin. \
                      Check the API URL configuration."
                .to_string(),
        };
    }
    if err.is_connect() || mentions_unreachable(&err) {
        return ApiError::NetworkUnreachable {
            message: "Unable to reach the server. Please check your internet connection and try again."
                .to_string(),
        };
    }
    ApiError::transport(url, err)
}

fn is_cross_origin(err: &reqwest::Error) -> bool {
    if !err.is_redirect() {
        return false;
    }
    let mut source = std::error::Error::source(err);
    while let Some(e) = source {
        if e.is::<CrossOriginRedirect>() || e.to_string().contains("cross-origin") {
            return true;
        }
        source = e.source();
    }
    false
}

fn mentions_unreachable(err: &reqwest::Error) -> bool {
    const SIGNATURES: [&str; 5] = [
        "failed to fetch",
        "dns error",
        "connection refused",
        "connection reset",
        "network is unreachable",
    ];

    let mut texts = vec![err.to_string()];
    let mut source = std::error::Error::source(err);
    while let Some(e) = source {
        texts.push(e.to_string());
        source = e.source();
    }
    texts.iter().any(|t| {
        let t = t.to_lowercase();
        SIGNATURES.iter().any(|s| t.contains(s))
    })
}
