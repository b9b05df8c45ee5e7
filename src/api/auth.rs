//! Sign-in, registration, profile, and sign-out.
//!
//! The credential is written to the store before `login` returns, so any
//! call issued after it completes carries the new token.

use super::client::{decode, ApiClient};
use super::error::ApiError;
use super::routes::{LOGIN_PATH, PROFILE_PATH};
use super::types::{AuthResponse, Envelope, LoginRequest, RegisterRequest, User};
use crate::session::ClearReason;

const REGISTER_PATH: &str = "/auth/register";
const LOGOUT_PATH: &str = "/auth/logout";

/// Sign in and store the issued credential and role.
pub async fn login(client: &ApiClient, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
    log::info!("Signing in as {}", email);

    let request = LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    };
    let resp: AuthResponse = decode(LOGIN_PATH, client.post(LOGIN_PATH, &request).await?)?;

    let token = match resp.token.as_deref() {
        Some(token) if resp.success && !token.is_empty() => token,
        _ => {
            return Err(ApiError::InvalidCredentials {
                message: resp
                    .message
                    .clone()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "Login failed. Please check your credentials.".to_string()),
            })
        }
    };

    store_session(client, token, resp.user.as_ref());
    log::info!("Signed in as {}", email);
    Ok(resp)
}

/// Create an account. Signs in as well when the backend issues a token.
pub async fn register(client: &ApiClient, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
    let resp: AuthResponse = decode(REGISTER_PATH, client.post(REGISTER_PATH, request).await?)?;

    if let Some(token) = resp.token.as_deref().filter(|t| !t.is_empty()) {
        store_session(client, token, resp.user.as_ref());
        log::info!("Registered and signed in as {}", request.email);
    }
    Ok(resp)
}

/// Profile of the signed-in user.
pub async fn me(client: &ApiClient) -> Result<User, ApiError> {
    let envelope: Envelope<User> = decode(PROFILE_PATH, client.get(PROFILE_PATH, &()).await?)?;
    Ok(envelope.data)
}

/// Sign out: tell the backend (best-effort), then clear local session data.
pub async fn logout(client: &ApiClient) {
    log::info!("Signing out");

    if client.credentials().credential().is_some() {
        if let Err(e) = client.post(LOGOUT_PATH, &serde_json::json!({})).await {
            log::warn!("Logout request failed (continuing local cleanup): {}", e);
        }
    }

    client.clear_session(ClearReason::Logout);
    log::info!("Signed out");
}

fn store_session(client: &ApiClient, token: &str, user: Option<&User>) {
    let store = client.credentials();
    store.set_credential(Some(token));
    store.set_role(user.and_then(|u| u.role.as_deref()));
}
