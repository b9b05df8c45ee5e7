//! Credential store: the single source of truth for the bearer credential.
//!
//! The credential lives in memory and is mirrored into durable storage so a
//! fresh process can pick it up. Storage is best-effort: the first failure
//! switches the store to memory-only for the rest of the process.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use zeroize::{Zeroize, ZeroizeOnDrop};

use super::storage::{KeyValueStore, StorageError};

/// Storage key for the bearer credential.
pub const TOKEN_KEY: &str = "auth_token";

/// Storage key for the signed-in user's role.
pub const ROLE_KEY: &str = "user_role";

/// Storage key for the login timestamp (unix milliseconds).
pub const LOGIN_TIME_KEY: &str = "login_time";

/// Keys written by earlier sessions that are removed on clear.
pub const LEGACY_KEYS: [&str; 2] = ["user", "admin_token"];

/// Opaque bearer string. Zeroed on drop, redacted in `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw bearer value, for the authorization header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Default)]
struct SessionState {
    credential: Option<Credential>,
    issued_at: Option<SystemTime>,
    role: Option<String>,
}

/// Process-wide authentication context, injected into the API client.
pub struct CredentialStore {
    storage: Arc<dyn KeyValueStore>,
    durable: AtomicBool,
    state: RwLock<SessionState>,
}

impl CredentialStore {
    /// Create a store backed by the given durable storage.
    ///
    /// Nothing is read until the credential is first requested.
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            durable: AtomicBool::new(true),
            state: RwLock::new(SessionState::default()),
        }
    }

    /// Whether durable storage is still in use (false after a storage failure).
    pub fn is_durable(&self) -> bool {
        self.durable.load(Ordering::SeqCst)
    }

    /// Set or clear the credential in memory and durable storage.
    ///
    /// Setting the value already held is a no-op, so the login timestamp of
    /// the live session is preserved.
    pub fn set_credential(&self, value: Option<&str>) {
        let Some(value) = value else {
            let mut state = self.write_state();
            state.credential = None;
            state.issued_at = None;
            self.persist(|s| {
                s.remove(TOKEN_KEY)?;
                s.remove(LOGIN_TIME_KEY)
            });
            return;
        };

        let mut state = self.write_state();
        if state.credential.as_ref().map(Credential::expose) == Some(value) {
            return;
        }

        let now = SystemTime::now();
        let millis = unix_millis(now).to_string();
        state.credential = Some(Credential::new(value));
        state.issued_at = Some(now);
        self.persist(|s| s.set_many(&[(TOKEN_KEY, value), (LOGIN_TIME_KEY, &millis)]));
    }

    /// Current credential, rehydrated from durable storage when memory is empty.
    pub fn credential(&self) -> Option<Credential> {
        if let Some(credential) = self.read_state().credential.clone() {
            return Some(credential);
        }

        let mut state = self.write_state();
        // Another caller may have rehydrated while we waited for the lock.
        if state.credential.is_some() {
            return state.credential.clone();
        }

        let token = self.persist(|s| s.get(TOKEN_KEY)).flatten()?;
        if token.is_empty() {
            return None;
        }

        state.issued_at = self
            .persist(|s| s.get(LOGIN_TIME_KEY))
            .flatten()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(|ms| UNIX_EPOCH + Duration::from_millis(ms));
        if state.role.is_none() {
            state.role = self.persist(|s| s.get(ROLE_KEY)).flatten();
        }
        state.credential = Some(Credential::new(token));
        log::debug!("Credential rehydrated from durable storage");
        state.credential.clone()
    }

    /// Destroy the credential and every piece of session data that goes with it.
    pub fn clear_credential(&self) {
        let mut state = self.write_state();
        state.credential = None;
        state.issued_at = None;
        state.role = None;
        self.persist(|s| {
            s.remove(TOKEN_KEY)?;
            s.remove(ROLE_KEY)?;
            s.remove(LOGIN_TIME_KEY)?;
            for key in LEGACY_KEYS {
                s.remove(key)?;
            }
            Ok(())
        });
    }

    /// Record the signed-in user's role.
    pub fn set_role(&self, role: Option<&str>) {
        let mut state = self.write_state();
        state.role = role.map(str::to_string);
        match role {
            Some(role) => self.persist(|s| s.set(ROLE_KEY, role)),
            None => self.persist(|s| s.remove(ROLE_KEY)),
        };
    }

    /// Role of the signed-in user, if known.
    pub fn role(&self) -> Option<String> {
        if let Some(role) = self.read_state().role.clone() {
            return Some(role);
        }
        let role = self.persist(|s| s.get(ROLE_KEY)).flatten()?;
        self.write_state().role = Some(role.clone());
        Some(role)
    }

    /// Time elapsed since the current credential was issued.
    ///
    /// `None` when there is no credential or its issue time is unknown.
    pub fn credential_age(&self) -> Option<Duration> {
        let issued_at = self.read_state().issued_at?;
        Some(SystemTime::now().duration_since(issued_at).unwrap_or(Duration::ZERO))
    }

    /// Run a storage operation unless the store has degraded to memory-only.
    ///
    /// A failure is logged once and disables durable storage for the process.
    fn persist<T, F>(&self, op: F) -> Option<T>
    where
        F: FnOnce(&dyn KeyValueStore) -> Result<T, StorageError>,
    {
        if !self.is_durable() {
            return None;
        }
        match op(self.storage.as_ref()) {
            Ok(value) => Some(value),
            Err(e) => {
                if self.durable.swap(false, Ordering::SeqCst) {
                    log::warn!("Durable storage failed, continuing memory-only: {}", e);
                }
                None
            }
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn unix_millis(time: SystemTime) -> u128 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
