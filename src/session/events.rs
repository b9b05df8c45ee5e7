//! Session lifecycle events published by the API client.
//!
//! The client never navigates on its own. It announces that a session was
//! invalidated and, when the user is on an admin view, asks the application
//! to go to the login view after a short delay.

use std::time::Duration;

use tokio::sync::broadcast;

/// Buffered events per subscriber before the oldest are dropped.
pub const EVENT_CAPACITY: usize = 16;

/// Why the stored credential was cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearReason {
    /// A protected endpoint answered 401.
    Unauthorized { path: String },
    /// A public endpoint answered 401, so the stored token must be stale.
    StaleOnPublic { path: String },
    /// The user signed out.
    Logout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Credential and session data were removed.
    CredentialCleared(ClearReason),
    /// The application should navigate to this login view.
    LoginRedirect { target: String },
}

/// Fan-out of session events to any number of subscribers.
#[derive(Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            log::debug!("Session event dropped: no subscribers");
        }
    }

    /// Publish a login redirect once `delay` has elapsed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule_redirect(&self, target: String, delay: Duration) {
        let events = self.clone();
        log::warn!("Session invalidated, redirecting to {} in {:?}", target, delay);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            events.emit(SessionEvent::LoginRedirect { target });
        });
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}
