//! Client Session
//!
//! Owns the bearer token in persistent storage and the forced-logout
//! capability (token removal followed by a hard redirect to the login route).

mod navigator;
mod storage;

pub use navigator::{LogNavigator, Navigator, RecordingNavigator};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError, TOKEN_KEY};

use std::sync::Arc;

/// Route the user is sent to when the session is rejected
pub const LOGIN_ROUTE: &str = "/login";

/// Authentication state shared by every request
pub struct Session {
    storage: Arc<dyn KeyValueStore>,
    navigator: Arc<dyn Navigator>,
}

impl Session {
    pub fn new(storage: Arc<dyn KeyValueStore>, navigator: Arc<dyn Navigator>) -> Self {
        Self { storage, navigator }
    }

    /// In-memory session with a logging navigator
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(LogNavigator::new()))
    }

    /// Current bearer token, if any
    pub fn token(&self) -> Option<String> {
        self.storage.get(TOKEN_KEY).filter(|t| !t.is_empty())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Store a new bearer token
    pub fn login(&self, token: &str) -> Result<(), StorageError> {
        self.storage.set(TOKEN_KEY, token)
    }

    /// Remove the bearer token
    pub fn logout(&self) -> Result<(), StorageError> {
        self.storage.remove(TOKEN_KEY)
    }

    /// Drop the token, then hard-redirect to the login route
    ///
    /// A storage failure is logged and does not prevent the redirect.
    pub fn force_logout(&self) {
        if let Err(e) = self.logout() {
            tracing::error!("Failed to clear stored token: {}", e);
        }
        self.navigator.replace_location(LOGIN_ROUTE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_logout() {
        let session = Session::in_memory();
        assert!(!session.is_authenticated());

        session.login("secret").unwrap();
        assert_eq!(session.token().as_deref(), Some("secret"));

        session.logout().unwrap();
        assert!(session.token().is_none());
    }

    #[test]
    fn test_empty_token_is_unauthenticated() {
        let session = Session::new(
            Arc::new(MemoryStore::with_entry(TOKEN_KEY, "")),
            Arc::new(RecordingNavigator::new()),
        );
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_force_logout_clears_then_redirects() {
        let storage = Arc::new(MemoryStore::with_entry(TOKEN_KEY, "stale"));
        let navigator = Arc::new(RecordingNavigator::new());
        let session = Session::new(storage.clone(), navigator.clone());

        session.force_logout();

        assert_eq!(storage.get(TOKEN_KEY), None);
        assert_eq!(navigator.visits(), vec![LOGIN_ROUTE]);
    }
}
