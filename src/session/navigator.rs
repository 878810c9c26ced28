//! Navigation capability
//!
//! Hard location replacement, used to send the user to the login route when
//! the backend rejects the session.

use std::sync::{Mutex, PoisonError};

/// Replaces the current application location
pub trait Navigator: Send + Sync {
    fn replace_location(&self, path: &str);
}

/// Logs the redirect and remembers the last location
#[derive(Debug, Default)]
pub struct LogNavigator {
    current: Mutex<Option<String>>,
}

impl LogNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_location(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for LogNavigator {
    fn replace_location(&self, path: &str) {
        tracing::warn!(location = %path, "Replacing location");
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(path.to_string());
    }
}

/// Keeps every requested location in order
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for RecordingNavigator {
    fn replace_location(&self, path: &str) {
        self.visits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_navigator_tracks_last_location() {
        let nav = LogNavigator::new();
        assert_eq!(nav.current_location(), None);
        nav.replace_location("/reports");
        nav.replace_location("/login");
        assert_eq!(nav.current_location().as_deref(), Some("/login"));
    }

    #[test]
    fn test_recording_navigator_keeps_order() {
        let nav = RecordingNavigator::new();
        nav.replace_location("/a");
        nav.replace_location("/b");
        assert_eq!(nav.visits(), vec!["/a", "/b"]);
    }
}
