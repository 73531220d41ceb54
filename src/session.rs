use std::collections::HashMap;
use std::sync::Mutex;

/// Scratch state for the deadline-creation interaction, keyed per admin per
/// chat. Absence from the map is the idle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub chat_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    AwaitingFile { title: String },
}

#[derive(Default)]
pub struct SessionMap {
    inner: Mutex<HashMap<SessionKey, SessionState>>,
}

impl SessionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, key: SessionKey, title: &str) {
        let mut guard = self.inner.lock().unwrap();
        guard.insert(
            key,
            SessionState::AwaitingFile {
                title: title.to_string(),
            },
        );
    }

    pub fn pending_title(&self, key: SessionKey) -> Option<String> {
        let guard = self.inner.lock().unwrap();
        guard.get(&key).map(|state| match state {
            SessionState::AwaitingFile { title } => title.clone(),
        })
    }

    /// Returns whether a session was actually active.
    pub fn clear(&self, key: SessionKey) -> bool {
        let mut guard = self.inner.lock().unwrap();
        guard.remove(&key).is_some()
    }
}
