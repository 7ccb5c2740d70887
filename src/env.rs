use std::collections::HashMap;

/// Source of the ambient defaults (`USER`, `SSH_AUTH_SOCK`) used while
/// resolving [`TransportOptions`](crate::TransportOptions).
pub trait Environment {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the real process environment
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}
