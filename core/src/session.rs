//! Outward collaborator contracts: the session store and the query cache.
//!
//! Both are invoked by `ApiClient` on a 401. Idempotence of `end_session`
//! and `invalidate_all` is the implementor's responsibility.

use std::sync::RwLock;

/// Holds the current bearer token and can end the session.
pub trait SessionStore: Send + Sync {
    fn token(&self) -> Option<String>;
    fn end_session(&self);
}

/// Cached query state owned outside the request layer.
pub trait QueryCache: Send + Sync {
    fn invalidate_all(&self);

    /// Invalidate one query key. Caches without keyed entries may ignore this.
    fn invalidate(&self, _key: &str) {}
}

/// In-process `SessionStore` holding an optional token.
#[derive(Debug, Default)]
pub struct MemorySession {
    token: RwLock<Option<String>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    pub fn set_token(&self, token: impl Into<String>) {
        let mut guard = self.token.write().unwrap_or_else(|p| p.into_inner());
        *guard = Some(token.into());
    }
}

impl SessionStore for MemorySession {
    fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn end_session(&self) {
        let mut guard = self.token.write().unwrap_or_else(|p| p.into_inner());
        *guard = None;
    }
}

/// `QueryCache` for callers that keep no cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl QueryCache for NoopCache {
    fn invalidate_all(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_session_lifecycle() {
        let session = MemorySession::new();
        assert_eq!(session.token(), None);

        session.set_token("abc");
        assert_eq!(session.token().as_deref(), Some("abc"));

        session.end_session();
        assert_eq!(session.token(), None);

        // ending twice is harmless
        session.end_session();
        assert_eq!(session.token(), None);
    }

    #[test]
    fn with_token_seeds_session() {
        let session = MemorySession::with_token("seed");
        assert_eq!(session.token().as_deref(), Some("seed"));
    }
}
