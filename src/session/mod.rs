//! Per-upload document sessions.
//!
//! A session holds one document's text together with its chunks and the
//! embedding of every chunk. Chunks and embeddings are index aligned; the
//! constructor refuses anything else.

use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::error::{AppError, AppResult};

#[derive(Debug)]
pub struct Session {
    filename: String,
    text: String,
    chunks: Vec<String>,
    embeddings: Vec<Vec<f32>>,
}

impl Session {
    pub fn new(
        filename: impl Into<String>,
        text: impl Into<String>,
        chunks: Vec<String>,
        embeddings: Vec<Vec<f32>>,
    ) -> AppResult<Self> {
        if chunks.len() != embeddings.len() {
            return Err(AppError::Upstream(format!(
                "Embedding count {} does not match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }
        Ok(Self {
            filename: filename.into(),
            text: text.into(),
            chunks,
            embeddings,
        })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    pub fn embeddings(&self) -> &[Vec<f32>] {
        &self.embeddings
    }
}

/// Derives the session key for an upload. The whole text is hashed so two
/// documents that only share a prefix never collide.
pub fn session_key(filename: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(filename.as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

pub trait SessionStore: Send + Sync {
    /// Stores a session, replacing any previous one under the same key.
    fn insert(&self, key: String, session: Session);

    fn get(&self, key: &str) -> Option<Arc<Session>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Like [`SessionStore::get`] but an absent key is an error.
    fn require(&self, key: &str) -> AppResult<Arc<Session>> {
        self.get(key).ok_or_else(|| {
            AppError::not_found("Document session not found. Please upload the document again.")
        })
    }
}

/// In-process store. Holds at most `capacity` sessions and evicts the least
/// recently used one when full.
pub struct InMemorySessionStore {
    sessions: Mutex<LruCache<String, Arc<Session>>>,
}

impl InMemorySessionStore {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            sessions: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN))
    }
}

impl SessionStore for InMemorySessionStore {
    fn insert(&self, key: String, session: Session) {
        let mut sessions = self.sessions.lock();
        if let Some((evicted, _)) = sessions.push(key.clone(), Arc::new(session)) {
            if evicted != key {
                tracing::info!("Session cache full, evicted session {}", evicted);
            }
        }
    }

    fn get(&self, key: &str) -> Option<Arc<Session>> {
        self.sessions.lock().get(key).cloned()
    }

    fn len(&self) -> usize {
        self.sessions.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(name: &str) -> Session {
        Session::new(name, "text", vec!["text".to_string()], vec![vec![1.0, 0.0]]).unwrap()
    }

    #[test]
    fn test_session_requires_aligned_lists() {
        let err = Session::new("a.pdf", "t", vec!["a".into(), "b".into()], vec![vec![1.0]]);
        assert!(err.is_err());
    }

    #[test]
    fn test_session_key_is_stable_and_covers_whole_text() {
        let prefix = "x".repeat(100);
        let a = session_key("paper.pdf", &format!("{}first", prefix));
        let b = session_key("paper.pdf", &format!("{}second", prefix));
        assert_ne!(a, b);
        assert_eq!(a, session_key("paper.pdf", &format!("{}first", prefix)));
        assert_eq!(a.len(), 64);
        assert_ne!(session_key("ab", "c"), session_key("a", "bc"));
    }

    #[test]
    fn test_unknown_key_is_not_found() {
        let store = InMemorySessionStore::with_capacity(4);
        assert!(matches!(store.require("missing"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_insert_and_get() {
        let store = InMemorySessionStore::with_capacity(4);
        store.insert("k".to_string(), session("a.pdf"));
        let found = store.require("k").unwrap();
        assert_eq!(found.filename(), "a.pdf");
        assert_eq!(found.chunks().len(), found.embeddings().len());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_reinsert_replaces() {
        let store = InMemorySessionStore::with_capacity(4);
        store.insert("k".to_string(), session("a.pdf"));
        store.insert("k".to_string(), session("b.pdf"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("k").unwrap().filename(), "b.pdf");
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let store = InMemorySessionStore::with_capacity(2);
        store.insert("a".to_string(), session("a.pdf"));
        store.insert("b".to_string(), session("b.pdf"));
        assert!(store.get("a").is_some());
        store.insert("c".to_string(), session("c.pdf"));

        assert!(store.get("b").is_none());
        assert!(store.get("a").is_some());
        assert!(store.get("c").is_some());
    }
}
