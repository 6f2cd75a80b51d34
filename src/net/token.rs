//! Session token persistence
//!
//! The backend issues an opaque token on connect; keeping it across sessions
//! lets a reconnect resume the same identity. The token is stored under a
//! fixed key name by the hosting environment's key-value persistence (here a
//! file next to the executable) and cleared explicitly when the user opts to
//! connect as a new identity.

use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Key name the token is persisted under
pub const AUTH_TOKEN_KEY: &str = "auth_token";

/// Opaque session-resumption token issued by the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken([u8; 32]);

impl SessionToken {
    /// Generate a fresh random token (used by the simulation backend; a real
    /// backend mints its own)
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Text form for key-value persistence
    pub fn to_base64(&self) -> String {
        let encoded = bincode::serde::encode_to_vec(self, bincode::config::standard())
            .unwrap_or_else(|_| self.0.to_vec());
        base64::engine::general_purpose::STANDARD.encode(encoded)
    }

    /// Parse the persisted text form; None on any corruption
    pub fn from_base64(text: &str) -> Option<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(text.trim())
            .ok()?;
        bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
            .map(|(token, _)| token)
            .ok()
    }
}

/// Key-value persistence for the session token
pub trait TokenStore {
    fn load(&self) -> Option<SessionToken>;
    fn save(&mut self, token: &SessionToken);
    /// Forget the persisted identity ("connect as new player")
    fn clear(&mut self);
}

/// File-backed store: one file named [`AUTH_TOKEN_KEY`] in the given directory
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(AUTH_TOKEN_KEY),
        }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<SessionToken> {
        let text = std::fs::read_to_string(&self.path).ok()?;
        let token = SessionToken::from_base64(&text);
        if token.is_none() {
            warn!("persisted token at {:?} is corrupt, ignoring", self.path);
        }
        token
    }

    fn save(&mut self, token: &SessionToken) {
        if let Err(e) = std::fs::write(&self.path, token.to_base64()) {
            warn!("failed to persist session token: {}", e);
        }
    }

    fn clear(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!("failed to clear session token: {}", e);
            }
        }
    }
}

/// In-memory store for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Option<SessionToken>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<SessionToken> {
        self.token.clone()
    }

    fn save(&mut self, token: &SessionToken) {
        self.token = Some(token.clone());
    }

    fn clear(&mut self) {
        self.token = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique() {
        assert_ne!(SessionToken::generate(), SessionToken::generate());
    }

    #[test]
    fn test_base64_roundtrip() {
        let token = SessionToken::generate();
        let restored = SessionToken::from_base64(&token.to_base64());
        assert_eq!(Some(token), restored);
    }

    #[test]
    fn test_base64_rejects_garbage() {
        assert!(SessionToken::from_base64("not base64 !!!").is_none());
        assert!(SessionToken::from_base64("aGVsbG8=").is_none());
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryTokenStore::new();
        assert!(store.load().is_none());

        let token = SessionToken::generate();
        store.save(&token);
        assert_eq!(store.load(), Some(token));

        store.clear();
        assert!(store.load().is_none());
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = std::env::temp_dir().join(format!("moonbits-token-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let mut store = FileTokenStore::new(&dir);
        store.clear();
        assert!(store.load().is_none());

        let token = SessionToken::generate();
        store.save(&token);
        assert_eq!(store.load(), Some(token));

        store.clear();
        assert!(store.load().is_none());
        std::fs::remove_dir_all(&dir).ok();
    }
}
