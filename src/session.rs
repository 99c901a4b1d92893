//! Session store: the one bearer token the client holds.
//!
//! There is no expiry logic on the client. A token is dropped on logout or
//! when the service answers 401.

use tracing::debug;

use crate::storage::KeyValueStore;

/// Storage slot holding the bearer token.
pub const TOKEN_KEY: &str = "token";

#[derive(Clone)]
pub struct SessionStore<S> {
    store: S,
}

impl<S: KeyValueStore> SessionStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The current token. An empty stored value counts as no token.
    pub async fn token(&self) -> anyhow::Result<Option<String>> {
        let token = self.store.get(TOKEN_KEY).await?;
        Ok(token.filter(|t| !t.is_empty()))
    }

    /// Replace the held token.
    pub async fn set_token(&self, token: &str) -> anyhow::Result<()> {
        self.store.put(TOKEN_KEY, token).await?;
        debug!("Session token stored");
        Ok(())
    }

    pub async fn clear(&self) -> anyhow::Result<()> {
        self.store.remove(TOKEN_KEY).await?;
        debug!("Session token cleared");
        Ok(())
    }

    /// Route guard: true when a token is held. Unreadable storage counts as
    /// signed out.
    pub async fn is_authenticated(&self) -> bool {
        matches!(self.token().await, Ok(Some(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_token_lifecycle() {
        let session = SessionStore::new(MemoryStore::new());
        assert!(!session.is_authenticated().await);

        session.set_token("first").await.unwrap();
        session.set_token("second").await.unwrap();
        assert_eq!(session.token().await.unwrap().as_deref(), Some("second"));
        assert!(session.is_authenticated().await);

        session.clear().await.unwrap();
        assert!(session.token().await.unwrap().is_none());
        assert!(!session.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_empty_token_is_absent() {
        let store = MemoryStore::new();
        store.put(TOKEN_KEY, "").await.unwrap();

        let session = SessionStore::new(store);
        assert!(session.token().await.unwrap().is_none());
    }
}
