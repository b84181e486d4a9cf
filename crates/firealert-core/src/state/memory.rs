// # Memory Token Store
//
// In-memory implementation of TokenStore.
//
// The token is lost on restart. Useful for tests and for embedding the
// bridge where the host application owns persistence.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::token_store::{Token, TokenStore};

/// In-memory token store implementation
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    inner: Arc<RwLock<Option<Token>>>,
}

impl MemoryTokenStore {
    /// Create a new empty memory token store
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove the stored token
    pub async fn clear(&self) {
        *self.inner.write().await = None;
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn update(&self, token: Token) -> Result<(), Error> {
        if token.payload().trim().is_empty() {
            return Err(Error::invalid_argument("Token payload cannot be empty"));
        }
        *self.inner.write().await = Some(token);
        Ok(())
    }

    async fn get(&self) -> Result<Option<Token>, Error> {
        Ok(self.inner.read().await.clone())
    }
}
