//! In-memory token storage.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::OAuth2Error;
use crate::storage::TokenStorage;
use crate::token::Token;

/// Holds the token for as long as the storage value lives.
#[derive(Default)]
pub struct MemoryTokenStorage {
    slot: Mutex<Option<Token>>,
}

impl MemoryTokenStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage holding `token`.
    pub fn with_token(token: Token) -> Self {
        Self {
            slot: Mutex::new(Some(token)),
        }
    }

    /// Current token without going through the async interface.
    pub fn peek(&self) -> Option<Token> {
        self.slot.lock().clone()
    }
}

impl std::fmt::Debug for MemoryTokenStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTokenStorage")
            .field("token", &*self.slot.lock())
            .finish()
    }
}

#[async_trait]
impl TokenStorage for MemoryTokenStorage {
    async fn get(&self) -> Result<Option<Token>, OAuth2Error> {
        Ok(self.slot.lock().clone())
    }

    async fn save(&self, token: &Token) -> Result<(), OAuth2Error> {
        *self.slot.lock() = Some(token.clone());
        Ok(())
    }

    async fn delete(&self) -> Result<(), OAuth2Error> {
        self.slot.lock().take();
        Ok(())
    }
}
