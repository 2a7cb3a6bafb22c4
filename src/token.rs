use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// Credential store the client reads tokens from and the refresh protocol
/// writes into.
///
/// The client only ever reads the current tokens on the request path; all
/// mutation happens from login, logout, and the refresh cycle. Implementations
/// backed by persistent storage should make each method atomic on its own —
/// the client never assumes cross-call consistency beyond that.
pub trait TokenStore: Send + Sync {
    /// Short-lived credential sent as `Authorization: Bearer <...>`.
    fn access_token(&self) -> Option<String>;

    /// Longer-lived credential used only to mint a new access token.
    fn refresh_token(&self) -> Option<String>;

    /// Store a freshly minted pair (login).
    fn set_tokens(&self, access: String, refresh: String);

    /// Overwrite the access token after a successful refresh. The refresh
    /// token stays in place; the backend does not rotate it.
    fn set_access_token(&self, access: String);

    /// Drop both tokens (logout, or unrecoverable refresh failure).
    fn clear(&self);
}

#[derive(Debug, Default)]
struct Tokens {
    access: Option<String>,
    refresh: Option<String>,
}

/// Process-local token store.
///
/// Suits tests and applications that keep the session in memory; anything
/// needing persistence implements [`TokenStore`] over its own storage.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<Tokens>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a token pair, as after a completed login.
    pub fn with_tokens(access: &str, refresh: &str) -> Self {
        Self {
            tokens: RwLock::new(Tokens {
                access: Some(access.to_string()),
                refresh: Some(refresh.to_string()),
            }),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn access_token(&self) -> Option<String> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .access
            .clone()
    }

    fn refresh_token(&self) -> Option<String> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .refresh
            .clone()
    }

    fn set_tokens(&self, access: String, refresh: String) {
        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        tokens.access = Some(access);
        tokens.refresh = Some(refresh);
    }

    fn set_access_token(&self, access: String) {
        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        tokens.access = Some(access);
    }

    fn clear(&self) {
        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        tokens.access = None;
        tokens.refresh = None;
    }
}

/// Body of `POST /auth/token/refresh/`.
#[derive(Debug, Serialize)]
pub(crate) struct RefreshRequest {
    pub refresh: String,
}

/// Successful refresh response. Only a new access token is issued; the
/// refresh token remains valid and reusable.
#[derive(Debug, Deserialize)]
pub(crate) struct RefreshResponse {
    pub access: Option<String>,
}
