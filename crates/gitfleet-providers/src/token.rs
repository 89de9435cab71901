//! API token pooling with rate-limit accounting and round-robin rotation.
//!
//! One mutex guards both the token list and the rotation cursor, so a
//! selection and its cursor advance are atomic and the last token in a
//! rotation is never starved.

use crate::models::ProviderKind;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of one pooled token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    /// Has quota, or its rate-limit window has passed.
    Active,
    /// Out of quota until `reset_time`.
    RateLimited,
    /// Rejected by the provider. Terminal.
    Invalid,
}

/// One pooled token with its rate-limit accounting.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenInfo {
    /// The secret itself.
    pub token: String,
    /// Which provider the token belongs to.
    pub provider: ProviderKind,
    /// Current lifecycle state.
    pub status: TokenStatus,
    /// Requests left in the current window.
    pub remaining: u32,
    /// Epoch seconds at which the window resets.
    pub reset_time: i64,
}

impl TokenInfo {
    fn new(token: String, provider: ProviderKind) -> Self {
        Self {
            token,
            provider,
            status: TokenStatus::Active,
            remaining: u32::MAX,
            reset_time: 0,
        }
    }

    /// Whether the token can be handed out right now.
    #[must_use]
    pub fn is_usable(&self, now: i64) -> bool {
        self.status != TokenStatus::Invalid && (self.remaining > 0 || now >= self.reset_time)
    }
}

impl fmt::Debug for TokenInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenInfo")
            .field("token", &"<redacted>")
            .field("provider", &self.provider)
            .field("status", &self.status)
            .field("remaining", &self.remaining)
            .field("reset_time", &self.reset_time)
            .finish()
    }
}

#[derive(Debug, Default)]
struct TokenPool {
    tokens: Vec<TokenInfo>,
    cursor: usize,
}

/// Thread-safe pool of provider API tokens.
#[derive(Debug, Default)]
pub struct TokenManager {
    pool: Mutex<TokenPool>,
}

impl TokenManager {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a token as `Active`. Inserting the same token twice for the
    /// same provider leaves a single entry.
    pub fn add_token(&self, token: impl Into<String>, provider: ProviderKind) {
        let token = token.into();
        let mut pool = self.pool.lock();
        if pool
            .tokens
            .iter()
            .any(|t| t.provider == provider && t.token == token)
        {
            return;
        }
        pool.tokens.push(TokenInfo::new(token, provider));
    }

    /// Select the next usable token for a provider.
    ///
    /// Round-robin over `Active` tokens. If every token is rate limited,
    /// returns the one with the earliest reset so the caller may wait for
    /// it. Returns `None` when no token is usable and no reset lies in the
    /// future. `Invalid` tokens are never returned.
    #[must_use]
    pub fn get_next_available_token(&self, provider: ProviderKind) -> Option<TokenInfo> {
        self.select(provider, Utc::now().timestamp())
    }

    fn select(&self, provider: ProviderKind, now: i64) -> Option<TokenInfo> {
        let mut pool = self.pool.lock();
        let len = pool.tokens.len();
        if len == 0 {
            return None;
        }

        let start = pool.cursor;
        for step in 0..len {
            let index = (start + step) % len;
            let candidate = &pool.tokens[index];
            if candidate.provider != provider || !candidate.is_usable(now) {
                continue;
            }
            // A passed reset window makes the token active again.
            pool.tokens[index].status = TokenStatus::Active;
            pool.cursor = (index + 1) % len;
            return Some(pool.tokens[index].clone());
        }

        // Everything is rate limited; offer the earliest reset still ahead.
        pool.tokens
            .iter()
            .filter(|t| {
                t.provider == provider
                    && t.status == TokenStatus::RateLimited
                    && t.reset_time > now
            })
            .min_by_key(|t| t.reset_time)
            .cloned()
    }

    /// Record rate-limit headers for a token.
    ///
    /// Authoritative: `remaining == 0` with a future reset marks the token
    /// `RateLimited`; anything else keeps or returns it to `Active`.
    /// Invalid tokens never revert.
    pub fn update_rate_limit(
        &self,
        token: &str,
        provider: ProviderKind,
        remaining: u32,
        reset_time: i64,
    ) {
        self.update_rate_limit_at(token, provider, remaining, reset_time, Utc::now().timestamp());
    }

    fn update_rate_limit_at(
        &self,
        token: &str,
        provider: ProviderKind,
        remaining: u32,
        reset_time: i64,
        now: i64,
    ) {
        let mut pool = self.pool.lock();
        let Some(entry) = pool
            .tokens
            .iter_mut()
            .find(|t| t.provider == provider && t.token == token)
        else {
            return;
        };
        entry.remaining = remaining;
        entry.reset_time = reset_time;
        if entry.status != TokenStatus::Invalid {
            entry.status = if remaining == 0 && reset_time > now {
                TokenStatus::RateLimited
            } else {
                TokenStatus::Active
            };
        }
    }

    /// Permanently retire a token the provider rejected.
    pub fn mark_token_invalid(&self, token: &str, provider: ProviderKind) {
        let mut pool = self.pool.lock();
        if let Some(entry) = pool
            .tokens
            .iter_mut()
            .find(|t| t.provider == provider && t.token == token)
        {
            entry.status = TokenStatus::Invalid;
        }
    }

    /// Snapshot of every pooled token.
    #[must_use]
    pub fn tokens(&self) -> Vec<TokenInfo> {
        self.pool.lock().tokens.clone()
    }

    /// Number of pooled tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pool.lock().tokens.len()
    }

    /// Whether the pool is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pool.lock().tokens.is_empty()
    }
}
