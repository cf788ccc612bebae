// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Distributed token bucket over a shared counter store.
//!
//! The counter holds the number of available tokens. Every change is a
//! read followed by a compare-and-swap; a lost race restarts the whole
//! cycle, so two acquirers can never spend the same token.

use crate::config::{EngineConfig, FailurePolicy};
use serde::{Deserialize, Serialize};
use sluice_adapters::{CounterStore, CounterStoreError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("timed out after {}ms waiting for a resource token", .0.as_millis())]
    Timeout(Duration),

    #[error("counter store unavailable: {0}")]
    Unavailable(String),

    #[error("cancelled while waiting for a resource token")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] CounterStoreError),
}

/// Proof of one acquired token. Hand it back to [`ResourceTokenManager::release`].
#[must_use = "a grant that is never released leaks a token"]
#[derive(Debug, PartialEq, Eq)]
pub struct TokenGrant {
    counted: bool,
}

impl TokenGrant {
    /// False for fail-open grants, which were never taken from the bucket.
    pub fn is_counted(&self) -> bool {
        self.counted
    }
}

/// Best-effort view of the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenStatus {
    pub available: u32,
    pub max: u32,
    /// Counted grants held by this process, including releases the store
    /// has not accepted yet.
    pub held: u32,
}

enum Attempt {
    Acquired,
    Conflict,
    /// Counter was missing and has been recreated.
    Recreated,
    Empty,
}

pub struct ResourceTokenManager {
    store: Arc<dyn CounterStore>,
    bucket: String,
    max_tokens: u32,
    retry_interval: Duration,
    failure: FailurePolicy,
    held: AtomicU64,
    /// Released grants whose increment the store has not taken yet.
    owed: AtomicU64,
}

impl ResourceTokenManager {
    pub fn new(store: Arc<dyn CounterStore>, config: &EngineConfig) -> Self {
        Self {
            store,
            bucket: config.bucket.clone(),
            max_tokens: config.max_tokens,
            retry_interval: config.acquire_retry_interval,
            failure: config.counter_failure,
            held: AtomicU64::new(0),
            owed: AtomicU64::new(0),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Create the counter at `max_tokens` if nobody has yet. Idempotent.
    pub async fn initialize(&self) -> Result<(), TokenError> {
        let created = self.store.init_if_absent(&self.bucket, i64::from(self.max_tokens)).await?;
        if created {
            tracing::info!(bucket = %self.bucket, max_tokens = self.max_tokens, "token bucket created");
        }
        Ok(())
    }

    /// Take one token, waiting up to `timeout` for one to free up.
    pub async fn acquire(&self, timeout: Duration) -> Result<TokenGrant, TokenError> {
        self.acquire_inner(timeout, None).await
    }

    /// Like [`acquire`](Self::acquire), but gives up with
    /// [`TokenError::Cancelled`] once `cancel` fires. Cancellation is only
    /// observed between attempts, never in the middle of a store write.
    pub async fn acquire_or_cancel(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<TokenGrant, TokenError> {
        self.acquire_inner(timeout, Some(cancel)).await
    }

    async fn acquire_inner(
        &self,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<TokenGrant, TokenError> {
        let deadline = Instant::now() + timeout;
        loop {
            self.repay_owed().await;
            match self.try_acquire().await {
                Ok(Attempt::Acquired) => {
                    self.held.fetch_add(1, Ordering::SeqCst);
                    return Ok(TokenGrant { counted: true });
                }
                Ok(Attempt::Recreated) => continue,
                Ok(Attempt::Conflict) => {
                    if Instant::now() >= deadline {
                        return Err(TokenError::Timeout(timeout));
                    }
                    tokio::task::yield_now().await;
                    continue;
                }
                Ok(Attempt::Empty) => {}
                Err(e) => return self.on_store_error(e),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(TokenError::Timeout(timeout));
            }
            let pause = tokio::time::sleep(self.retry_interval.min(deadline - now));
            match cancel {
                Some(cancel) => tokio::select! {
                    _ = pause => {}
                    _ = cancel.cancelled() => return Err(TokenError::Cancelled),
                },
                None => pause.await,
            }
        }
    }

    async fn try_acquire(&self) -> Result<Attempt, CounterStoreError> {
        let Some(available) = self.store.get(&self.bucket).await? else {
            // Counter vanished or was never created; recreate and go again.
            self.store.init_if_absent(&self.bucket, i64::from(self.max_tokens)).await?;
            return Ok(Attempt::Recreated);
        };
        if available <= 0 {
            return Ok(Attempt::Empty);
        }
        if self.store.compare_and_swap(&self.bucket, available, available - 1).await? {
            Ok(Attempt::Acquired)
        } else {
            Ok(Attempt::Conflict)
        }
    }

    fn on_store_error(&self, e: CounterStoreError) -> Result<TokenGrant, TokenError> {
        match self.failure {
            FailurePolicy::FailClosed => {
                tracing::warn!(bucket = %self.bucket, error = %e, "counter store unavailable, failing closed");
                Err(TokenError::Unavailable(e.to_string()))
            }
            FailurePolicy::FailOpen => {
                tracing::warn!(bucket = %self.bucket, error = %e, "counter store unavailable, granting uncounted token");
                Ok(TokenGrant { counted: false })
            }
        }
    }

    /// Return a token. Never fails: if the store is unreachable the token
    /// stays owed and is paid back on a later store round trip.
    pub async fn release(&self, grant: TokenGrant) {
        if !grant.counted {
            return;
        }
        self.repay_owed().await;
        match self.return_one().await {
            Ok(()) => {
                self.held.fetch_sub(1, Ordering::SeqCst);
            }
            Err(e) => {
                tracing::error!(bucket = %self.bucket, error = %e, "failed to release resource token, deferring");
                self.owed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    /// Pay back deferred releases until the store refuses again.
    async fn repay_owed(&self) {
        // Claim one debt at a time so concurrent repayers never double-pay.
        while self.owed.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok() {
            if let Err(e) = self.return_one().await {
                self.owed.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(bucket = %self.bucket, error = %e, "deferred token release still pending");
                return;
            }
            self.held.fetch_sub(1, Ordering::SeqCst);
            tracing::info!(bucket = %self.bucket, "deferred token release applied");
        }
    }

    /// Put one token back in the store, clamped at `max_tokens`.
    async fn return_one(&self) -> Result<(), CounterStoreError> {
        let max = i64::from(self.max_tokens);
        loop {
            let Some(current) = self.store.get(&self.bucket).await? else {
                tracing::warn!(bucket = %self.bucket, "token bucket missing on release, recreating");
                self.store.init_if_absent(&self.bucket, max).await?;
                return Ok(());
            };
            if current >= max {
                tracing::warn!(bucket = %self.bucket, available = current, "release clamped at max_tokens");
                return Ok(());
            }
            if self.store.compare_and_swap(&self.bucket, current, current + 1).await? {
                return Ok(());
            }
            tokio::task::yield_now().await;
        }
    }

    pub async fn status(&self) -> Result<TokenStatus, TokenError> {
        self.repay_owed().await;
        let available = self.store.get(&self.bucket).await?.unwrap_or(i64::from(self.max_tokens));
        Ok(TokenStatus {
            available: u32::try_from(available.max(0)).unwrap_or(u32::MAX),
            max: self.max_tokens,
            held: u32::try_from(self.held.load(Ordering::SeqCst)).unwrap_or(u32::MAX),
        })
    }
}

#[cfg(test)]
#[path = "tokens_tests.rs"]
mod tests;
