//! Debounced backend uniqueness checks with stale-response protection.
//!
//! Each dispatched check captures a monotonically increasing epoch for its
//! field. A response is applied only while its epoch is still the latest
//! dispatched one, so a slow early keystroke can never overwrite a later
//! keystroke's validation state.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::errors::AppError;

#[derive(Debug, Default)]
struct Inner {
    epochs: HashMap<String, u64>,
    results: HashMap<String, bool>,
}

/// Epoch-gated result store for per-field uniqueness checks.
#[derive(Debug, Clone, Default)]
pub struct UniquenessChecker {
    inner: Arc<Mutex<Inner>>,
}

impl UniquenessChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new dispatch for `field` and return its epoch token.
    pub fn dispatch(&self, field: &str) -> u64 {
        let mut inner = self.inner.lock().unwrap();
        let epoch = inner.epochs.entry(field.to_string()).or_insert(0);
        *epoch += 1;
        *epoch
    }

    /// Whether `epoch` is still the latest dispatched epoch for `field`.
    pub fn is_current(&self, field: &str, epoch: u64) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.epochs.get(field).copied() == Some(epoch)
    }

    /// Apply a check result; dropped silently when stale. Returns whether
    /// it was applied.
    pub fn apply(&self, field: &str, epoch: u64, exists: bool) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.epochs.get(field).copied() != Some(epoch) {
            tracing::debug!(field, epoch, "dropping stale uniqueness response");
            return false;
        }
        inner.results.insert(field.to_string(), exists);
        true
    }

    /// Last applied result for `field`, if any.
    pub fn result(&self, field: &str) -> Option<bool> {
        let inner = self.inner.lock().unwrap();
        inner.results.get(field).copied()
    }

    /// Debounce, probe the backend, and apply the result if still current.
    ///
    /// Returns `Ok(None)` when the check was superseded by a newer dispatch
    /// (either during the debounce window or while the probe was in flight).
    pub async fn check<F, Fut>(
        &self,
        field: &str,
        delay: Duration,
        probe: F,
    ) -> Result<Option<bool>, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<bool, AppError>>,
    {
        let epoch = self.dispatch(field);
        tokio::time::sleep(delay).await;
        if !self.is_current(field, epoch) {
            return Ok(None);
        }
        let exists = probe().await?;
        if self.apply(field, epoch, exists) {
            Ok(Some(exists))
        } else {
            Ok(None)
        }
    }
}
