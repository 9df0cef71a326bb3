//! One-time async initialization with a shared in-flight attempt.
//!
//! Callers that arrive while an attempt is running await that attempt and
//! all receive its result, success or failure. A failed attempt is dropped
//! once it completes, so the next caller starts a fresh one. A successful
//! result is kept for the lifetime of the cell.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

use super::error::StorageResult;

type Attempt<T> = Shared<BoxFuture<'static, StorageResult<Arc<T>>>>;

pub(crate) struct SharedAttempt<T> {
    ready: OnceLock<Arc<T>>,
    pending: Mutex<Option<Attempt<T>>>,
}

impl<T> Default for SharedAttempt<T> {
    fn default() -> Self {
        Self {
            ready: OnceLock::new(),
            pending: Mutex::new(None),
        }
    }
}

impl<T: Send + Sync + 'static> SharedAttempt<T> {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub(crate) fn get(&self) -> Option<Arc<T>> {
        self.ready.get().map(Arc::clone)
    }

    #[must_use]
    pub(crate) fn is_ready(&self) -> bool {
        self.ready.get().is_some()
    }

    /// Returns the stored value, joining the running attempt or starting one
    /// with `start` if none is running.
    pub(crate) async fn get_or_try_init<F>(&self, start: F) -> StorageResult<Arc<T>>
    where
        F: FnOnce() -> BoxFuture<'static, StorageResult<Arc<T>>>,
    {
        if let Some(value) = self.get() {
            return Ok(value);
        }
        let attempt = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(value) = self.get() {
                return Ok(value);
            }
            pending.get_or_insert_with(|| start().shared()).clone()
        };

        let result = attempt.clone().await;

        if let Ok(value) = &result {
            let _ = self.ready.set(Arc::clone(value));
        }
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.as_ref().is_some_and(|current| current.ptr_eq(&attempt)) {
            *pending = None;
        }
        drop(pending);
        result
    }
}
