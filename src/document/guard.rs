//! Bounded-time document access.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};

use super::layout::TextSpan;
use super::{Ruling, SourceDocument};
use crate::error::{Error, Result};
use crate::model::DocumentKey;

/// Wraps a document so that no page call blocks longer than a limit.
///
/// Each call runs on a helper thread; the caller waits on a channel with a
/// deadline. A call that overruns keeps its helper thread until it finishes
/// on its own, but the caller is released with [`Error::Timeout`].
#[derive(Clone)]
pub struct TimeoutDocument {
    inner: Arc<dyn SourceDocument>,
    limit: Duration,
}

impl TimeoutDocument {
    /// Wrap a document with a per-call time limit.
    pub fn new(inner: Arc<dyn SourceDocument>, limit: Duration) -> Self {
        Self { inner, limit }
    }

    /// The configured limit.
    pub fn limit(&self) -> Duration {
        self.limit
    }

    fn call<T, F>(&self, what: &'static str, page: u32, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn SourceDocument) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let task = format!("{} {} page {}", self.inner.id(), what, page);
        run_with_limit(&task, self.limit, move || f(inner.as_ref()))
    }
}

/// Run `f` on a helper thread and wait at most `limit` for its result.
///
/// An overrunning helper is left to finish on its own; its result is
/// discarded.
pub fn run_with_limit<T, F>(task: &str, limit: Duration, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = bounded(1);

    thread::Builder::new()
        .name(format!("guard: {}", task))
        .spawn(move || {
            // The receiver may be gone after a timeout
            let _ = tx.send(f());
        })?;

    match rx.recv_timeout(limit) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            log::warn!("{} exceeded {} ms", task, limit.as_millis());
            Err(Error::Timeout(limit.as_millis() as u64))
        }
        Err(RecvTimeoutError::Disconnected) => {
            Err(Error::Other(format!("{} ended without a result", task)))
        }
    }
}

impl SourceDocument for TimeoutDocument {
    fn key(&self) -> &DocumentKey {
        self.inner.key()
    }

    fn page_count(&self) -> u32 {
        self.inner.page_count()
    }

    fn page_spans(&self, page: u32) -> Result<Vec<TextSpan>> {
        self.call("page_spans", page, move |doc| doc.page_spans(page))
    }

    fn page_text(&self, page: u32) -> Result<String> {
        self.call("page_text", page, move |doc| doc.page_text(page))
    }

    fn page_rulings(&self, page: u32) -> Result<Vec<Ruling>> {
        self.call("page_rulings", page, move |doc| doc.page_rulings(page))
    }
}
