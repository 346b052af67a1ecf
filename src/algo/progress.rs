//! Progress reporting for subdivision updates.
//!
//! Updating a deep hierarchy after a large edit can take a while. Callers
//! that want feedback pass a [`Progress`] and receive one report per batch
//! of dirty vertices drained.
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use jot::algo::progress::Progress;
//!
//! let calls = Arc::new(AtomicUsize::new(0));
//! let seen = Arc::clone(&calls);
//! let progress = Progress::new(move |level, done, total| {
//!     assert!(done <= total);
//!     let _ = level;
//!     seen.fetch_add(1, Ordering::Relaxed);
//! });
//! progress.report(1, 10, 10);
//! assert_eq!(calls.load(Ordering::Relaxed), 1);
//! ```

/// A progress callback.
///
/// The callback receives:
/// - `level`: the level being written
/// - `done`: dirty vertices processed so far on the parent level
/// - `total`: dirty vertices that were pending when the level started
pub struct Progress {
    callback: Box<dyn Fn(usize, usize, usize) + Send + Sync>,
}

impl Progress {
    /// Create a new progress reporter with the given callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(usize, usize, usize) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Report progress on `level`.
    #[inline]
    pub fn report(&self, level: usize, done: usize, total: usize) {
        (self.callback)(level, done, total);
    }

    /// A reporter that discards all updates.
    pub fn none() -> Self {
        Self::new(|_, _, _| {})
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress").finish_non_exhaustive()
    }
}
