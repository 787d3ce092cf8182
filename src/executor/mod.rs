//! Executor: bounded-concurrency orchestration of requests and iterations.
//!
//! Both top-level entry points, the bulk [`RequestExecutionEngine`] and the
//! [`crate::scenario::ScenarioLoadTester`], run on the same scheduling model: one
//! lightweight tokio task per unit of work (a request, or a scenario iteration),
//! with admission regulated solely by a counting [`Semaphore`].
//!
//! # High-level flow
//! 1. A per-run [`ExecutionContext`] is created, holding the completed counter and
//!    the cancellation flag.
//! 2. A semaphore with `concurrency` permits is created.
//! 3. `total` tasks are spawned at once. Each task:
//!    - returns immediately if the run was cancelled,
//!    - waits for a permit,
//!    - checks the cancellation flag again (the unit has not started yet),
//!    - runs the unit of work, bumps the completed counter and notifies the
//!      progress sink,
//!    - releases the permit by dropping it.
//! 4. The caller joins every task and collects the results.
//!
//! Thousands of tasks can be pending cheaply while only `concurrency` are ever
//! in flight, independently of how many worker threads the runtime has.
//!
//! # Cancellation
//! Cooperative, checked only before a unit of work starts. A request that is
//! already on the wire always runs to completion. Cancelled units produce no
//! result and no callback and do not advance the completed counter, so the
//! number of collected results always equals [`ExecutionContext::completed`].
//!
//! # Ordering
//! None. Results come back as an unordered multiset; the completed counter is
//! monotonic and gap-free.
mod engine;

pub use engine::RequestExecutionEngine;

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use tokio::sync::Semaphore;

use crate::progress::percentage;

/// Shared state of one run: how many units completed and whether the run was
/// cancelled. Cheap to clone; every clone observes the same run.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    inner: Arc<ContextState>,
}

#[derive(Debug)]
struct ContextState {
    total: usize,
    completed: AtomicUsize,
    cancelled: AtomicBool,
}

impl ExecutionContext {
    pub fn new(total: usize) -> Self {
        Self {
            inner: Arc::new(ContextState {
                total,
                completed: AtomicUsize::new(0),
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    pub fn total(&self) -> usize {
        self.inner.total
    }

    pub fn completed(&self) -> usize {
        self.inner.completed.load(Ordering::Acquire)
    }

    pub(crate) fn increment_completed(&self) -> usize {
        self.inner.completed.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Stop admitting new units of work. In-flight units finish normally.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Completion percentage, 0 when the run has no units.
    pub fn progress(&self) -> f64 {
        percentage(self.completed(), self.total())
    }
}

#[cfg(feature = "internals")]
pub use internals::*;

/// Building blocks shared by both runners.
/// Encapsulated in a module to allow conditional exposure via `#[cfg(feature = "internals")]`.
pub(crate) mod internals {
    use super::*;
    use futures::future::join_all;
    use std::future::Future;
    use tokio::task::JoinHandle;

    /// Caps the permit count at what the tokio semaphore can represent.
    pub fn semaphore_for(concurrency: usize) -> Arc<Semaphore> {
        Arc::new(Semaphore::new(concurrency.min(Semaphore::MAX_PERMITS)))
    }

    /// Spawns one task per unit of work, each gated by `semaphore`.
    ///
    /// `job(index)` builds the unit's future; it is only polled once a permit is
    /// held and the run is still live, and the permit is held until it resolves.
    pub fn spawn_bounded<T, F, Fut>(
        ctx: &ExecutionContext,
        semaphore: &Arc<Semaphore>,
        job: F,
    ) -> Vec<JoinHandle<Option<T>>>
    where
        T: Send + 'static,
        F: Fn(usize) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        (0..ctx.total())
            .map(|i| {
                let ctx = ctx.clone();
                let semaphore = semaphore.clone();
                let unit = job(i);
                tokio::spawn(async move {
                    if ctx.is_cancelled() {
                        return None;
                    }
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(p) => p,
                        Err(_) => {
                            tracing::debug!("Task {i} failed to acquire a permit (semaphore closed).");
                            return None;
                        }
                    };
                    if ctx.is_cancelled() {
                        tracing::debug!("Task {i} skipped, run cancelled.");
                        return None;
                    }
                    Some(unit.await)
                })
            })
            .collect()
    }

    /// Joins every task. Tasks that panicked or were aborted are dropped with an
    /// error log instead of taking the whole run down.
    pub async fn join_bounded<T>(handles: Vec<JoinHandle<Option<T>>>) -> Vec<T> {
        join_all(handles)
            .await
            .into_iter()
            .filter_map(|res| match res {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!("Task failed, dropping its result: {e}");
                    None
                }
            })
            .collect()
    }
}
