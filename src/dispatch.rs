//! Bounded fan-out of per-item work.
//!
//! Each admitted item runs in its own task holding one semaphore permit, so
//! the permit is released however the task ends. A panicking task costs
//! only its own slot. Items never admitted because of cancellation still
//! get a result, and results come back in input order.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::error::Error;

enum Slot<I, T> {
    Admitted(I, JoinHandle<T>),
    Skipped(I),
}

/// Run `work` for every item with at most `limit` in flight.
///
/// `fallback` builds the result for an item that was cancelled before
/// admission or whose task panicked.
pub(crate) async fn dispatch<I, T, W, Fut, F>(
    items: Vec<I>,
    limit: usize,
    cancel: &CancellationToken,
    work: W,
    fallback: F,
) -> Vec<T>
where
    I: Clone,
    T: Send + 'static,
    W: Fn(I) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    F: Fn(I, Error) -> T,
{
    let gate = Arc::new(Semaphore::new(limit.clamp(1, Semaphore::MAX_PERMITS)));
    let mut slots = Vec::with_capacity(items.len());

    for item in items {
        if cancel.is_cancelled() {
            slots.push(Slot::Skipped(item));
            continue;
        }

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = Arc::clone(&gate).acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit else {
            slots.push(Slot::Skipped(item));
            continue;
        };

        let task = work(item.clone());
        let handle = tokio::spawn(async move {
            let _permit = permit;
            task.await
        });
        slots.push(Slot::Admitted(item, handle));
    }

    let fallback = &fallback;
    join_all(slots.into_iter().map(|slot| async move {
        match slot {
            Slot::Admitted(item, handle) => match handle.await {
                Ok(result) => result,
                Err(err) => {
                    let err = Error::from_join(err);
                    error!(error = %err, "worker failed");
                    fallback(item, err)
                }
            },
            Slot::Skipped(item) => fallback(item, Error::Cancelled),
        }
    }))
    .await
}
