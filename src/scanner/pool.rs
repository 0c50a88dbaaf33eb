// Bounded fan-out with a join barrier
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOut {
    pub launched: usize,
    pub cancelled: bool,
}

/// Run `work` for every item with at most `concurrency` tasks alive.
///
/// A permit is taken before each spawn, so neither tasks nor their sockets
/// can outnumber the limit. Returns only once every launched task has
/// finished. Cancellation stops new launches; in-flight tasks run to
/// completion on their own timeouts.
pub async fn fan_out<I, F, Fut>(
    items: I,
    concurrency: usize,
    cancel: &CancellationToken,
    mut work: F,
) -> FanOut
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();
    let mut launched = 0;
    let mut cancelled = false;

    for item in items {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                cancelled = true;
                break;
            }
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let task = work(item);
        tasks.spawn(async move {
            let _permit = permit;
            task.await;
        });
        launched += 1;

        // Reap finished handles so the set stays the size of the pool.
        while let Some(result) = tasks.try_join_next() {
            log_join_failure(result);
        }
    }

    while let Some(result) = tasks.join_next().await {
        log_join_failure(result);
    }

    FanOut { launched, cancelled }
}

fn log_join_failure(result: Result<(), JoinError>) {
    if let Err(e) = result {
        warn!(error = %e, "probe task failed");
    }
}
