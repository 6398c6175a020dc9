//! Bounded fan-out over a list of items.

use std::future::Future;

use anyhow::{Result, anyhow};
use tokio::task::JoinSet;

/// Run `f` over `items` with at most `max_parallel` calls in flight.
///
/// A frontier cursor launches the next pending item whenever one finishes.
/// The first failure ends the batch: nothing further is launched and the
/// calls still in flight are detached, so they run to completion but their
/// results are discarded. Results come back in input order.
///
/// A `max_parallel` of zero is treated as one.
pub async fn run_parallel<T, R, F, Fut>(items: Vec<T>, max_parallel: usize, f: F) -> Result<Vec<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    let limit = max_parallel.max(1);
    let total = items.len();
    let mut results: Vec<Option<R>> = std::iter::repeat_with(|| None).take(total).collect();
    let mut pending = items.into_iter().enumerate();
    let mut in_flight = JoinSet::new();

    let launch = |set: &mut JoinSet<(usize, Result<R>)>, index: usize, item: T| {
        let task = f(item);
        set.spawn(async move { (index, task.await) });
    };

    for (index, item) in pending.by_ref().take(limit) {
        launch(&mut in_flight, index, item);
    }

    while let Some(joined) = in_flight.join_next().await {
        let outcome = match joined {
            Ok((index, Ok(value))) => Ok((index, value)),
            Ok((_, Err(err))) => Err(err),
            Err(err) if err.is_panic() => Err(anyhow!("parallel task panicked")),
            Err(err) => Err(anyhow!("parallel task aborted: {err}")),
        };

        match outcome {
            Ok((index, value)) => {
                results[index] = Some(value);
                if let Some((index, item)) = pending.next() {
                    launch(&mut in_flight, index, item);
                }
            }
            Err(err) => {
                in_flight.detach_all();
                return Err(err);
            }
        }
    }

    // Every slot is filled once the set drains without error.
    Ok(results.into_iter().flatten().collect())
}
