//! Bounded-concurrency batch runner.
//!
//! Runs a list of asynchronous thunks with at most `limit` in flight and
//! returns every outcome in input order. A failing task never cancels its
//! siblings.

use futures::{StreamExt, future::BoxFuture, stream::FuturesOrdered};
use thiserror::Error;

/// Concurrency used when the caller does not configure one.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// A unit of work that is only started once admitted.
pub type Task<T, E> = Box<dyn FnOnce() -> BoxFuture<'static, Result<T, E>> + Send>;

/// Why a slot in the batch did not produce a value.
#[derive(Debug, Error)]
pub enum TaskFailure<E> {
    #[error("task failed: {0}")]
    Failed(E),
    #[error("task aborted: {0}")]
    Aborted(String),
}

/// Box a closure into a [`Task`].
pub fn task<T, E, F, Fut>(f: F) -> Task<T, E>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<T, E>> + Send + 'static,
{
    Box::new(move || Box::pin(f()) as BoxFuture<'static, Result<T, E>>)
}

/// Run `tasks` with at most `limit` in flight.
///
/// Each admitted task is spawned onto the runtime, so one that has started
/// runs to completion even if the returned future is dropped. Dropping the
/// future stops admission of the remaining tasks.
pub async fn run_bounded<T, E>(tasks: Vec<Task<T, E>>, limit: usize) -> Vec<Result<T, TaskFailure<E>>>
where
    T: Send + 'static,
    E: Send + 'static,
{
    let limit = limit.max(1);
    let mut pending = tasks.into_iter();
    let mut in_flight = FuturesOrdered::new();
    let mut outcomes = Vec::with_capacity(pending.len());

    loop {
        while in_flight.len() < limit {
            match pending.next() {
                Some(thunk) => in_flight.push_back(tokio::spawn(thunk())),
                None => break,
            }
        }

        let Some(joined) = in_flight.next().await else {
            break;
        };
        outcomes.push(match joined {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(TaskFailure::Failed(err)),
            Err(join_err) => Err(TaskFailure::Aborted(join_err.to_string())),
        });
    }

    outcomes
}
