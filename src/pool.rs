//! Bounded fan-out and supervised background tasks.

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};

use crate::ui::{Operator, UiHandle};

/// Run `f` once per item with at most `workers` futures in flight.
///
/// Each task is isolated: a panic is caught and reported as `Err` for that
/// item only. Returns after every task has finished, in completion order.
pub async fn run_bounded<K, T, F, Fut>(items: Vec<K>, workers: usize, f: F) -> Vec<(K, Result<T, String>)>
where
    K: Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let f = Arc::new(f);
    let mut set = JoinSet::new();

    for item in items {
        let semaphore = Arc::clone(&semaphore);
        let f = Arc::clone(&f);
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let result = AssertUnwindSafe(f(item.clone()))
                .catch_unwind()
                .await
                .map_err(panic_message);
            (item, result)
        });
    }

    let mut results = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(pair) => results.push(pair),
            Err(e) => tracing::error!("pooled task aborted: {}", e),
        }
    }
    results
}

pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

/// Spawn an operator-triggered action. Errors and panics are logged and shown
/// to the operator; they are never dropped silently.
pub fn supervise<F, T, E>(
    rt: &tokio::runtime::Handle,
    ui: UiHandle,
    operator: Arc<dyn Operator>,
    label: String,
    fut: F,
) -> JoinHandle<()>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
{
    rt.spawn(async move {
        let message = match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(_)) => return,
            Ok(Err(e)) => e.to_string(),
            Err(panic) => format!("internal error: {}", panic_message(panic)),
        };
        ui.error(format!("{} failed: {}", label, message));
        operator.alert(&label, &message);
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_worker_count() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (a, b) = (Arc::clone(&in_flight), Arc::clone(&peak));
        let results = run_bounded((0..12).collect(), 3, move |i: u32| {
            let (in_flight, peak) = (Arc::clone(&a), Arc::clone(&b));
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                i * 2
            }
        })
        .await;
        assert_eq!(results.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn panic_is_isolated_to_its_item() {
        let results = run_bounded(vec!["A", "B", "C"], 2, |node: &'static str| async move {
            if node == "B" {
                panic!("boom on B");
            }
            node.len()
        })
        .await;
        assert_eq!(results.len(), 3);
        for (node, result) in results {
            match node {
                "B" => assert_eq!(result.unwrap_err(), "boom on B"),
                _ => assert_eq!(result.unwrap(), 1),
            }
        }
    }
}
