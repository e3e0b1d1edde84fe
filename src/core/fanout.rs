//! Concurrent map over a set of keys with fail-fast semantics.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::hash::Hash;
use tokio::task::{JoinError, JoinSet};
use tracing::debug;

/// Runs `f` once per distinct key on its own task and collects the results.
///
/// The first error aborts the remaining tasks. They are still joined before
/// returning so no work outlives the call. A panicking task is resumed on the
/// caller.
pub async fn try_join_keyed<K, V, E, F, Fut>(
    keys: impl IntoIterator<Item = K>,
    mut f: F,
) -> Result<HashMap<K, V>, E>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
    E: From<JoinError> + Send + 'static,
    F: FnMut(K) -> Fut,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
{
    let mut seen = HashSet::new();
    let mut tasks = JoinSet::new();
    for key in keys {
        if !seen.insert(key.clone()) {
            continue;
        }
        let fut = f(key.clone());
        tasks.spawn(async move { (key, fut.await) });
    }
    debug!(tasks = tasks.len(), "Spawned keyed tasks");

    let mut results = HashMap::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        let err = match joined {
            Ok((key, Ok(value))) => {
                results.insert(key, value);
                continue;
            }
            Ok((_, Err(e))) => e,
            Err(e) if e.is_panic() => {
                drain(&mut tasks).await;
                std::panic::resume_unwind(e.into_panic());
            }
            Err(e) => E::from(e),
        };
        debug!(pending = tasks.len(), "Keyed task failed, aborting the rest");
        drain(&mut tasks).await;
        return Err(err);
    }

    Ok(results)
}

async fn drain<T: 'static>(tasks: &mut JoinSet<T>) {
    tasks.abort_all();
    while tasks.join_next().await.is_some() {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Failed(String),
        Join,
    }

    impl From<JoinError> for TestError {
        fn from(_: JoinError) -> Self {
            TestError::Join
        }
    }

    #[tokio::test]
    async fn test_collects_all_results() {
        let results = try_join_keyed(vec![1, 2, 3], |k| async move {
            Ok::<_, TestError>(k * 10)
        })
        .await
        .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[&2], 20);
    }

    #[tokio::test]
    async fn test_runs_once_per_distinct_key() {
        let calls = Arc::new(AtomicUsize::new(0));
        let keys = vec!["ETH", "BTC", "ETH", "ETH", "BTC"];

        let results = try_join_keyed(keys, |k| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TestError>(k.len())
            }
        })
        .await
        .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_first_error_aborts_slow_tasks() {
        let finished = Arc::new(AtomicUsize::new(0));

        let run = try_join_keyed(vec![0u64, 1, 2], |k| {
            let finished = Arc::clone(&finished);
            async move {
                if k == 0 {
                    return Err(TestError::Failed("boom".to_string()));
                }
                tokio::time::sleep(Duration::from_secs(60)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(k)
            }
        });

        let result = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("fan-out should fail fast");
        assert_eq!(result.unwrap_err(), TestError::Failed("boom".to_string()));
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_keys() {
        let results = try_join_keyed(Vec::<u8>::new(), |k| async move {
            Ok::<_, TestError>(k)
        })
        .await
        .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    #[should_panic(expected = "task blew up")]
    async fn test_panic_is_resumed() {
        let _ = try_join_keyed(vec![1], |_| async move {
            if true {
                panic!("task blew up");
            }
            Ok::<u8, TestError>(0)
        })
        .await;
    }
}
