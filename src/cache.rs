//! Concurrency-safe result cache for expensive host queries.
//!
//! Pagination-driven controllers re-issue the same request many times in a
//! short window; the cache guarantees the backing command runs at most once
//! per validity window and that concurrent first-time callers coalesce onto
//! a single execution.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::commands::CommandOutput;
use crate::error::{GatewayError, Result};

/// One cached query result. Replaced wholesale on refresh, never patched.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Arc<CommandOutput>,
    pub expires_at: Instant,
    /// Identifies the execution that produced this entry; every page served
    /// from the entry logs it so controller-side inconsistencies can be
    /// correlated with a snapshot change.
    pub snapshot: Uuid,
}

type SharedExecution = Shared<BoxFuture<'static, Result<Arc<CommandOutput>>>>;

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    in_flight: HashMap<String, SharedExecution>,
}

/// Process-scoped cache mediating external query execution.
pub struct CommandCache {
    inner: Arc<Mutex<CacheInner>>,
}

impl CommandCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
            })),
        }
    }

    /// Return the value for `key`, executing `producer` only when needed.
    ///
    /// A valid entry is returned without running `producer` unless
    /// `force_refresh` is set. When an execution for `key` is already in
    /// flight, the caller attaches to it (its own `producer` is dropped
    /// unexecuted) — this holds for forced refreshes too, so at most one
    /// execution per key exists at any time. A fresh execution is spawned as
    /// a task and always runs to completion, even if every waiter goes away;
    /// on success it replaces the entry wholesale, on failure it leaves the
    /// cache untouched and the error is shared with all waiters.
    pub async fn fetch<F>(
        &self,
        key: &str,
        ttl: Duration,
        force_refresh: bool,
        producer: F,
    ) -> Result<Arc<CommandOutput>>
    where
        F: Future<Output = Result<CommandOutput>> + Send + 'static,
    {
        let execution = {
            let mut inner = self.inner.lock();

            if !force_refresh
                && let Some(entry) = inner.entries.get(key)
                && entry.expires_at > Instant::now()
            {
                log::debug!("Serving cached result for {key} (snapshot {})", entry.snapshot);
                return Ok(entry.value.clone());
            }

            if let Some(existing) = inner.in_flight.get(key) {
                log::debug!("Attaching to in-flight execution for {key}");
                existing.clone()
            } else {
                let execution = self.spawn_execution(key.to_string(), ttl, producer);
                inner.in_flight.insert(key.to_string(), execution.clone());
                execution
            }
        };

        execution.await
    }

    fn spawn_execution<F>(&self, key: String, ttl: Duration, producer: F) -> SharedExecution
    where
        F: Future<Output = Result<CommandOutput>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            let result = producer.await.map(Arc::new);

            {
                let mut inner = inner.lock();
                inner.in_flight.remove(&key);
                match &result {
                    Ok(value) => {
                        let snapshot = Uuid::new_v4();
                        log::debug!("Caching result for {key} (snapshot {snapshot})");
                        inner.entries.insert(
                            key,
                            CacheEntry {
                                value: value.clone(),
                                expires_at: Instant::now() + ttl,
                                snapshot,
                            },
                        );
                    }
                    Err(err) => {
                        log::warn!("Execution failed for {key}: {err}");
                    }
                }
            }

            // Waiters may all have dropped; the execution still completed.
            let _ = tx.send(result);
        });

        rx.map(|received| match received {
            Ok(result) => result,
            Err(_) => Err(GatewayError::ExecError(
                "execution task dropped before completing".to_string(),
            )),
        })
        .boxed()
        .shared()
    }

    /// Live entry metadata for `key`, if present and unexpired.
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        let inner = self.inner.lock();
        inner
            .entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .cloned()
    }
}

impl Default for CommandCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_secs(60);

    fn output(stdout: &str) -> CommandOutput {
        CommandOutput {
            status: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    fn counting_producer(
        counter: Arc<AtomicUsize>,
        delay: Duration,
    ) -> impl Future<Output = Result<CommandOutput>> + Send + 'static {
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            Ok(output("data"))
        }
    }

    #[tokio::test]
    async fn test_repeated_fetch_within_ttl_executes_once() {
        let cache = CommandCache::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let value = cache
                .fetch(
                    "key",
                    TTL,
                    false,
                    counting_producer(counter.clone(), Duration::ZERO),
                )
                .await
                .unwrap();
            assert_eq!(value.stdout, "data");
        }

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_fetches_coalesce() {
        let cache = Arc::new(CommandCache::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .fetch(
                        "key",
                        TTL,
                        false,
                        counting_producer(counter, Duration::from_millis(50)),
                    )
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().stdout, "data");
        }

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_force_refresh_replaces_entry() {
        let cache = CommandCache::new();
        let counter = Arc::new(AtomicUsize::new(0));

        cache
            .fetch(
                "key",
                TTL,
                false,
                counting_producer(counter.clone(), Duration::ZERO),
            )
            .await
            .unwrap();
        let first = cache.entry("key").unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;

        cache
            .fetch(
                "key",
                TTL,
                true,
                counting_producer(counter.clone(), Duration::ZERO),
            )
            .await
            .unwrap();
        let second = cache.entry("key").unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(second.expires_at > first.expires_at);
        assert_ne!(second.snapshot, first.snapshot);
    }

    #[tokio::test]
    async fn test_failure_leaves_key_absent() {
        let cache = CommandCache::new();

        let result = cache
            .fetch("key", TTL, false, async {
                Err(GatewayError::ExecError("boom".to_string()))
            })
            .await;

        assert!(matches!(result, Err(GatewayError::ExecError(_))));
        assert!(cache.entry("key").is_none());
    }

    #[tokio::test]
    async fn test_failed_refresh_preserves_stale_entry() {
        let cache = CommandCache::new();
        let counter = Arc::new(AtomicUsize::new(0));

        cache
            .fetch(
                "key",
                TTL,
                false,
                counting_producer(counter.clone(), Duration::ZERO),
            )
            .await
            .unwrap();
        let before = cache.entry("key").unwrap();

        let result = cache
            .fetch("key", TTL, true, async {
                Err(GatewayError::ExecError("boom".to_string()))
            })
            .await;
        assert!(result.is_err());

        let after = cache.entry("key").unwrap();
        assert_eq!(after.snapshot, before.snapshot);
        assert_eq!(after.value, before.value);
    }

    #[tokio::test]
    async fn test_waiters_share_failure() {
        let cache = Arc::new(CommandCache::new());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .fetch("key", TTL, false, async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err(GatewayError::ExecError("boom".to_string()))
                    })
                    .await
            }));
        }

        for handle in handles {
            let result = handle.await.unwrap();
            assert_eq!(
                result,
                Err(GatewayError::ExecError("boom".to_string())),
            );
        }
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        tokio_test::block_on(async {
            let cache = CommandCache::new();
            assert!(cache.entry("key").is_none());

            cache
                .fetch("key", Duration::from_millis(30), false, async {
                    Ok(output("data"))
                })
                .await
                .unwrap();
            assert!(cache.entry("key").is_some());

            tokio::time::sleep(Duration::from_millis(50)).await;
            assert!(cache.entry("key").is_none());
        });
    }

    #[tokio::test]
    async fn test_distinct_keys_execute_independently() {
        let cache = CommandCache::new();
        let counter = Arc::new(AtomicUsize::new(0));

        cache
            .fetch(
                "a",
                TTL,
                false,
                counting_producer(counter.clone(), Duration::ZERO),
            )
            .await
            .unwrap();
        cache
            .fetch(
                "b",
                TTL,
                false,
                counting_producer(counter.clone(), Duration::ZERO),
            )
            .await
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
