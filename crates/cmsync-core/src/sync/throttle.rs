//! Bounded-concurrency batch runner with retry passes

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream::{self, StreamExt};
use tracing::debug;

use super::retry::RetryPolicy;
use crate::error::{Result, SyncError};

/// Default number of in-flight items per batch
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Final result of one item of a batch
#[derive(Debug)]
pub struct ItemOutcome<I, T> {
    /// The item as it was submitted
    pub item: I,
    /// Attempts made, including the successful or final one
    pub attempts: u32,
    /// Result of the last attempt
    pub result: Result<T>,
}

/// Runs one async operation per item with at most `limit` in flight
///
/// Items run in passes. Failures the retry policy accepts are collected and
/// re-run in the next pass after the policy's delay; every other result is
/// final. Completion order within a pass is not guaranteed, the returned
/// outcomes are in submission order.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyThrottle {
    limit: usize,
    fail_fast: bool,
}

impl Default for ConcurrencyThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl ConcurrencyThrottle {
    /// Throttle with `limit` in-flight items (at least one)
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            fail_fast: false,
        }
    }

    /// Stop scheduling new items after the first permanent failure
    #[must_use]
    pub const fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Concurrency limit
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Run `op(item, attempt)` for every item
    ///
    /// # Errors
    ///
    /// In fail-fast mode, returns [`SyncError::BatchAborted`] once an item
    /// fails permanently. Items not yet started are skipped and retries are
    /// abandoned; items already in flight finish first.
    pub async fn run<I, T, F, Fut>(
        &self,
        items: Vec<I>,
        policy: &RetryPolicy,
        op: F,
    ) -> Result<Vec<ItemOutcome<I, T>>>
    where
        I: Clone,
        F: Fn(I, u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let aborted = AtomicBool::new(false);
        let mut finished: Vec<(usize, ItemOutcome<I, T>)> = Vec::with_capacity(items.len());
        let mut pending: Vec<(usize, I)> = items.into_iter().enumerate().collect();
        let mut first_error: Option<String> = None;
        let mut attempt = 1;

        let aborted_flag = &aborted;
        let op = &op;
        let fail_fast = self.fail_fast;

        while !pending.is_empty() {
            debug!(attempt, items = pending.len(), limit = self.limit, "starting batch pass");

            let pass: Vec<(usize, I, Result<T>)> = stream::iter(pending)
                .map(move |(index, item)| async move {
                    if aborted_flag.load(Ordering::SeqCst) {
                        return None;
                    }
                    let result = op(item.clone(), attempt).await;
                    if fail_fast {
                        if let Err(e) = &result {
                            if !policy.should_retry(e, attempt) {
                                aborted_flag.store(true, Ordering::SeqCst);
                            }
                        }
                    }
                    Some((index, item, result))
                })
                .buffer_unordered(self.limit)
                .filter_map(|outcome| async move { outcome })
                .collect()
                .await;

            let mut retry = Vec::new();
            for (index, item, result) in pass {
                match result {
                    Err(e) if policy.should_retry(&e, attempt) => {
                        debug!(attempt, "retrying item after: {e}");
                        retry.push((index, item));
                    }
                    result => {
                        if let Err(e) = &result {
                            if first_error.is_none() {
                                first_error = Some(e.to_string());
                            }
                        }
                        finished.push((
                            index,
                            ItemOutcome {
                                item,
                                attempts: attempt,
                                result,
                            },
                        ));
                    }
                }
            }

            if aborted.load(Ordering::SeqCst) {
                return Err(SyncError::BatchAborted {
                    completed: finished.len(),
                    first_error: first_error.unwrap_or_default(),
                });
            }

            if !retry.is_empty() {
                tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
            }
            pending = retry;
            attempt += 1;
        }

        finished.sort_by_key(|(index, _)| *index);
        Ok(finished.into_iter().map(|(_, outcome)| outcome).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            ..RetryPolicy::default()
        }
    }

    #[tokio::test]
    async fn test_runs_every_item_in_submission_order() {
        let throttle = ConcurrencyThrottle::new(3);
        let outcomes = throttle
            .run((0..20).collect::<Vec<u32>>(), &RetryPolicy::none(), |n: u32, _| async move {
                tokio::time::sleep(Duration::from_millis(u64::from(20 - n))).await;
                Ok(n * 2)
            })
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 20);
        for (n, outcome) in outcomes.iter().enumerate() {
            assert_eq!(outcome.item as usize, n);
            assert_eq!(*outcome.result.as_ref().unwrap(), outcome.item * 2);
            assert_eq!(outcome.attempts, 1);
        }
    }

    #[tokio::test]
    async fn test_never_exceeds_limit() {
        let in_flight = &AtomicUsize::new(0);
        let peak = &AtomicUsize::new(0);

        ConcurrencyThrottle::new(4)
            .run((0..32).collect::<Vec<u32>>(), &RetryPolicy::none(), move |_, _| async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 4);
        assert!(peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_retryable_failures_are_requeued() {
        let attempts: Mutex<HashMap<u32, u32>> = Mutex::new(HashMap::new());

        let outcomes = ConcurrencyThrottle::new(2)
            .run(vec![1, 2, 3], &fast_policy(3), |n: u32, attempt| {
                attempts.lock().unwrap().insert(n, attempt);
                async move {
                    if n == 2 && attempt < 3 {
                        Err(SyncError::transport(Some(503), "busy"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await
            .unwrap();

        assert!(outcomes.iter().all(|o| o.result.is_ok()));
        assert_eq!(outcomes[1].attempts, 3);
        assert_eq!(attempts.lock().unwrap()[&2], 3);
        assert_eq!(attempts.lock().unwrap()[&1], 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_are_final() {
        let outcomes = ConcurrencyThrottle::new(2)
            .run(vec![1], &fast_policy(2), |_: u32, _| async {
                Err::<(), _>(SyncError::transport(None, "refused"))
            })
            .await
            .unwrap();

        assert_eq!(outcomes[0].attempts, 2);
        assert!(outcomes[0].result.is_err());
    }

    #[tokio::test]
    async fn test_fail_fast_aborts_batch() {
        let started = AtomicUsize::new(0);

        let err = ConcurrencyThrottle::new(1)
            .fail_fast(true)
            .run((0..10).collect::<Vec<u32>>(), &RetryPolicy::none(), |n, _| {
                started.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 2 {
                        Err(SyncError::Validation("bad item".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await
            .unwrap_err();

        match err {
            SyncError::BatchAborted {
                completed,
                first_error,
            } => {
                assert_eq!(completed, 3);
                assert!(first_error.contains("bad item"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(started.load(Ordering::SeqCst), 3);
    }
}
