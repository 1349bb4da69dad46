//! Response tracker - correlates in-flight requests with their responses.
//!
//! Each tracked correlation id moves through exactly one lifecycle:
//! *absent* → `track` → *pending* → (`handle_response` | timeout | `cancel`)
//! → *absent*. Removal from the pending table is the commit point, so a
//! response and a timeout racing for the same id are decided by whoever
//! removes the entry first; the loser sees nothing left and walks away.
//!
//! A periodic sweep force-fires timeouts for entries whose individual timer
//! drifted or was extended early. It is a backstop, not the primary
//! mechanism.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use janus_protocol::correlator::{ResponseTracker, TrackerConfig};
//! use janus_protocol::protocol::Response;
//! use serde_json::json;
//!
//! # async fn example() -> janus_protocol::Result<()> {
//! let tracker = ResponseTracker::new(TrackerConfig::default());
//!
//! let pending = tracker.track("req-1", Duration::from_secs(5)).await?;
//! tracker
//!     .handle_response(&Response::success("req-1", Some(json!(42))))
//!     .await;
//! let result = pending.wait().await?;
//! assert_eq!(result, Some(json!(42)));
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::{ErrorCode, JanusError, ProtocolError, Result};
use crate::protocol::Response;

/// Default maximum number of simultaneously pending requests.
pub const DEFAULT_MAX_PENDING: usize = 1000;

/// Default interval for the timeout sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Suffix for the outbound leg of a bilateral exchange.
const REQUEST_LEG_SUFFIX: &str = "-request";

/// Suffix for the inbound leg of a bilateral exchange.
const RESPONSE_LEG_SUFFIX: &str = "-response";

/// Tracker configuration.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Maximum pending requests before `track` rejects.
    pub max_pending: usize,
    /// How often the sweep scans for overdue entries.
    pub sweep_interval: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_pending: DEFAULT_MAX_PENDING,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// Resolution delivered to a [`PendingResponse`].
type Outcome = std::result::Result<Option<Value>, ProtocolError>;

/// A pending entry, exclusively owned by the tracker.
struct PendingEntry {
    /// One-shot resolution channel. Sending consumes the entry.
    tx: oneshot::Sender<Outcome>,
    /// When `track` stored this entry. Lives on the runtime clock so due
    /// checks agree with the sleep-based timers.
    created_at: Instant,
    /// Logical timeout. `extend_timeout` grows this without restarting
    /// the elapsed clock.
    timeout: Duration,
}

struct TrackerInner {
    pending: HashMap<String, PendingEntry>,
    shutdown: bool,
}

/// Handle for awaiting the resolution of one tracked request.
#[derive(Debug)]
pub struct PendingResponse {
    rx: oneshot::Receiver<Outcome>,
}

impl PendingResponse {
    /// Wait for resolution.
    ///
    /// Success yields the response's result value; timeout, cancellation,
    /// and remote failure all arrive as [`JanusError::Protocol`].
    pub async fn wait(self) -> Result<Option<Value>> {
        match self.rx.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(error)) => Err(JanusError::Protocol(error)),
            Err(_) => Err(JanusError::Tracking(
                "tracker dropped without resolving".to_string(),
            )),
        }
    }
}

/// Both legs of a bilateral exchange.
pub struct BilateralPending {
    /// Resolution for `{base}-request` (the outbound leg).
    pub request: PendingResponse,
    /// Resolution for `{base}-response` (the inbound leg).
    pub response: PendingResponse,
}

/// Snapshot of tracker state.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerStats {
    /// Number of pending requests.
    pub pending: usize,
    /// Mean age of pending entries in seconds.
    pub average_age_secs: f64,
    /// Id and age of the oldest entry.
    pub oldest: Option<(String, f64)>,
    /// Id and age of the newest entry.
    pub newest: Option<(String, f64)>,
}

/// Tracks in-flight requests by correlation id.
///
/// Owns the pending table and the sweep task; construct one per client or
/// server and call [`shutdown`](Self::shutdown) when that owner goes away.
pub struct ResponseTracker {
    inner: Arc<Mutex<TrackerInner>>,
    config: TrackerConfig,
    sweep_task: JoinHandle<()>,
}

impl ResponseTracker {
    /// Create a tracker and start its sweep task.
    pub fn new(config: TrackerConfig) -> Self {
        let inner = Arc::new(Mutex::new(TrackerInner {
            pending: HashMap::new(),
            shutdown: false,
        }));

        let sweep_task = tokio::spawn({
            let inner = inner.clone();
            let interval = config.sweep_interval;
            async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    Self::sweep_expired(&inner).await;
                }
            }
        });

        Self {
            inner,
            config,
            sweep_task,
        }
    }

    /// Register a pending request.
    ///
    /// Rejects immediately, without starting a timer, if `id` is already
    /// pending ("already tracked") or the pending count is at
    /// `max_pending` ("limit exceeded").
    pub async fn track(&self, id: &str, timeout: Duration) -> Result<PendingResponse> {
        let (tx, rx) = oneshot::channel();

        {
            let mut inner = self.inner.lock().await;
            if inner.shutdown {
                return Err(JanusError::Tracking("tracker is shut down".to_string()));
            }
            if inner.pending.contains_key(id) {
                return Err(JanusError::Tracking(format!("already tracked: {id}")));
            }
            if inner.pending.len() >= self.config.max_pending {
                return Err(JanusError::Tracking(format!(
                    "limit exceeded: {} requests pending",
                    inner.pending.len()
                )));
            }
            inner.pending.insert(
                id.to_string(),
                PendingEntry {
                    tx,
                    created_at: Instant::now(),
                    timeout,
                },
            );
        }

        self.spawn_timer(id.to_string(), timeout);
        Ok(PendingResponse { rx })
    }

    /// Resolve or reject the pending entry matching this response.
    ///
    /// Returns `false` ("not handled") when no entry is pending for the
    /// response's correlation id. That is an expected race against timeout
    /// or cancellation on an unacknowledged transport; it is logged as an
    /// observable event but never raised as an error.
    pub async fn handle_response(&self, response: &Response) -> bool {
        let entry = {
            let mut inner = self.inner.lock().await;
            inner.pending.remove(&response.request_id)
        };

        let Some(entry) = entry else {
            tracing::debug!(
                request_id = %response.request_id,
                "response not handled: no pending entry"
            );
            return false;
        };

        let outcome = if response.success {
            Ok(response.result.clone())
        } else {
            Err(response.error.clone().unwrap_or_else(|| {
                ProtocolError::internal_error("failed response carried no error payload")
            }))
        };

        // The receiver may already be gone; that is fine.
        let _ = entry.tx.send(outcome);
        tracing::trace!(request_id = %response.request_id, "pending entry resolved");
        true
    }

    /// Cancel one pending request. Returns whether it was still pending.
    pub async fn cancel(&self, id: &str, reason: Option<&str>) -> bool {
        let entry = {
            let mut inner = self.inner.lock().await;
            inner.pending.remove(id)
        };

        match entry {
            Some(entry) => {
                let _ = entry.tx.send(Err(cancellation_error(reason)));
                tracing::trace!(request_id = %id, "pending entry cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancel every pending request. Returns how many were cancelled.
    pub async fn cancel_all(&self, reason: Option<&str>) -> usize {
        let drained: Vec<(String, PendingEntry)> = {
            let mut inner = self.inner.lock().await;
            inner.pending.drain().collect()
        };

        let count = drained.len();
        for (id, entry) in drained {
            let _ = entry.tx.send(Err(cancellation_error(reason)));
            tracing::trace!(request_id = %id, "pending entry cancelled");
        }
        count
    }

    /// Grow the logical timeout of a pending request by `extra`.
    ///
    /// The elapsed clock is not restarted; one additional timer is
    /// scheduled for the increment. Returns whether the id was found.
    pub async fn extend_timeout(&self, id: &str, extra: Duration) -> bool {
        let found = {
            let mut inner = self.inner.lock().await;
            match inner.pending.get_mut(id) {
                Some(entry) => {
                    entry.timeout += extra;
                    true
                }
                None => false,
            }
        };

        if found {
            self.spawn_timer(id.to_string(), extra);
        }
        found
    }

    /// Track both legs of a bilateral exchange under `{base}-request` and
    /// `{base}-response`.
    pub async fn track_bilateral(
        &self,
        base_id: &str,
        request_timeout: Duration,
        response_timeout: Duration,
    ) -> Result<BilateralPending> {
        let request_id = format!("{base_id}{REQUEST_LEG_SUFFIX}");
        let response_id = format!("{base_id}{RESPONSE_LEG_SUFFIX}");

        let request = self.track(&request_id, request_timeout).await?;
        let response = match self.track(&response_id, response_timeout).await {
            Ok(pending) => pending,
            Err(e) => {
                // Roll back the first leg so the pair stays all-or-nothing.
                self.cancel(&request_id, Some("bilateral registration failed"))
                    .await;
                return Err(e);
            }
        };

        Ok(BilateralPending { request, response })
    }

    /// Cancel whichever legs of a bilateral exchange are still pending.
    ///
    /// Returns 0, 1 or 2 - one leg may already have resolved.
    pub async fn cancel_bilateral(&self, base_id: &str) -> usize {
        let mut count = 0;
        for suffix in [REQUEST_LEG_SUFFIX, RESPONSE_LEG_SUFFIX] {
            if self
                .cancel(&format!("{base_id}{suffix}"), Some("bilateral cancellation"))
                .await
            {
                count += 1;
            }
        }
        count
    }

    /// Snapshot current pending state.
    pub async fn statistics(&self) -> TrackerStats {
        let inner = self.inner.lock().await;

        if inner.pending.is_empty() {
            return TrackerStats {
                pending: 0,
                average_age_secs: 0.0,
                oldest: None,
                newest: None,
            };
        }

        let ages: Vec<(String, f64)> = inner
            .pending
            .iter()
            .map(|(id, entry)| (id.clone(), entry.created_at.elapsed().as_secs_f64()))
            .collect();

        let total: f64 = ages.iter().map(|(_, age)| age).sum();
        let oldest = ages
            .iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .cloned();
        let newest = ages
            .iter()
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .cloned();

        TrackerStats {
            pending: ages.len(),
            average_age_secs: total / ages.len() as f64,
            oldest,
            newest,
        }
    }

    /// Number of pending requests.
    pub async fn pending_count(&self) -> usize {
        self.inner.lock().await.pending.len()
    }

    /// Cancel everything with a shutdown reason and stop the sweep.
    ///
    /// Further `track` calls reject. Returns how many entries were
    /// cancelled.
    pub async fn shutdown(&self) -> usize {
        let drained: Vec<(String, PendingEntry)> = {
            let mut inner = self.inner.lock().await;
            inner.shutdown = true;
            inner.pending.drain().collect()
        };

        self.sweep_task.abort();

        let count = drained.len();
        for (_, entry) in drained {
            let _ = entry.tx.send(Err(cancellation_error(Some("tracker shutdown"))));
        }
        if count > 0 {
            tracing::debug!(cancelled = count, "tracker shut down with pending requests");
        }
        count
    }

    /// Spawn a timer that fires timeout for `id` after `delay`.
    ///
    /// The timer re-checks the logical timeout on wake: an entry whose
    /// timeout was extended is left for a later timer or the sweep.
    fn spawn_timer(&self, id: String, delay: Duration) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            Self::fire_timeout_if_due(&inner, &id).await;
        });
    }

    async fn fire_timeout_if_due(inner: &Mutex<TrackerInner>, id: &str) {
        let entry = {
            let mut guard = inner.lock().await;
            let due = guard
                .pending
                .get(id)
                .is_some_and(|entry| entry.created_at.elapsed() >= entry.timeout);
            if due {
                guard.pending.remove(id)
            } else {
                None
            }
        };

        if let Some(entry) = entry {
            let _ = entry.tx.send(Err(timeout_error(id, entry.timeout)));
            tracing::debug!(request_id = %id, "pending entry timed out");
        }
    }

    async fn sweep_expired(inner: &Mutex<TrackerInner>) {
        let expired: Vec<(String, PendingEntry)> = {
            let mut guard = inner.lock().await;
            let ids: Vec<String> = guard
                .pending
                .iter()
                .filter(|(_, entry)| entry.created_at.elapsed() >= entry.timeout)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| guard.pending.remove(&id).map(|entry| (id, entry)))
                .collect()
        };

        if expired.is_empty() {
            return;
        }

        tracing::warn!(count = expired.len(), "sweep fired overdue timeouts");
        for (id, entry) in expired {
            let _ = entry.tx.send(Err(timeout_error(&id, entry.timeout)));
        }
    }
}

impl Drop for ResponseTracker {
    fn drop(&mut self) {
        self.sweep_task.abort();
    }
}

fn timeout_error(id: &str, timeout: Duration) -> ProtocolError {
    ProtocolError::new(ErrorCode::RequestTimeout).with_details(format!(
        "no response for '{id}' within {:.3}s",
        timeout.as_secs_f64()
    ))
}

fn cancellation_error(reason: Option<&str>) -> ProtocolError {
    ProtocolError::new(ErrorCode::TrackingError)
        .with_details(reason.unwrap_or("request cancelled"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tracker() -> ResponseTracker {
        ResponseTracker::new(TrackerConfig::default())
    }

    fn assert_timeout_error(result: Result<Option<Value>>) {
        match result {
            Err(JanusError::Protocol(e)) => assert_eq!(e.code, ErrorCode::RequestTimeout.code()),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_track_and_resolve() {
        let tracker = tracker();
        let pending = tracker.track("a", Duration::from_secs(5)).await.unwrap();

        let handled = tracker
            .handle_response(&Response::success("a", Some(json!("ok"))))
            .await;
        assert!(handled);
        assert_eq!(pending.wait().await.unwrap(), Some(json!("ok")));
        assert_eq!(tracker.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_failed_response_rejects_with_its_error() {
        let tracker = tracker();
        let pending = tracker.track("a", Duration::from_secs(5)).await.unwrap();

        let error = ProtocolError::method_not_found("nope");
        tracker
            .handle_response(&Response::failure("a", error.clone()))
            .await;

        match pending.wait().await {
            Err(JanusError::Protocol(e)) => assert_eq!(e, error),
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_response_without_error_payload() {
        let tracker = tracker();
        let pending = tracker.track("a", Duration::from_secs(5)).await.unwrap();

        let mut response = Response::failure("a", ProtocolError::internal_error("x"));
        response.error = None;
        tracker.handle_response(&response).await;

        match pending.wait().await {
            Err(JanusError::Protocol(e)) => {
                assert_eq!(e.code, ErrorCode::InternalError.code())
            }
            other => panic!("expected internal error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let tracker = tracker();
        let _pending = tracker.track("dup", Duration::from_secs(5)).await.unwrap();

        let err = tracker.track("dup", Duration::from_secs(5)).await.unwrap_err();
        assert!(err.to_string().contains("already tracked"));
        assert_eq!(tracker.pending_count().await, 1);
    }

    #[tokio::test]
    async fn test_capacity_limit_and_recovery() {
        let tracker = ResponseTracker::new(TrackerConfig {
            max_pending: 2,
            ..Default::default()
        });

        let _a = tracker.track("a", Duration::from_secs(5)).await.unwrap();
        let _b = tracker.track("b", Duration::from_secs(5)).await.unwrap();

        let err = tracker.track("c", Duration::from_secs(5)).await.unwrap_err();
        assert!(err.to_string().contains("limit exceeded"));

        assert!(tracker.handle_response(&Response::success("a", None)).await);
        assert_eq!(tracker.pending_count().await, 1);

        let _c = tracker.track("c", Duration::from_secs(5)).await.unwrap();
        assert_eq!(tracker.pending_count().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires_and_removes_entry() {
        let tracker = tracker();
        let pending = tracker.track("t", Duration::from_secs(1)).await.unwrap();

        assert_timeout_error(pending.wait().await);
        assert_eq!(tracker.pending_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_response_not_handled() {
        let tracker = tracker();
        let pending = tracker.track("t", Duration::from_millis(10)).await.unwrap();
        assert_timeout_error(pending.wait().await);

        // Response arriving after timeout is silently dropped.
        let handled = tracker
            .handle_response(&Response::success("t", Some(json!(1))))
            .await;
        assert!(!handled);
    }

    #[tokio::test]
    async fn test_unknown_response_not_handled() {
        let tracker = tracker();
        assert!(!tracker.handle_response(&Response::success("ghost", None)).await);
    }

    #[tokio::test]
    async fn test_cancel_rejects_with_reason() {
        let tracker = tracker();
        let pending = tracker.track("c", Duration::from_secs(5)).await.unwrap();

        assert!(tracker.cancel("c", Some("caller went away")).await);
        assert!(!tracker.cancel("c", None).await);

        match pending.wait().await {
            Err(JanusError::Protocol(e)) => {
                assert_eq!(e.code, ErrorCode::TrackingError.code());
                assert_eq!(
                    e.data.unwrap().details.as_deref(),
                    Some("caller went away")
                );
            }
            other => panic!("expected cancellation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_all_returns_count() {
        let tracker = tracker();
        let _a = tracker.track("a", Duration::from_secs(5)).await.unwrap();
        let _b = tracker.track("b", Duration::from_secs(5)).await.unwrap();

        assert_eq!(tracker.cancel_all(Some("reset")).await, 2);
        assert_eq!(tracker.cancel_all(None).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extend_timeout_delays_firing() {
        let tracker = tracker();
        let pending = tracker.track("e", Duration::from_secs(1)).await.unwrap();

        assert!(tracker.extend_timeout("e", Duration::from_secs(2)).await);

        // Original timer fires at 1s but the logical timeout is now 3s;
        // the entry must survive the first timer.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(tracker.pending_count().await, 1);

        assert_timeout_error(pending.wait().await);
        assert_eq!(tracker.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_extend_timeout_unknown_id() {
        let tracker = tracker();
        assert!(!tracker.extend_timeout("nope", Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_bilateral_tracks_both_legs() {
        let tracker = tracker();
        let _pair = tracker
            .track_bilateral("x", Duration::from_secs(5), Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(tracker.pending_count().await, 2);
        assert_eq!(tracker.cancel_bilateral("x").await, 2);
        assert_eq!(tracker.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_bilateral_cancel_counts_remaining_legs() {
        let tracker = tracker();
        let _pair = tracker
            .track_bilateral("x", Duration::from_secs(5), Duration::from_secs(10))
            .await
            .unwrap();

        // One leg resolves; only the other is left to cancel.
        tracker
            .handle_response(&Response::success("x-request", None))
            .await;
        assert_eq!(tracker.cancel_bilateral("x").await, 1);

        // Neither leg exists now.
        assert_eq!(tracker.cancel_bilateral("x").await, 0);
    }

    #[tokio::test]
    async fn test_bilateral_rolls_back_on_duplicate_leg() {
        let tracker = tracker();
        let _existing = tracker
            .track("y-response", Duration::from_secs(5))
            .await
            .unwrap();

        let result = tracker
            .track_bilateral("y", Duration::from_secs(5), Duration::from_secs(5))
            .await;
        assert!(result.is_err());
        // The request leg must not leak.
        assert!(!tracker.cancel("y-request", None).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_statistics() {
        let tracker = tracker();
        let _old = tracker.track("old", Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        let _new = tracker.track("new", Duration::from_secs(60)).await.unwrap();

        let stats = tracker.statistics().await;
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.oldest.as_ref().unwrap().0, "old");
        assert_eq!(stats.newest.as_ref().unwrap().0, "new");
        assert!(stats.average_age_secs >= 1.0);

        let empty = ResponseTracker::new(TrackerConfig::default());
        let stats = empty.statistics().await;
        assert_eq!(stats.pending, 0);
        assert!(stats.oldest.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ages_follow_virtual_time() {
        let tracker = tracker();
        let _pending = tracker.track("v", Duration::from_secs(60)).await.unwrap();

        // Ages must advance with the runtime clock, not the wall clock.
        tokio::time::sleep(Duration::from_secs(10)).await;
        let stats = tracker.statistics().await;
        assert!(stats.average_age_secs >= 10.0);
        assert!(stats.oldest.unwrap().1 >= 10.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_backstop_fires_overdue_entry() {
        let tracker = ResponseTracker::new(TrackerConfig {
            max_pending: 10,
            sweep_interval: Duration::from_secs(1),
        });
        let pending = tracker.track("s", Duration::from_secs(2)).await.unwrap();

        // Extending early reschedules a timer that wakes before the new
        // logical deadline; the sweep must catch the entry afterwards.
        assert!(tracker.extend_timeout("s", Duration::from_secs(3)).await);

        assert_timeout_error(pending.wait().await);
        assert_eq!(tracker.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_everything_and_rejects_track() {
        let tracker = tracker();
        let pending = tracker.track("a", Duration::from_secs(60)).await.unwrap();

        assert_eq!(tracker.shutdown().await, 1);

        match pending.wait().await {
            Err(JanusError::Protocol(e)) => {
                assert_eq!(e.data.unwrap().details.as_deref(), Some("tracker shutdown"))
            }
            other => panic!("expected shutdown cancellation, got {other:?}"),
        }

        let err = tracker.track("b", Duration::from_secs(1)).await.unwrap_err();
        assert!(err.to_string().contains("shut down"));
    }
}
