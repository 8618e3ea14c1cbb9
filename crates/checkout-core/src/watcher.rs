//! Completion Watcher
//!
//! Observes an open [`ProviderHandle`] until the checkout reaches an outcome.
//!
//! Two detection strategies run side by side, depending on what the handle
//! offers:
//!
//! - **Poll-for-closure**: a repeating timer asks the surface whether it has
//!   been closed. Closure alone cannot tell "paid then closed" from "gave up",
//!   so it is only ever reported as [`WatchOutcome::Closed`].
//! - **Event callback**: provider events are mapped straight to an outcome.
//!
//! Events are always checked before the timer, so an event that is already
//! queued when closure is observed wins.

use futures::StreamExt;
use std::future::pending;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::provider::{ProviderEvent, ProviderEventKind, ProviderEventStream, ProviderHandle};

/// Terminal signal produced by the watcher
#[derive(Clone, Debug, PartialEq)]
pub enum WatchOutcome {
    /// Provider reported `checkout.completed`
    Completed(serde_json::Value),

    /// Provider reported `checkout.error`
    Failed(String),

    /// Surface closed (or `checkout.closed`) without a completion event
    Closed,
}

impl WatchOutcome {
    fn from_event(event: ProviderEvent) -> Option<Self> {
        match event.kind() {
            ProviderEventKind::Completed => Some(Self::Completed(event.data)),
            ProviderEventKind::Error => Some(Self::Failed(error_reason(&event.data))),
            ProviderEventKind::Closed => Some(Self::Closed),
            ProviderEventKind::Other => {
                tracing::trace!(event = %event.name, "Ignoring non-terminal provider event");
                None
            }
        }
    }
}

fn error_reason(data: &serde_json::Value) -> String {
    data.pointer("/error/detail")
        .or_else(|| data.get("error"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or("provider reported checkout.error")
        .to_string()
}

/// Handle to a running watch; cancelling it drops the provider handle and timer
#[derive(Debug)]
pub struct WatchGuard {
    task: JoinHandle<()>,
}

impl WatchGuard {
    /// Stop watching without reporting an outcome
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawns watch tasks for provider handles
#[derive(Clone, Copy, Debug, Default)]
pub struct CompletionWatcher;

impl CompletionWatcher {
    pub const fn new() -> Self {
        Self
    }

    /// Observe `handle` on a background task and call `report` once with the
    /// outcome. The handle and any poll timer are released before `report`
    /// runs. If the guard is cancelled first, `report` is never called.
    pub fn watch<F>(&self, handle: ProviderHandle, report: F) -> WatchGuard
    where
        F: FnOnce(WatchOutcome) + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let outcome = Self::observe(handle).await;
            report(outcome);
        });
        WatchGuard { task }
    }

    /// Observe `handle` until an outcome is produced, consuming the handle
    pub async fn observe(mut handle: ProviderHandle) -> WatchOutcome {
        let mut events = handle.take_events();
        let mut ticker = handle.poll_interval().map(|period| {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            if events.is_none() && ticker.is_none() {
                tracing::debug!("Provider event stream ended without an outcome");
                return WatchOutcome::Closed;
            }

            tokio::select! {
                biased;

                event = next_event(&mut events) => match event {
                    Some(event) => {
                        if let Some(outcome) = WatchOutcome::from_event(event) {
                            return outcome;
                        }
                    }
                    None => events = None,
                },

                () = next_tick(&mut ticker) => match handle.surface().is_closed() {
                    Ok(true) => return WatchOutcome::Closed,
                    Ok(false) => {}
                    Err(err) => tracing::trace!(%err, "Ignoring expected surface access error"),
                },
            }
        }
    }
}

async fn next_event(events: &mut Option<ProviderEventStream>) -> Option<ProviderEvent> {
    match events {
        Some(stream) => stream.next().await,
        None => pending().await,
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSurface;
    use futures::channel::mpsc;
    use std::time::Duration;

    const SECOND: Duration = Duration::from_secs(1);

    #[tokio::test(start_paused = true)]
    async fn test_popup_closure_is_reported_as_closed() {
        let surface = MockSurface::new();
        let handle = ProviderHandle::popup(Box::new(surface.clone()), SECOND);

        let closer = surface.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(3500)).await;
            closer.user_close();
        });

        let outcome = CompletionWatcher::observe(handle).await;
        assert_eq!(outcome, WatchOutcome::Closed);
        assert_eq!(surface.polls(), 4);
        assert_eq!(surface.programmatic_closes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cross_origin_errors_are_ignored() {
        let surface = MockSurface::new();
        surface.fail_next_polls(2);
        surface.user_close();

        let outcome = CompletionWatcher::observe(ProviderHandle::popup(Box::new(surface.clone()), SECOND)).await;
        assert_eq!(outcome, WatchOutcome::Closed);
        assert_eq!(surface.polls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_event_wins_over_closure() {
        let surface = MockSurface::new();
        let (tx, rx) = mpsc::unbounded();
        let handle = ProviderHandle::popup(Box::new(surface.clone()), SECOND).with_events(Box::pin(rx));

        tx.unbounded_send(ProviderEvent::new("checkout.completed").with_data(serde_json::json!({"id": "txn_1"})))
            .unwrap();
        surface.user_close();

        let outcome = CompletionWatcher::observe(handle).await;
        assert_eq!(outcome, WatchOutcome::Completed(serde_json::json!({"id": "txn_1"})));
    }

    #[tokio::test]
    async fn test_embedded_events() {
        let cases = [
            (ProviderEvent::new("checkout.closed"), WatchOutcome::Closed),
            (
                ProviderEvent::new("checkout.error").with_data(serde_json::json!({"error": {"detail": "card declined"}})),
                WatchOutcome::Failed("card declined".into()),
            ),
        ];

        for (event, expected) in cases {
            let (tx, rx) = mpsc::unbounded();
            let handle = ProviderHandle::embedded(Box::new(MockSurface::new()), Box::pin(rx));
            tx.unbounded_send(ProviderEvent::new("checkout.loaded")).unwrap();
            tx.unbounded_send(event).unwrap();
            assert_eq!(CompletionWatcher::observe(handle).await, expected);
        }
    }

    #[tokio::test]
    async fn test_ended_event_stream_without_polling_is_closed() {
        let (tx, rx) = mpsc::unbounded::<ProviderEvent>();
        drop(tx);
        let handle = ProviderHandle::embedded(Box::new(MockSurface::new()), Box::pin(rx));
        assert_eq!(CompletionWatcher::observe(handle).await, WatchOutcome::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_after_outcome() {
        let surface = MockSurface::new();
        surface.user_close();
        let (tx, rx) = tokio::sync::oneshot::channel();

        let guard = CompletionWatcher::new().watch(
            ProviderHandle::popup(Box::new(surface.clone()), SECOND),
            move |outcome| {
                let _ = tx.send(outcome);
            },
        );

        assert_eq!(rx.await.unwrap(), WatchOutcome::Closed);
        let polls = surface.polls();
        tokio::time::sleep(SECOND * 10).await;
        assert_eq!(surface.polls(), polls);
        assert!(guard.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_releases_handle_without_report() {
        let surface = MockSurface::new();
        let reported = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = reported.clone();

        let guard = CompletionWatcher::new().watch(
            ProviderHandle::popup(Box::new(surface.clone()), SECOND),
            move |_| flag.store(true, std::sync::atomic::Ordering::SeqCst),
        );

        tokio::time::sleep(SECOND * 2).await;
        guard.cancel();
        tokio::time::sleep(SECOND).await;

        let polls = surface.polls();
        tokio::time::sleep(SECOND * 5).await;
        assert_eq!(surface.polls(), polls);
        assert!(surface.closed());
        assert!(guard.is_finished());
        assert!(!reported.load(std::sync::atomic::Ordering::SeqCst));
    }
}
