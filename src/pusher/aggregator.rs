//! Live aggregator for the pusher dashboard.
//!
//! Every poll round fetches all feeds concurrently. Settles are counted down
//! against a per-round barrier, and only when the last feed of the current
//! generation settles are the round's feeds published, as one snapshot.
//! Settles from superseded generations, or arriving after [`Aggregator::stop`],
//! are dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::ChangesApi;

use super::feed::{Feed, fetch_feed};
use super::merge::{PusherView, merge_rows};
use super::query::PusherQuery;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Shorter periods are raised to this; tokio intervals reject zero.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AggregatorState {
    /// First round in flight, nothing to show yet.
    Initializing,
    Ready,
    /// A later round is in flight; the previous snapshot stays displayed.
    Polling { generation: u64 },
    Stopped,
}

/// All feeds from one completed round.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub generation: u64,
    pub feeds: Vec<Feed>,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub poll_interval: Duration,
    pub phabricator_host: String,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            phabricator_host: String::new(),
        }
    }
}

struct Round {
    generation: u64,
    remaining: usize,
    slots: Vec<Option<Feed>>,
}

struct Inner {
    state: AggregatorState,
    generation: u64,
    round: Option<Round>,
    snapshot: Option<Arc<Snapshot>>,
}

struct Shared {
    api: Arc<dyn ChangesApi>,
    query: PusherQuery,
    alive: AtomicBool,
    inner: Mutex<Inner>,
    published: watch::Sender<Option<Arc<Snapshot>>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Start a new round, superseding any round still in flight.
    fn begin_round(self: &Arc<Self>) {
        if !self.is_alive() {
            return;
        }
        let endpoints = self.query.endpoints();

        let generation = {
            let mut inner = self.lock();
            if inner.state == AggregatorState::Stopped {
                return;
            }
            inner.generation += 1;
            let generation = inner.generation;
            if let Some(stale) = inner.round.as_ref() {
                tracing::debug!(
                    stale = stale.generation,
                    pending = stale.remaining,
                    "superseding unfinished round"
                );
            }
            inner.round = Some(Round {
                generation,
                remaining: endpoints.len(),
                slots: vec![None; endpoints.len()],
            });
            inner.state = if inner.snapshot.is_some() {
                AggregatorState::Polling { generation }
            } else {
                AggregatorState::Initializing
            };
            generation
        };

        tracing::debug!(generation, feeds = endpoints.len(), "starting poll round");
        if endpoints.is_empty() {
            self.apply_if_complete(generation);
            return;
        }

        for (slot, (slug, endpoint)) in endpoints.into_iter().enumerate() {
            let shared = Arc::clone(self);
            tokio::spawn(async move {
                let feed = fetch_feed(shared.api.as_ref(), &slug, &endpoint).await;
                shared.settle(generation, slot, feed);
            });
        }
    }

    fn settle(&self, generation: u64, slot: usize, feed: Feed) {
        if !self.is_alive() {
            tracing::debug!(generation, slug = %feed.slug, "discarding result after stop");
            return;
        }
        {
            let mut inner = self.lock();
            let Some(round) = inner.round.as_mut().filter(|r| r.generation == generation) else {
                tracing::debug!(generation, slug = %feed.slug, "discarding stale result");
                return;
            };
            if let Some(entry) = round.slots.get_mut(slot).filter(|entry| entry.is_none()) {
                *entry = Some(feed);
                round.remaining -= 1;
            }
        }
        self.apply_if_complete(generation);
    }

    fn apply_if_complete(&self, generation: u64) {
        let mut inner = self.lock();
        let complete = inner
            .round
            .as_ref()
            .is_some_and(|r| r.generation == generation && r.remaining == 0);
        if !complete || !self.is_alive() {
            return;
        }
        let Some(round) = inner.round.take() else {
            return;
        };

        let snapshot = Arc::new(Snapshot {
            generation,
            feeds: round.slots.into_iter().flatten().collect(),
            applied_at: Utc::now(),
        });
        inner.snapshot = Some(Arc::clone(&snapshot));
        inner.state = AggregatorState::Ready;
        // Published under the lock so subscribers never observe a snapshot
        // older than the state.
        self.published.send_replace(Some(snapshot));
        tracing::info!(generation, "applied poll round");
    }
}

/// Scheduled task driving periodic rounds.
struct Ticker {
    handle: JoinHandle<()>,
}

impl Ticker {
    fn spawn(shared: Weak<Shared>, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; the initial round is already running.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(strong) = shared.upgrade() else {
                    break;
                };
                if !strong.is_alive() {
                    break;
                }
                strong.begin_round();
            }
        });
        Self { handle }
    }

    fn cancel(self) {
        self.handle.abort();
    }
}

pub struct Aggregator {
    shared: Arc<Shared>,
    config: AggregatorConfig,
    ticker: Mutex<Option<Ticker>>,
}

impl Aggregator {
    pub fn new(api: Arc<dyn ChangesApi>, query: PusherQuery, mut config: AggregatorConfig) -> Self {
        config.poll_interval = config.poll_interval.max(MIN_POLL_INTERVAL);
        let (published, _) = watch::channel(None);
        let shared = Arc::new(Shared {
            api,
            query,
            alive: AtomicBool::new(true),
            inner: Mutex::new(Inner {
                state: AggregatorState::Initializing,
                generation: 0,
                round: None,
                snapshot: None,
            }),
            published,
        });
        Self {
            shared,
            config,
            ticker: Mutex::new(None),
        }
    }

    pub fn query(&self) -> &PusherQuery {
        &self.shared.query
    }

    /// Fetch the initial round and start polling. Calling again while running,
    /// or after [`stop`](Self::stop), does nothing. Needs a tokio runtime.
    pub fn start(&self) {
        if !self.shared.is_alive() {
            return;
        }
        let mut ticker = self.ticker.lock().unwrap_or_else(PoisonError::into_inner);
        if ticker.is_some() {
            return;
        }
        tracing::info!(
            slugs = ?self.shared.query.slugs,
            interval_secs = self.config.poll_interval.as_secs(),
            "starting pusher aggregator"
        );
        self.shared.begin_round();
        *ticker = Some(Ticker::spawn(
            Arc::downgrade(&self.shared),
            self.config.poll_interval,
        ));
    }

    /// Start a round now, outside the timer.
    pub fn poll_now(&self) {
        self.shared.begin_round();
    }

    /// Stop polling. Idempotent; rounds still in flight are never applied.
    pub fn stop(&self) {
        if !self.shared.alive.swap(false, Ordering::AcqRel) {
            return;
        }
        {
            let mut inner = self.shared.lock();
            inner.state = AggregatorState::Stopped;
            inner.round = None;
        }
        if let Some(ticker) = self
            .ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            ticker.cancel();
        }
        tracing::info!("stopped pusher aggregator");
    }

    pub fn state(&self) -> AggregatorState {
        self.shared.lock().state
    }

    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.shared.lock().snapshot.clone()
    }

    /// Feeds of the current round that have not settled yet.
    pub fn pending_feeds(&self) -> usize {
        self.shared
            .lock()
            .round
            .as_ref()
            .map_or(0, |round| round.remaining)
    }

    /// Receives every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.shared.published.subscribe()
    }

    /// Merge the current snapshot into grid rows. `None` until the first
    /// round completes.
    pub fn render(&self) -> Option<PusherView> {
        let snapshot = self.snapshot()?;
        Some(self.render_snapshot(&snapshot))
    }

    /// Merge a snapshot received through [`subscribe`](Self::subscribe).
    pub fn render_snapshot(&self, snapshot: &Snapshot) -> PusherView {
        merge_rows(
            &self.shared.query.slugs,
            &snapshot.feeds,
            &self.config.phabricator_host,
        )
    }
}

impl Drop for Aggregator {
    fn drop(&mut self) {
        self.stop();
    }
}
