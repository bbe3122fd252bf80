//! When to go back to the backend for events.
//!
//! Window changes arrive far more often than fetches are worth making, so
//! they pass through two independent debouncers: a fast one that only
//! updates the shareable location, and a slow one that decides whether the
//! backend has to be asked again. A fetch is skipped when the new window is
//! within a small drift of the last one served for the same query.

use std::time::Duration;

use iced::Task;
use iced::task;

use crate::location::Location;
use crate::timeline::{Event, TimeWindow};

/// Quiet period before the location follows the window.
pub const LOCATION_DEBOUNCE: Duration = Duration::from_millis(100);
/// Quiet period before a fetch is considered.
pub const FETCH_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Drift below the served window's duration divided by this is ignored.
const TOLERANCE_DIVISOR: f64 = 40.0;
/// The requested window's duration divided by this is prefetched on each side.
const PREFETCH_DIVISOR: f64 = 4.0;

/// Current wall-clock time in epoch seconds.
pub fn now() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// A cancellable delayed task. Scheduling again replaces (and aborts) the
/// pending one, so only the last call in a burst ever fires.
pub struct Debouncer {
    delay: Duration,
    token: u64,
    handle: Option<task::Handle>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            token: 0,
            handle: None,
        }
    }

    /// Restart the timer. `on_due` builds the message delivered when it
    /// expires; pass its token back to [`Debouncer::fire`].
    pub fn schedule<M>(&mut self, on_due: impl FnOnce(u64) -> M + Send + 'static) -> Task<M>
    where
        M: Send + 'static,
    {
        self.token += 1;
        let token = self.token;
        let delay = self.delay;
        let (task, handle) =
            Task::perform(async move { tokio::time::sleep(delay).await }, move |()| {
                on_due(token)
            })
            .abortable();
        // Dropping the previous handle aborts its timer.
        self.handle = Some(handle.abort_on_drop());
        task
    }

    /// Accept an expiry. Tokens of superseded timers are refused.
    pub fn fire(&mut self, token: u64) -> bool {
        if self.handle.is_none() || token != self.token {
            return false;
        }
        self.handle = None;
        true
    }
}

/// Identity of a served fetch, compared with drift tolerance.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchKey {
    pub window: TimeWindow,
    pub query: String,
}

impl FetchKey {
    pub fn tolerance(&self) -> f64 {
        self.window.duration() / TOLERANCE_DIVISOR
    }

    /// Whether a request for `window` and `query` would be served by this key.
    pub fn matches(&self, window: TimeWindow, query: &str) -> bool {
        let tolerance = self.tolerance();
        query == self.query
            && (window.start - self.window.start).abs() < tolerance
            && (window.stop - self.window.stop).abs() < tolerance
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub seq: u64,
    /// What was asked for; becomes the last served key on success.
    pub key: FetchKey,
    /// What is actually fetched: the key's window plus a prefetch margin.
    pub fetch_window: TimeWindow,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Current data already covers the request.
    Skip,
    /// A fetch or flush is in flight; the request is retried when it ends.
    Deferred,
    Fetch(FetchRequest),
}

#[derive(Debug, Default)]
pub struct Completion {
    /// Replacement event set, if the response is to be applied.
    pub events: Option<Vec<Event>>,
    /// A request that arrived while loading and should now be planned.
    pub follow_up: Option<(TimeWindow, String)>,
}

#[derive(Debug, Clone, PartialEq)]
struct PendingFetch {
    window: TimeWindow,
    query: String,
    force: bool,
}

pub struct DataSync {
    last_served: Option<FetchKey>,
    /// Sequence number of the newest request still in flight.
    outstanding: Option<u64>,
    flushing: bool,
    next_seq: u64,
    /// Responses with a sequence number at or below this are stale.
    newest_applied: u64,
    deferred: Option<(TimeWindow, String)>,
    pending_fetch: Option<PendingFetch>,
    pending_location: Option<Location>,
    fetch_debounce: Debouncer,
    location_debounce: Debouncer,
}

impl Default for DataSync {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSync {
    pub fn new() -> Self {
        Self {
            last_served: None,
            outstanding: None,
            flushing: false,
            next_seq: 0,
            newest_applied: 0,
            deferred: None,
            pending_fetch: None,
            pending_location: None,
            fetch_debounce: Debouncer::new(FETCH_DEBOUNCE),
            location_debounce: Debouncer::new(LOCATION_DEBOUNCE),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.outstanding.is_some() || self.flushing
    }

    /// Decide what to do about a request for `window` with `query`.
    pub fn plan(&mut self, window: TimeWindow, query: &str, force: bool) -> Plan {
        if !force && self.is_loading() {
            tracing::debug!(start = window.start, stop = window.stop, "fetch deferred");
            self.deferred = Some((window, query.to_string()));
            return Plan::Deferred;
        }

        if !force
            && self
                .last_served
                .as_ref()
                .is_some_and(|key| key.matches(window, query))
        {
            return Plan::Skip;
        }

        self.next_seq += 1;
        self.outstanding = Some(self.next_seq);
        self.deferred = None;

        let margin = window.duration() / PREFETCH_DIVISOR;
        let request = FetchRequest {
            seq: self.next_seq,
            key: FetchKey {
                window,
                query: query.to_string(),
            },
            fetch_window: TimeWindow {
                start: window.start - margin,
                stop: window.stop + margin,
            },
            force,
        };
        tracing::debug!(
            seq = request.seq,
            from = request.fetch_window.start,
            to = request.fetch_window.stop,
            query = %request.key.query,
            force,
            "fetch issued"
        );
        Plan::Fetch(request)
    }

    /// Account for a finished fetch.
    pub fn complete(
        &mut self,
        request: &FetchRequest,
        result: Result<Vec<Event>, String>,
    ) -> Completion {
        if self.outstanding == Some(request.seq) {
            self.outstanding = None;
        }

        let mut completion = Completion::default();
        match result {
            Ok(events) if request.seq > self.newest_applied => {
                self.newest_applied = request.seq;
                self.last_served = Some(request.key.clone());
                completion.events = Some(events);
            }
            Ok(_) => {
                tracing::debug!(seq = request.seq, "discarding stale response");
            }
            Err(error) => {
                tracing::error!(
                    seq = request.seq,
                    start = request.key.window.start,
                    stop = request.key.window.stop,
                    query = %request.key.query,
                    %error,
                    "failed to load events"
                );
            }
        }

        if self.outstanding.is_none() {
            completion.follow_up = self.deferred.take();
        }
        completion
    }

    /// Forget what was served and drop responses already in flight.
    pub fn invalidate(&mut self) {
        self.last_served = None;
        self.newest_applied = self.next_seq;
        self.deferred = None;
    }

    /// Start a flush unless something is already loading.
    pub fn begin_flush(&mut self) -> bool {
        if self.is_loading() {
            return false;
        }
        self.flushing = true;
        true
    }

    /// End a flush. Returns the request deferred while it ran, if no fetch
    /// is in flight to pick it up.
    pub fn finish_flush(&mut self) -> Option<(TimeWindow, String)> {
        self.flushing = false;
        if self.outstanding.is_some() {
            return None;
        }
        self.deferred.take()
    }

    /// Queue a fetch decision for after the slow quiet period. Calls in one
    /// burst keep the latest window and query, and force if any of them did.
    pub fn schedule_fetch<M>(
        &mut self,
        window: TimeWindow,
        query: &str,
        force: bool,
        on_due: impl FnOnce(u64) -> M + Send + 'static,
    ) -> Task<M>
    where
        M: Send + 'static,
    {
        let force = force || self.pending_fetch.as_ref().is_some_and(|p| p.force);
        self.pending_fetch = Some(PendingFetch {
            window,
            query: query.to_string(),
            force,
        });
        self.fetch_debounce.schedule(on_due)
    }

    /// The queued fetch, if `token` belongs to the live timer.
    pub fn fetch_due(&mut self, token: u64) -> Option<(TimeWindow, String, bool)> {
        if !self.fetch_debounce.fire(token) {
            return None;
        }
        self.pending_fetch
            .take()
            .map(|pending| (pending.window, pending.query, pending.force))
    }

    pub fn schedule_location<M>(
        &mut self,
        location: Location,
        on_due: impl FnOnce(u64) -> M + Send + 'static,
    ) -> Task<M>
    where
        M: Send + 'static,
    {
        self.pending_location = Some(location);
        self.location_debounce.schedule(on_due)
    }

    pub fn location_due(&mut self, token: u64) -> Option<Location> {
        if !self.location_debounce.fire(token) {
            return None;
        }
        self.pending_location.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::EventKind;

    fn window(start: f64, stop: f64) -> TimeWindow {
        TimeWindow { start, stop }
    }

    fn event(id: &str) -> Event {
        Event {
            id: id.to_string(),
            group: "A".to_string(),
            kind: EventKind::Single,
            modifier: "DQL".to_string(),
            start: 1000.0,
            stop: 1001.0,
            flagged: false,
        }
    }

    fn fetch(sync: &mut DataSync, w: TimeWindow, query: &str, force: bool) -> FetchRequest {
        match sync.plan(w, query, force) {
            Plan::Fetch(request) => request,
            other => panic!("expected a fetch, got {other:?}"),
        }
    }

    fn served(start: f64, stop: f64) -> DataSync {
        let mut sync = DataSync::new();
        let request = fetch(&mut sync, window(start, stop), "", false);
        sync.complete(&request, Ok(vec![event("a")]));
        sync
    }

    #[test]
    fn small_drift_is_skipped() {
        let mut sync = served(1000.0, 1100.0);
        assert_eq!(sync.last_served.as_ref().map(FetchKey::tolerance), Some(2.5));
        assert_eq!(sync.plan(window(1001.0, 1099.0), "", false), Plan::Skip);
    }

    #[test]
    fn large_drift_fetches() {
        let mut sync = served(1000.0, 1100.0);
        assert!(matches!(
            sync.plan(window(1010.0, 1095.0), "", false),
            Plan::Fetch(_)
        ));
    }

    #[test]
    fn query_change_always_fetches() {
        let mut sync = served(1000.0, 1100.0);
        assert!(matches!(
            sync.plan(window(1000.0, 1100.0), "select", false),
            Plan::Fetch(_)
        ));
    }

    #[test]
    fn force_fetches_identical_window() {
        let mut sync = served(1000.0, 1100.0);
        let request = fetch(&mut sync, window(1000.0, 1100.0), "", true);
        assert!(request.force);
    }

    #[test]
    fn fetch_window_has_prefetch_margin() {
        let mut sync = DataSync::new();
        let request = fetch(&mut sync, window(1000.0, 1100.0), "", false);
        assert_eq!(request.fetch_window, window(975.0, 1125.0));
        assert_eq!(request.key.window, window(1000.0, 1100.0));
        assert!(sync.is_loading());
    }

    #[test]
    fn failure_keeps_previous_state() {
        let mut sync = served(1000.0, 1100.0);
        let request = fetch(&mut sync, window(2000.0, 2100.0), "", false);
        let completion = sync.complete(&request, Err("connection refused".to_string()));
        assert!(completion.events.is_none());
        assert!(!sync.is_loading());
        assert_eq!(sync.last_served.as_ref().map(|k| k.window), Some(window(1000.0, 1100.0)));
    }

    #[test]
    fn stale_responses_are_discarded() {
        let mut sync = DataSync::new();
        let first = fetch(&mut sync, window(1000.0, 1100.0), "", true);
        let second = fetch(&mut sync, window(2000.0, 2100.0), "", true);

        let newer = sync.complete(&second, Ok(vec![event("new")]));
        assert_eq!(newer.events.map(|e| e.len()), Some(1));
        assert!(!sync.is_loading());

        let older = sync.complete(&first, Ok(vec![event("old")]));
        assert!(older.events.is_none());
        assert_eq!(sync.last_served.as_ref().map(|k| k.window), Some(window(2000.0, 2100.0)));
    }

    #[test]
    fn request_during_load_is_deferred() {
        let mut sync = DataSync::new();
        let request = fetch(&mut sync, window(1000.0, 1100.0), "", false);
        assert_eq!(sync.plan(window(3000.0, 3100.0), "q", false), Plan::Deferred);

        let completion = sync.complete(&request, Ok(Vec::new()));
        assert_eq!(completion.follow_up, Some((window(3000.0, 3100.0), "q".to_string())));
        assert!(matches!(
            sync.plan(window(3000.0, 3100.0), "q", false),
            Plan::Fetch(_)
        ));
    }

    #[test]
    fn invalidate_refetches_and_drops_in_flight() {
        let mut sync = served(1000.0, 1100.0);
        let in_flight = fetch(&mut sync, window(1000.0, 1100.0), "", true);
        sync.invalidate();
        assert!(sync.last_served.as_ref().is_none());
        assert!(sync.complete(&in_flight, Ok(vec![event("old")])).events.is_none());
        assert!(matches!(
            sync.plan(window(1000.0, 1100.0), "", false),
            Plan::Fetch(_)
        ));
    }

    #[test]
    fn flush_is_ignored_while_loading() {
        let mut sync = DataSync::new();
        let _request = fetch(&mut sync, window(1000.0, 1100.0), "", false);
        assert!(!sync.begin_flush());

        let mut idle = DataSync::new();
        assert!(idle.begin_flush());
        assert!(idle.is_loading());
        assert!(!idle.begin_flush());
        assert_eq!(idle.finish_flush(), None);
        assert!(!idle.is_loading());
    }

    #[test]
    fn request_during_flush_is_deferred() {
        let mut sync = served(1000.0, 1100.0);
        assert!(sync.begin_flush());
        assert_eq!(sync.plan(window(3000.0, 3100.0), "", false), Plan::Deferred);
        assert!(matches!(
            sync.plan(window(3000.0, 3100.0), "", true),
            Plan::Fetch(_)
        ));

        let mut sync = served(1000.0, 1100.0);
        assert!(sync.begin_flush());
        assert_eq!(sync.plan(window(3000.0, 3100.0), "q", false), Plan::Deferred);
        assert_eq!(sync.finish_flush(), Some((window(3000.0, 3100.0), "q".to_string())));
        assert!(matches!(
            sync.plan(window(3000.0, 3100.0), "q", false),
            Plan::Fetch(_)
        ));
    }

    #[test]
    fn debouncer_only_fires_latest() {
        let mut debouncer = Debouncer::new(FETCH_DEBOUNCE);
        let mut tokens = Vec::new();
        for _ in 0..3 {
            let _task = debouncer.schedule(|token| token);
            tokens.push(debouncer.token);
        }
        assert!(!debouncer.fire(tokens[0]));
        assert!(!debouncer.fire(tokens[1]));
        assert!(debouncer.fire(tokens[2]));
        assert!(!debouncer.fire(tokens[2]));
    }

    #[test]
    fn coalesced_fetches_keep_force() {
        let mut sync = DataSync::new();
        let _task = sync.schedule_fetch(window(0.0, 10.0), "", true, |token| token);
        let _task = sync.schedule_fetch(window(5.0, 15.0), "q", false, |token| token);
        let token = sync.fetch_debounce.token;
        assert_eq!(
            sync.fetch_due(token),
            Some((window(5.0, 15.0), "q".to_string(), true))
        );
        assert_eq!(sync.fetch_due(token), None);
    }

    #[test]
    fn location_debounce_is_independent() {
        let mut sync = DataSync::new();
        let location = Location {
            window: window(0.0, 10.0),
            selected: None,
        };
        let _fetch = sync.schedule_fetch(window(0.0, 10.0), "", false, |token| token);
        let _location = sync.schedule_location(location.clone(), |token| token);
        let token = sync.location_debounce.token;
        assert_eq!(sync.location_due(token), Some(location));
        assert!(sync.fetch_debounce.handle.is_some());
    }
}
