//! Connection orchestrator.
//!
//! [`Connection`] ties the components together: it owns the life-cycle
//! state machine, runs one background worker that polls the transport on
//! the configured update period, feeds response bodies through the parser
//! and hands flushed batches to the diff engine, then broadcasts the
//! resulting deltas to registered listeners.
//!
//! Life cycle: `NotConnected → Connecting ⇄ Connected → Completed`, with
//! `Closed` reachable from anywhere and absorbing. `Connecting ⇄
//! Connected` may cycle once per poll attempt; everything else is
//! one-way.

use crate::address::FeedAddress;
use crate::error::{FeedError, Result};
use crate::listeners::{ChannelListener, ListenerId, ListenerSet, ProfileListener, ProfileUpdates};
use crate::parser::{ParseEvent, Parser};
use crate::transport::{FetchRequest, FetchResponse, Transport};
use crate::types::{ConnectionState, InstrumentProfile};
use crate::updater::Updater;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

/// Upper bound on one worker wait, so a close is observed promptly even
/// mid-period.
const CLOSE_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Transport and parser collaborators, moved into the worker on start.
struct Io {
    transport: Box<dyn Transport>,
    parser: Box<dyn Parser>,
}

/// Baseline and listeners under one lock, so a flush (update + broadcast)
/// and a listener registration (replay + register) are atomic relative to
/// each other. A joining listener sees either the full pre-flush baseline
/// or the in-flight delta through the normal broadcast, never both, never
/// neither.
struct Core {
    updater: Updater,
    listeners: ListenerSet,
}

struct Inner {
    endpoint: String,
    update_period_ms: AtomicU64,

    state: Mutex<ConnectionState>,
    state_changed: Condvar,

    core: Mutex<Core>,

    /// Last-modified instant accepted on the most recent fully successful
    /// pass. A failed attempt never advances it, so the next conditional
    /// fetch re-requests anything not yet received.
    last_modified: Mutex<Option<SystemTime>>,

    /// Whether the source ever confirmed live-update support. Sticky:
    /// once set it is never cleared, and conditional fetches stop (a live
    /// source pushes changes instead of honoring If-Modified-Since).
    live_supported: AtomicBool,

    shutdown_tx: Sender<()>,
    shutdown_rx: Receiver<()>,
}

/// Client connection to an instrument profile feed.
///
/// Construct with the collaborators, register listeners, then
/// [`start`](Connection::start). Works uniformly for one-shot snapshots
/// (a file, a non-live HTTP resource) and live sources; a live source is
/// detected during negotiation and latches live behavior.
pub struct Connection {
    inner: Arc<Inner>,
    io: Mutex<Option<Io>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    /// Create a connection for `address` using the given collaborators.
    /// Nothing happens until [`start`](Connection::start).
    pub fn new(
        address: FeedAddress,
        transport: impl Transport + 'static,
        parser: impl Parser + 'static,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = bounded(1);
        Self {
            inner: Arc::new(Inner {
                endpoint: address.endpoint,
                update_period_ms: AtomicU64::new(address.update_period.as_millis() as u64),
                state: Mutex::new(ConnectionState::NotConnected),
                state_changed: Condvar::new(),
                core: Mutex::new(Core {
                    updater: Updater::new(),
                    listeners: ListenerSet::new(),
                }),
                last_modified: Mutex::new(None),
                live_supported: AtomicBool::new(false),
                shutdown_tx,
                shutdown_rx,
            }),
            io: Mutex::new(Some(Io {
                transport: Box::new(transport),
                parser: Box::new(parser),
            })),
            worker: Mutex::new(None),
        }
    }

    /// Spawn the background worker and begin polling.
    ///
    /// Legal only once, from `NotConnected`; starting an already-started
    /// (or closed) connection fails with [`FeedError::InvalidState`].
    pub fn start(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if *state != ConnectionState::NotConnected {
                return Err(FeedError::InvalidState {
                    operation: "start",
                    state: *state,
                });
            }
            *state = ConnectionState::Connecting;
            self.inner.state_changed.notify_all();
        }

        // Guarded by the state transition above: only the first start
        // reaches this take.
        let io = self.io.lock().take().expect("collaborators already taken");

        let inner = Arc::clone(&self.inner);
        let handle = thread::Builder::new()
            .name("instrument-feed".to_string())
            .spawn(move || inner.run(io))?;
        *self.worker.lock() = Some(handle);

        tracing::debug!(endpoint = %self.inner.endpoint, "connection started");
        Ok(())
    }

    /// Shut down. Callable from any thread and any state; idempotent.
    ///
    /// Cooperative: in-flight I/O is not aborted, the worker observes the
    /// closed state on its next check and exits. Shutdown latency is
    /// bounded by the transport's own timeout plus one check interval.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Current life-cycle state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    /// Endpoint this connection polls.
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// Whether the source has confirmed live-update support.
    pub fn is_live(&self) -> bool {
        self.inner.live_supported.load(Ordering::Relaxed)
    }

    /// Configured minimum interval between poll attempts.
    pub fn update_period(&self) -> Duration {
        Duration::from_millis(self.inner.update_period_ms.load(Ordering::Relaxed))
    }

    /// Change the update period. Takes effect on the next wait
    /// computation; usable from any thread.
    pub fn set_update_period(&self, period: Duration) {
        self.inner
            .update_period_ms
            .store(period.as_millis() as u64, Ordering::Relaxed);
    }

    /// Register a listener.
    ///
    /// If the baseline is non-empty the listener is synchronously handed
    /// the entire current baseline before this returns, so it never
    /// misses pre-existing entries.
    pub fn add_listener(&self, listener: impl ProfileListener + 'static) -> ListenerId {
        let core = &mut *self.inner.core.lock();
        let baseline = core.updater.snapshot();
        core.listeners.add(Box::new(listener), &baseline)
    }

    /// Deregister a listener. No notification is sent.
    pub fn remove_listener(&self, id: ListenerId) {
        self.inner.core.lock().listeners.remove(id);
    }

    /// Channel subscription: deltas are delivered into a bounded buffer
    /// of `buffer` messages. The replay of a non-empty baseline arrives
    /// as the first message. A subscriber that falls `buffer` deltas
    /// behind is dropped.
    pub fn subscribe(&self, buffer: usize) -> ProfileUpdates {
        let (listener, receiver) = ChannelListener::new(buffer);
        let id = self.add_listener(listener);
        ProfileUpdates::new(id, receiver)
    }

    /// Ordered copy of the current baseline.
    pub fn profiles(&self) -> Vec<InstrumentProfile> {
        self.inner.core.lock().updater.snapshot()
    }

    /// Block until the state satisfies `predicate` or `timeout` elapses.
    /// Returns whether the predicate held.
    pub fn wait_for_state(
        &self,
        timeout: Duration,
        predicate: impl Fn(ConnectionState) -> bool,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        while !predicate(*state) {
            if self
                .inner
                .state_changed
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return predicate(*state);
            }
        }
        true
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Cooperative shutdown; the worker is not joined.
        self.inner.close();
    }
}

impl Inner {
    /// Background worker loop. Runs one download attempt whenever the
    /// elapsed time since the previous attempt start reaches the update
    /// period, and exits once the connection is closed.
    fn run(self: Arc<Self>, mut io: Io) {
        let mut last_attempt: Option<Instant> = None;

        while !self.is_closed() {
            let period = Duration::from_millis(self.update_period_ms.load(Ordering::Relaxed));
            let due = last_attempt.map_or(true, |at| at.elapsed() >= period);

            if due {
                last_attempt = Some(Instant::now());
                if let Err(error) = self.download(&mut io) {
                    // Non-fatal: retry at the next period. No backoff and
                    // no listener notification, matching the feed
                    // protocol's permissive contract.
                    tracing::debug!(endpoint = %self.endpoint, %error, "download attempt failed");
                }
                continue;
            }

            let elapsed = last_attempt.map_or(Duration::ZERO, |at| at.elapsed());
            let wait = period.saturating_sub(elapsed).min(CLOSE_CHECK_INTERVAL);
            match self.shutdown_rx.recv_timeout(wait) {
                Ok(()) => break,
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
            }
        }

        tracing::debug!(endpoint = %self.endpoint, "connection worker exited");
    }

    /// One download attempt, steps end to end: conditional fetch, live
    /// negotiation, parse, flush batches into the diff engine, broadcast
    /// deltas, advance the state machine.
    fn download(&self, io: &mut Io) -> Result<()> {
        // Conditional fetch only until the source confirms live support;
        // a live source signals changes itself.
        let if_modified_since = if self.live_supported.load(Ordering::Relaxed) {
            None
        } else {
            *self.last_modified.lock()
        };

        let request = FetchRequest {
            endpoint: &self.endpoint,
            request_live: true,
            if_modified_since,
        };

        let (live, last_modified, body) = match io.transport.fetch(&request)? {
            FetchResponse::NotModified => {
                tracing::trace!(endpoint = %self.endpoint, "source not modified");
                return Ok(());
            }
            FetchResponse::Stream {
                live,
                last_modified,
                body,
            } => (live, last_modified, body),
        };

        if live && !self.live_supported.swap(true, Ordering::Relaxed) {
            tracing::debug!(endpoint = %self.endpoint, "live updates confirmed");
        }

        if last_modified.is_some() && last_modified == *self.last_modified.lock() {
            // Same snapshot as last pass; nothing to re-process.
            return Ok(());
        }

        self.transition(ConnectionState::Connecting, ConnectionState::Connected);

        let mut session = io.parser.open(body)?;
        let mut buffer: Vec<InstrumentProfile> = Vec::new();

        while let Some(event) = session.next_event()? {
            match event {
                ParseEvent::Profile(profile) => buffer.push(profile),
                ParseEvent::Flush => self.flush(&mut buffer),
                ParseEvent::Complete => {
                    self.flush(&mut buffer);
                    self.complete();
                }
            }
        }

        // End of stream. Static sources may never fire Complete
        // explicitly; synthesize it (idempotent for sources that did).
        self.flush(&mut buffer);
        self.complete();

        // Commit only after a fully successful pass, so a partial failure
        // cannot permanently skip unreceived data.
        *self.last_modified.lock() = last_modified;
        Ok(())
    }

    /// Hand the buffered batch to the diff engine and broadcast the delta
    /// if anything changed. Holds the core lock across both, relative to
    /// which listener registration is atomic.
    fn flush(&self, buffer: &mut Vec<InstrumentProfile>) {
        if buffer.is_empty() {
            return;
        }
        let batch = std::mem::take(buffer);

        let core = &mut *self.core.lock();
        let delta = core.updater.update(batch);
        if !delta.is_empty() {
            tracing::debug!(
                endpoint = %self.endpoint,
                changed = delta.len(),
                baseline = core.updater.len(),
                "profile delta"
            );
            core.listeners.broadcast(&delta);
        }
    }

    /// One full snapshot pass is done.
    fn complete(&self) {
        self.transition(ConnectionState::Connected, ConnectionState::Completed);
    }

    /// Transition `from → to` if currently in `from`; no-op otherwise.
    /// Keeps transitions monotonic: a closed connection stays closed.
    fn transition(&self, from: ConnectionState, to: ConnectionState) {
        let mut state = self.state.lock();
        if *state == from {
            tracing::debug!(endpoint = %self.endpoint, %from, %to, "state transition");
            *state = to;
            self.state_changed.notify_all();
        }
    }

    fn is_closed(&self) -> bool {
        *self.state.lock() == ConnectionState::Closed
    }

    fn close(&self) {
        {
            let mut state = self.state.lock();
            if *state == ConnectionState::Closed {
                return;
            }
            tracing::debug!(endpoint = %self.endpoint, from = %*state, "connection closed");
            *state = ConnectionState::Closed;
            self.state_changed.notify_all();
        }
        // Wake the worker out of its wait. Full buffer means a signal is
        // already pending; either way the worker sees Closed.
        let _ = self.shutdown_tx.try_send(());
    }
}
