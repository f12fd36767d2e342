//! Listener set and subscription handles.

use crate::types::InstrumentProfile;
use crossbeam_channel::{bounded, Receiver, Sender};

/// Callback for profile update deltas.
///
/// Invoked from the connection's background worker, in registration
/// order, with exactly the profiles that changed. The callback should
/// return quickly; long work belongs on the consumer's own thread (or
/// use a channel subscription instead).
pub trait ProfileListener: Send {
    /// Called once per non-empty delta.
    fn profiles_updated(&mut self, profiles: &[InstrumentProfile]);

    /// Whether this listener can still receive deltas. Entries that
    /// report `false` are dropped after the next broadcast.
    fn is_alive(&self) -> bool {
        true
    }
}

impl<F: FnMut(&[InstrumentProfile]) + Send> ProfileListener for F {
    fn profiles_updated(&mut self, profiles: &[InstrumentProfile]) {
        self(profiles)
    }
}

/// Unique identifier for a registered listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

struct Entry {
    id: ListenerId,
    listener: Box<dyn ProfileListener>,
}

/// Registration-ordered set of listeners.
///
/// Carries no lock of its own: the owning connection keeps it under the
/// same mutex as the diff engine, which makes "replay baseline + register"
/// atomic with respect to a concurrent flush broadcast.
pub struct ListenerSet {
    entries: Vec<Entry>,
    next_id: u64,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }

    /// Register a listener, replaying `baseline` to it first when
    /// non-empty. The replay is synchronous: by the time this returns the
    /// listener has seen every pre-existing entry exactly once.
    pub fn add(
        &mut self,
        mut listener: Box<dyn ProfileListener>,
        baseline: &[InstrumentProfile],
    ) -> ListenerId {
        if !baseline.is_empty() {
            listener.profiles_updated(baseline);
        }
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry { id, listener });
        id
    }

    /// Deregister. No notification is sent. Unknown ids are ignored.
    pub fn remove(&mut self, id: ListenerId) {
        self.entries.retain(|entry| entry.id != id);
    }

    /// Deliver a non-empty delta to every listener in registration order,
    /// then prune entries that can no longer receive.
    pub fn broadcast(&mut self, delta: &[InstrumentProfile]) {
        debug_assert!(!delta.is_empty());
        for entry in &mut self.entries {
            entry.listener.profiles_updated(delta);
        }
        self.entries.retain(|entry| entry.listener.is_alive());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ListenerSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Listener that forwards deltas into a bounded channel.
///
/// A full buffer or a dropped receiver marks the listener dead; it is
/// pruned after the broadcast instead of blocking the feed (slow
/// consumers are dropped, not waited for).
pub struct ChannelListener {
    sender: Sender<Vec<InstrumentProfile>>,
    dead: bool,
}

impl ChannelListener {
    /// Create the listener and its matching receiver handle.
    pub fn new(buffer: usize) -> (Self, Receiver<Vec<InstrumentProfile>>) {
        let (sender, receiver) = bounded(buffer);
        (
            Self {
                sender,
                dead: false,
            },
            receiver,
        )
    }
}

impl ProfileListener for ChannelListener {
    fn profiles_updated(&mut self, profiles: &[InstrumentProfile]) {
        if self.dead {
            return;
        }
        if self.sender.try_send(profiles.to_vec()).is_err() {
            self.dead = true;
        }
    }

    fn is_alive(&self) -> bool {
        !self.dead
    }
}

/// Handle for receiving deltas from a channel subscription.
pub struct ProfileUpdates {
    pub id: ListenerId,
    receiver: Receiver<Vec<InstrumentProfile>>,
}

impl ProfileUpdates {
    pub(crate) fn new(id: ListenerId, receiver: Receiver<Vec<InstrumentProfile>>) -> Self {
        Self { id, receiver }
    }

    /// Receive the next delta (blocking).
    pub fn recv(&self) -> Result<Vec<InstrumentProfile>, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a delta (non-blocking).
    pub fn try_recv(&self) -> Result<Vec<InstrumentProfile>, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<Vec<InstrumentProfile>, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}
