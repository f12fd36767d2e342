//! Listener registry for profile update deltas.
//!
//! Listeners receive exactly the profiles that changed in one update
//! pass, never the whole collection. Joining late is safe: a listener
//! added after data has been accepted is synchronously handed the entire
//! current baseline as its first callback, so it never misses
//! pre-existing entries and never races an in-flight flush.
//!
//! Two subscription styles:
//! - Callback: implement [`ProfileListener`] and register it with
//!   [`Connection::add_listener`](crate::Connection::add_listener).
//! - Channel: [`Connection::subscribe`](crate::Connection::subscribe)
//!   returns a [`ProfileUpdates`] handle backed by a bounded channel;
//!   slow consumers are dropped rather than blocking the feed.
//!
//! # Example
//!
//! ```ignore
//! let updates = connection.subscribe(1000);
//! loop {
//!     match updates.recv() {
//!         Ok(delta) => {
//!             for profile in delta {
//!                 println!("{} {}", profile.profile_type, profile.symbol);
//!             }
//!         }
//!         Err(_) => break, // dropped or connection closed
//!     }
//! }
//! ```

mod registry;

pub use registry::{ChannelListener, ListenerId, ListenerSet, ProfileListener, ProfileUpdates};
