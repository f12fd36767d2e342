//! # Instrument Feed
//!
//! A client-side, continuously-correct view of a remote instrument
//! profile collection. The connection polls a source, diffs each
//! delivered snapshot against the accepted baseline and notifies
//! listeners only of the *changes*, never the whole collection.
//!
//! ## Core Concepts
//!
//! - **Profiles**: Keyed, typed records; a `REMOVED` type is a tombstone
//! - **Baseline**: The currently-held, display-ordered profile set
//! - **Deltas**: The minimal added/updated/removed set per update pass
//! - **Live mode**: Sources that push changes over a held-open poll are
//!   detected during negotiation and latched
//!
//! ## Example
//!
//! ```ignore
//! use instrument_feed::{Connection, FeedAddress, FileTransport, JsonLineParser};
//!
//! let address = FeedAddress::parse("/var/feed/profiles.feed[update=PT30S]")?;
//! let connection = Connection::new(address, FileTransport, JsonLineParser);
//!
//! let updates = connection.subscribe(1000);
//! connection.start()?;
//!
//! while let Ok(delta) = updates.recv() {
//!     for profile in delta {
//!         println!("{} {}", profile.profile_type, profile.symbol);
//!     }
//! }
//! ```

pub mod address;
pub mod connection;
pub mod error;
pub mod listeners;
pub mod parser;
pub mod transport;
pub mod types;
pub mod updater;

// Re-exports
pub use address::{FeedAddress, DEFAULT_UPDATE_PERIOD};
pub use connection::Connection;
pub use error::{FeedError, Result};
pub use listeners::{ListenerId, ProfileListener, ProfileUpdates};
pub use parser::{JsonLineParser, ParseEvent, ParseSession, Parser};
pub use transport::{FetchRequest, FetchResponse, FileTransport, Transport};
pub use types::{ConnectionState, InstrumentProfile, ProfileKey, REMOVED_TYPE};
pub use updater::Updater;
