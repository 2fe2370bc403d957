//! Transport-agnostic relay core: the frame pool, group ring, track distributor, and relay
//! handler registry that sit underneath a concrete QUIC/WebTransport session implementation.
//!
//! Everything in here is deliberately blind to the wire protocol. Callers provide an
//! implementation of [`session::Session`] and friends; this crate owns only the fan-out and
//! bookkeeping once frames are already bytes.

pub mod error;
pub mod group;
pub mod mux;
pub mod path;
pub mod pool;
pub mod ring;
pub mod session;
pub mod track;

pub use error::{Error, Result};
pub use group::GroupCache;
pub use mux::{RelayHandler, TrackMux, TRACK_NOT_FOUND};
pub use path::{Path, PathOwned, TrackName};
pub use pool::FramePool;
pub use ring::{GroupRing, GroupSequence, DEFAULT_GROUP_CACHE_SIZE};
pub use session::{Announcement, GroupReader, GroupWriter, Peer, Session, TrackReader, TrackWriter};
pub use track::{Subscription, TrackDistributor, NOTIFY_TIMEOUT};
