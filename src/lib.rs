//! Core of a minimal real-time collaborative text editor: a shared
//! line-oriented document, per-client cursors, the wire snapshot codec, the
//! document handler, and the TCP server that ties them together.
//!
//! The terminal front-end and CLI entry points live in `src/bin/` as thin
//! wrappers over this library.

pub mod document;
pub mod error;
pub mod handler;
pub mod server;
pub mod snapshot;

pub use document::{Cursor, Document};
pub use error::{CollabError, Result};
pub use handler::DocumentHandler;
pub use snapshot::{CursorEntry, Snapshot};

/// The port both the server and the client default to.
pub const DEFAULT_PORT: u16 = 6969;

/// Size of the read buffer a client uses for one snapshot. The protocol has
/// no length prefix, so this must be large enough to hold a whole snapshot
/// in one read (see the snapshot-framing design note).
pub const SNAPSHOT_BUFFER_SIZE: usize = 10_000;
