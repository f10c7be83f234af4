//! Session registry for broadcast fan-out
//!
//! The registry tracks which sessions and streams are currently alive. The
//! accept loop registers sessions, completion watchers prune them, and the
//! scheduler's fan-out path iterates a point-in-time snapshot.
//!
//! # Architecture
//!
//! ```text
//!                      Arc<SessionRegistry<S>>
//!                  ┌─────────────────────────────┐
//!                  │ sessions: HashMap<          │
//!                  │   SessionId,                │
//!                  │   SessionEntry {            │
//!                  │     session: S,             │
//!                  │     phase,                  │
//!                  │     streams: HashMap<_, _>, │
//!                  │   }                         │
//!                  │ >                           │
//!                  └──────────────┬──────────────┘
//!                                 │
//!          ┌──────────────────────┼──────────────────────┐
//!          │                      │                      │
//!          ▼                      ▼                      ▼
//!     [AcceptLoop]         [closed watchers]        [Broadcaster]
//!     add_session()        remove_session()         snapshot()
//!     add_stream()         remove_stream()          (then prune
//!                                                    failed writes)
//! ```
//!
//! # Snapshot-then-mutate
//!
//! The fan-out path never iterates live mutable state: it takes an
//! immutable snapshot (cloned handles), walks it writing to every stream,
//! and applies removal decisions afterwards. This stands in for a lock
//! that would otherwise be held across every stream write.

pub mod entry;
pub mod store;

pub use entry::{SessionPhase, SessionSnapshot};
pub use store::{SessionId, SessionRegistry, StreamId};
