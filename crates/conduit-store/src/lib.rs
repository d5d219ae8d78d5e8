//! Conduit Store - entity-store capability interfaces
//!
//! The entity store itself is an external managed service; this crate defines
//! the seams the rest of the system consumes it through:
//! - the ordered, durable change log of article mutations
//! - point read/write traits per collection, scoped by capability grants
//! - opaque pagination cursors for high-fan-out queries
//!
//! `MemoryStore` is the in-process reference implementation used by the worker
//! demo and the integration tests. It persists slug guard rows in the article
//! collection the same way the production store does, so the change log
//! carries the auxiliary records the dispatcher must filter out.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod change;
pub mod cursor;
pub mod error;
pub mod memory;
pub mod traits;

pub use change::{ChangeKind, ChangeRecord, SequenceNumber, StoreKey};
pub use cursor::PageCursor;
pub use error::StoreError;
pub use memory::{MemoryStore, StoreHandle};
pub use traits::{ArticleStore, ChangeLogSource, FeedPage, FeedStore, FollowStore, FollowerPage};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
