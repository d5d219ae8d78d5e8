//! Conduit Pipeline - change propagation for the article collection
//!
//! Consumes the entity store's ordered change log and keeps two downstream
//! views in sync:
//! - per-follower feed rows, materialized by fan-out on article creation
//! - search-index documents, mirrored with version-checked writes
//!
//! Delivery from the log is at-least-once and ordered per key shard only.
//! Correctness rests on idempotent target keys and external versioning at the
//! sink, never on global ordering or locks. Failed items are retried
//! individually up to a bounded attempt count, then escalated to a durable
//! dead-letter sink.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod dead_letter;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod feed;
pub mod retry;
pub mod search;

pub use config::PipelineConfig;
pub use dead_letter::{
    DeadLetterEntry, DeadLetterError, DeadLetterSink, JsonlDeadLetter, MemoryDeadLetter,
};
pub use dispatcher::{BatchOutcome, ChangeDispatcher};
pub use error::PipelineError;
pub use event::{ArticleCreated, SearchEvent};
pub use feed::FeedMaterializer;
pub use retry::{run_with_retries, DeliveryReport, RetryPolicy};
pub use search::SearchSynchronizer;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
