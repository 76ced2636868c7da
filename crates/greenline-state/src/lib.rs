//! greenline-state — embedded state store for greenline.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! state management for services, live task specifications, and archived
//! promotion attempts.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Composite keys (`{service}:{revision:08}`) keep a service's task spec
//! revisions contiguous so the latest revision is a prefix scan away.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::{StateStore, epoch_secs};
pub use types::*;
