//! # Trellis DB Worker
//!
//! Distributed sort-with-pagination for trellis shards.
//!
//! Given a matrix of uid rows and one or more attributes with directions,
//! the engine returns the matrix with each row independently sorted and
//! clipped to its pagination window. Values resolve through the local
//! key-value store; attributes owned by other shards are fetched over the
//! [`WorkerClient`] seam with hedged backup requests.
//!
//! ## Execution
//!
//! Two strategies race under a shared cancellation scope: an index-driven
//! bucket walk and a direct materialize-and-sort pass. The first to finish
//! without error wins; the loser is cancelled. Requests with secondary sort
//! attributes take the index path alone and are extended into lexicographic
//! order by a second fetch pass across shards.
//!
//! ## Example
//!
//! ```ignore
//! use trellis_db_worker::{SortEngine, SortRequest, StaticRouter};
//!
//! let engine = SortEngine::new(catalog, store, router);
//! let req = SortRequest::single("age", false, vec![vec![1, 2, 3]], 0, 10);
//! let sorted = engine.sort_over_network(&cancel, req).await?;
//! ```

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod request;

mod indexed;
mod intersect;
mod unindexed;
mod values;

pub use config::EngineConfig;
pub use dispatch::{ShardRouter, StaticRouter, WorkerClient};
pub use engine::SortEngine;
pub use error::{Result, SortError};
pub use request::{SortRequest, SortResult, ValueMatrix, ValuesRequest};
