//! Lookup Engine - Resolution and Batch Orchestration
//!
//! [`LookupEngine`] resolves one request by strategy; the
//! [`LookupOrchestrator`] resolves a batch concurrently with all-or-nothing
//! failure semantics. Both thread a `CancellationToken` into the cache
//! loader and the data source.

pub mod cached;
pub mod engine;
pub mod live;
pub mod orchestrator;

pub use engine::LookupEngine;
pub use orchestrator::LookupOrchestrator;
