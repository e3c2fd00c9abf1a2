//! Papermill worker
//!
//! Wires the pipeline together and owns the task boundary: the dispatcher
//! maps a new version's declared type to the right converter path, runs it
//! as a detached task, and swallows failures there after logging them.
//! Nothing in this crate ever propagates a pipeline error back to the
//! caller that triggered it.

pub mod dispatch;
pub mod invalidate;
pub mod setup;
pub mod stores;
pub mod telemetry;

pub use dispatch::Dispatcher;
pub use invalidate::CacheInvalidator;
pub use stores::DbMetadataStore;
