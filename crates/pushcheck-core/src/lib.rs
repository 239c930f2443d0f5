//! # pushcheck-core
//!
//! Core library for pushcheck: the request model and tag sets, the
//! request store port, and the single-worker queue that verifies branches
//! and tests pickmes for merge conflicts against a shared mirror.

pub mod config;
pub mod conflicts;
pub mod error;
pub mod job;
pub mod outcome;
pub mod queue;
pub mod request;
pub mod store;
pub mod tags;
pub mod traits;
pub mod worker;

#[cfg(test)]
mod test_mocks;

pub use config::Config;
pub use error::{Error, Result};
pub use job::{Job, JobKind, JobOptions};
pub use outcome::{Outcome, VerifyFailure};
pub use queue::{GitQueue, JobHandler, JobSender};
pub use request::{Push, PushId, PushRequest, RequestId, RequestState, RequestUpdate, Revision};
pub use store::{JsonFileStore, MemoryStore, Snapshot};
pub use tags::TagSet;
pub use traits::{Notifier, RequestStore};
pub use worker::{JobProcessor, ProcessorSettings};
