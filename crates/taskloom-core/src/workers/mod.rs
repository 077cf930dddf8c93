//! Worker pool bookkeeping.

pub mod registry;

pub use registry::{Worker, WorkerLoad, WorkerRegistry};
