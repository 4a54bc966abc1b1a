mod worker_context;

pub use worker_context::{ContextError, WorkerContext};
