//! Running user programs off the interactive context

mod classpath;
mod pipeline;
mod runner;
mod task;

pub use classpath::{ClasspathFilter, RESERVED_ARCHIVES, RESERVED_SEGMENT};
pub use pipeline::{Pipeline, RunState};
pub use runner::{CancelToken, RhaiRunner, Runner, resolve};
pub use task::{ExecutionEvent, ExecutionFailure, ExecutionTask, Outcome, RunOutput, RunRequest};
