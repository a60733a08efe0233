//! Job queue: stored units of work and the runner that drains them.
//!
//! Jobs live in `JobDb` (redb). `JobRunner` walks the queue one job at a
//! time through the `Dispatcher`, writing `Running` before each dispatch and
//! `Done`/`Failed` after it:
//!
//! ```text
//! ToDo → Running → Done | Failed        reset: * → ToDo
//! ```

pub mod db;
pub mod job;
pub mod runner;

pub use db::{JobDb, JobPage};
pub use job::{Job, JobUpdate};
pub use runner::{JobRunner, ResetHook, RunnerEvent};
