pub mod events;
pub mod jobs;
pub mod macros;
pub mod operations;
pub mod recorder;
pub mod runner;
