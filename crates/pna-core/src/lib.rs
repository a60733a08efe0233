pub mod composite;
pub mod config;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod io;
pub mod macro_file;
pub mod paths;
pub mod queue;
pub mod recorder;
pub mod registry;
pub mod types;

pub use error::{PnaError, Result};
