pub mod loader;
pub mod runner;

pub use loader::{BatchLoader, LoadError, LoadReport};
pub use runner::{Pipeline, PipelineError, RunReport};
