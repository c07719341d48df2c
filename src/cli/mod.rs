pub mod config;
pub mod query;
pub mod run;
