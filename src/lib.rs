pub mod cli;
pub mod config;
pub mod graph;
pub mod logging;
pub mod providers;
pub mod repair;
pub mod report;
pub mod validate;
