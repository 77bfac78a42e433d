pub mod types;
pub mod coordinator;
pub mod config;
pub mod error;
pub mod stats;
