pub mod types;
pub mod store;
pub mod config;
pub mod error;
pub mod stats;
pub mod events;
