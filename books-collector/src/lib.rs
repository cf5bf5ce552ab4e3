pub mod config;
pub mod stage;
pub mod store;
