pub mod config;
pub mod metrics;
pub mod queue;
pub mod record;
pub mod retry;
pub mod sqs;
pub mod stage;
