use books_common::config::{AwsConfig, EnvMsDuration, NonEmptyString, PollConfig, RetryPolicyConfig};
use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "3402")]
    pub port: u16,

    /// Where validated listings arrive.
    #[envconfig(from = "PROCESSOR_QUEUE_URL")]
    pub processor_queue_url: NonEmptyString,

    /// Where each batch's eligible listings are sent.
    #[envconfig(from = "COLLECTOR_QUEUE_URL")]
    pub collector_queue_url: NonEmptyString,

    /// Listings from sellers rated below this are dropped.
    #[envconfig(from = "MIN_SELLER_RATING", default = "1.0")]
    pub min_seller_rating: f64,

    #[envconfig(from = "LIVENESS_DEADLINE_MS", default = "60000")]
    pub liveness_deadline: EnvMsDuration,

    #[envconfig(nested = true)]
    pub poll: PollConfig,

    #[envconfig(nested = true)]
    pub aws: AwsConfig,

    #[envconfig(nested = true)]
    pub retry_policy: RetryPolicyConfig,
}

impl Config {
    /// Produce a host:port address for binding a TcpListener.
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
