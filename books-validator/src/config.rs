use books_common::config::{AwsConfig, EnvMsDuration, NonEmptyString, PollConfig, RetryPolicyConfig};
use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "3401")]
    pub port: u16,

    /// Where raw listings arrive.
    #[envconfig(from = "VALIDATOR_QUEUE_URL")]
    pub validator_queue_url: NonEmptyString,

    /// Where valid listings are forwarded.
    #[envconfig(from = "PROCESSOR_QUEUE_URL")]
    pub processor_queue_url: NonEmptyString,

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
