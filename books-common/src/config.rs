use std::str::FromStr;
use std::time;

use envconfig::Envconfig;

use crate::retry::RetryPolicy;

/// How a stage polls its inbound queue.
#[derive(Envconfig, Clone, Debug)]
pub struct PollConfig {
    #[envconfig(from = "BATCH_SIZE", default = "10")]
    pub batch_size: usize,

    #[envconfig(from = "POLL_WAIT_MS", default = "10000")]
    pub wait_time: EnvMsDuration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            wait_time: EnvMsDuration(time::Duration::from_secs(10)),
        }
    }
}

#[derive(Envconfig, Clone, Debug)]
pub struct AwsConfig {
    #[envconfig(from = "AWS_REGION", default = "us-east-1")]
    pub region: String,

    /// Point the SQS client somewhere other than AWS, e.g. a local emulator.
    #[envconfig(from = "SQS_ENDPOINT_URL")]
    pub sqs_endpoint_url: Option<String>,
}

#[derive(Envconfig, Clone, Debug)]
pub struct RetryPolicyConfig {
    #[envconfig(from = "RETRY_BACKOFF_COEFFICIENT", default = "2")]
    pub backoff_coefficient: u32,

    #[envconfig(from = "RETRY_INITIAL_INTERVAL_MS", default = "1000")]
    pub initial_interval: EnvMsDuration,

    #[envconfig(from = "RETRY_MAXIMUM_INTERVAL_MS", default = "30000")]
    pub maximum_interval: EnvMsDuration,
}

impl RetryPolicyConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.backoff_coefficient,
            self.initial_interval.0,
            Some(self.maximum_interval.0),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyString(pub String);

impl NonEmptyString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct StringIsEmptyError;

impl FromStr for NonEmptyString {
    type Err = StringIsEmptyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            Err(StringIsEmptyError)
        } else {
            Ok(NonEmptyString(s.to_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_ms_duration() {
        assert_eq!(
            "1500".parse::<EnvMsDuration>(),
            Ok(EnvMsDuration(time::Duration::from_millis(1500)))
        );
        assert_eq!(
            "soon".parse::<EnvMsDuration>(),
            Err(ParseEnvMsDurationError)
        );
    }

    #[test]
    fn test_non_empty_string() {
        assert_eq!(
            "https://sqs.us-east-1.amazonaws.com/1/books"
                .parse::<NonEmptyString>()
                .unwrap()
                .as_str(),
            "https://sqs.us-east-1.amazonaws.com/1/books"
        );
        assert_eq!("  ".parse::<NonEmptyString>(), Err(StringIsEmptyError));
    }

    #[test]
    fn test_poll_config_defaults_from_env() {
        let config = PollConfig::init_from_hashmap(&Default::default()).unwrap();

        assert_eq!(config.batch_size, PollConfig::default().batch_size);
        assert_eq!(config.wait_time, PollConfig::default().wait_time);
    }
}
