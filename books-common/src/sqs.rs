//! `QueuePort` backed by Amazon SQS.
use std::time;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::config::Region;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::Client as SqsClient;
use tracing::warn;

use crate::config::AwsConfig;
use crate::queue::{QueueError, QueueMessage, QueuePort, QueueResult};

/// SQS hands out at most this many messages per receive call.
pub const MAX_RECEIVE_COUNT: usize = 10;
/// Longest long-poll SQS accepts.
pub const MAX_WAIT_SECONDS: u64 = 20;

/// Build an SQS client for the configured region, optionally against a custom endpoint
/// such as a local SQS emulator.
pub async fn build_client(config: &AwsConfig) -> SqsClient {
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));
    if let Some(endpoint) = &config.sqs_endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }

    SqsClient::new(&loader.load().await)
}

/// Bring a receive request within what SQS accepts: 1..=10 messages, 0..=20 seconds.
fn receive_limits(max_count: usize, wait: time::Duration) -> (i32, i32) {
    let max_count = max_count.clamp(1, MAX_RECEIVE_COUNT) as i32;
    let wait_seconds = wait.as_secs().min(MAX_WAIT_SECONDS) as i32;

    (max_count, wait_seconds)
}

/// One SQS queue, identified by its URL.
#[derive(Clone)]
pub struct SqsQueue {
    client: SqsClient,
    queue_url: String,
}

impl SqsQueue {
    pub fn new(client: SqsClient, queue_url: &str) -> Self {
        Self {
            client,
            queue_url: queue_url.to_owned(),
        }
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

#[async_trait]
impl QueuePort for SqsQueue {
    async fn receive(
        &self,
        max_count: usize,
        wait: time::Duration,
    ) -> QueueResult<Vec<QueueMessage>> {
        let (max_count, wait_seconds) = receive_limits(max_count, wait);

        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_count)
            .wait_time_seconds(wait_seconds)
            .send()
            .await
            .map_err(|error| QueueError::ReceiveError {
                queue: self.queue_url.clone(),
                reason: DisplayErrorContext(&error).to_string(),
            })?;

        let messages = output
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|message| {
                let message_id = message.message_id.unwrap_or_default();
                match message.receipt_handle {
                    Some(receipt) => Some(QueueMessage {
                        message_id,
                        receipt,
                        body: message.body.unwrap_or_default(),
                    }),
                    None => {
                        warn!(
                            queue = %self.queue_url,
                            message_id = %message_id,
                            "skipping message without receipt handle"
                        );
                        None
                    }
                }
            })
            .collect();

        Ok(messages)
    }

    async fn delete(&self, receipt: &str) -> QueueResult<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt)
            .send()
            .await
            .map_err(|error| QueueError::DeleteError {
                queue: self.queue_url.clone(),
                reason: DisplayErrorContext(&error).to_string(),
            })?;

        Ok(())
    }

    async fn send(&self, body: String) -> QueueResult<String> {
        let output = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|error| QueueError::SendError {
                queue: self.queue_url.clone(),
                reason: DisplayErrorContext(&error).to_string(),
            })?;

        Ok(output.message_id.unwrap_or_default())
    }
}
