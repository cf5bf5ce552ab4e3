use async_trait::async_trait;
use books_common::config::PollConfig;
use books_common::queue::{QueueMessage, QueuePort};
use books_common::stage::{acknowledge, CycleReport, Stage, StageError};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::validation::{parse_listing, validate_listing};

/// Reads raw listings, drops the ones breaking a rule and forwards the rest unchanged.
pub struct ValidatorStage<I, O> {
    /// Raw listings from merchants.
    inbound: I,
    /// The processor stage's queue.
    outbound: O,
    poll: PollConfig,
}

impl<I: QueuePort, O: QueuePort> ValidatorStage<I, O> {
    pub fn new(inbound: I, outbound: O, poll: PollConfig) -> Self {
        Self {
            inbound,
            outbound,
            poll,
        }
    }

    /// Classify one message. It is acknowledged once it was dropped or forwarded;
    /// if forwarding fails it stays on the queue to be validated again.
    async fn handle(&self, message: QueueMessage, report: &mut CycleReport) {
        let listing = match parse_listing(&message.body) {
            Ok(listing) => listing,
            Err(error) => {
                warn!(
                    message_id = %message.message_id,
                    "dropping malformed listing: {}", error
                );
                report.malformed += 1;
                acknowledge(&self.inbound, &message.receipt, report).await;
                return;
            }
        };

        let title = listing
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let errors = validate_listing(&listing);

        if !errors.is_empty() {
            let errors: Vec<String> = errors.iter().map(ToString::to_string).collect();
            warn!(
                message_id = %message.message_id,
                title,
                ?errors,
                "validation failed, dropping listing"
            );
            report.rejected += 1;
            acknowledge(&self.inbound, &message.receipt, report).await;
            return;
        }

        match self.outbound.send(message.body.clone()).await {
            Ok(forwarded_id) => {
                info!(
                    message_id = %message.message_id,
                    %forwarded_id,
                    title,
                    "listing is valid, forwarded to processor"
                );
                report.completed += 1;
                acknowledge(&self.inbound, &message.receipt, report).await;
            }
            Err(error) => {
                error!(
                    message_id = %message.message_id,
                    "failed to forward listing, leaving it for redelivery: {}", error
                );
                report.deferred += 1;
            }
        }
    }
}

#[async_trait]
impl<I: QueuePort, O: QueuePort> Stage for ValidatorStage<I, O> {
    fn name(&self) -> &'static str {
        "validator"
    }

    async fn poll_once(&mut self) -> Result<CycleReport, StageError> {
        let messages = self
            .inbound
            .receive(self.poll.batch_size, self.poll.wait_time.0)
            .await?;
        let mut report = CycleReport::received(messages.len());

        for message in messages {
            self.handle(message, &mut report).await;
        }

        Ok(report)
    }
}
