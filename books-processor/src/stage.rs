use async_trait::async_trait;
use books_common::config::PollConfig;
use books_common::queue::QueuePort;
use books_common::record::Record;
use books_common::stage::{acknowledge, CycleReport, Stage, StageError};
use tracing::{error, info, warn};

use crate::rules::eligible_set;

/// Reduces each polled batch of validated listings to the cheapest listing per
/// well-rated seller and sends the survivors downstream as one message.
pub struct ProcessorStage<I, O> {
    /// Listings accepted by the validator.
    inbound: I,
    /// The collector stage's queue.
    outbound: O,
    poll: PollConfig,
    min_rating: f64,
}

impl<I: QueuePort, O: QueuePort> ProcessorStage<I, O> {
    pub fn new(inbound: I, outbound: O, poll: PollConfig, min_rating: f64) -> Self {
        Self {
            inbound,
            outbound,
            poll,
            min_rating,
        }
    }
}

#[async_trait]
impl<I: QueuePort, O: QueuePort> Stage for ProcessorStage<I, O> {
    fn name(&self) -> &'static str {
        "processor"
    }

    /// The batch is acknowledged as a whole, after the eligible set was sent.
    /// If sending fails, every parsed message of the batch is redelivered.
    async fn poll_once(&mut self) -> Result<CycleReport, StageError> {
        let messages = self
            .inbound
            .receive(self.poll.batch_size, self.poll.wait_time.0)
            .await?;
        let mut report = CycleReport::received(messages.len());

        let mut batch = Vec::with_capacity(messages.len());
        let mut receipts = Vec::with_capacity(messages.len());
        for message in messages {
            match serde_json::from_str::<Record>(&message.body) {
                Ok(record) => {
                    batch.push(record);
                    receipts.push(message.receipt);
                }
                Err(error) => {
                    warn!(
                        message_id = %message.message_id,
                        "dropping malformed listing: {}", error
                    );
                    report.malformed += 1;
                    acknowledge(&self.inbound, &message.receipt, &mut report).await;
                }
            }
        }

        if batch.is_empty() {
            return Ok(report);
        }

        let parsed = batch.len();
        let eligible = eligible_set(batch, self.min_rating);
        report.rejected = parsed - eligible.len();

        if eligible.is_empty() {
            info!(parsed, "no eligible listings in batch");
        } else {
            let body = match serde_json::to_string(&eligible) {
                Ok(body) => body,
                Err(error) => {
                    error!("failed to serialize eligible listings: {}", error);
                    report.deferred = parsed;
                    return Ok(report);
                }
            };

            match self.outbound.send(body).await {
                Ok(forwarded_id) => {
                    info!(
                        parsed,
                        eligible = eligible.len(),
                        %forwarded_id,
                        "eligible listings sent to collector"
                    );
                    report.completed = eligible.len();
                }
                Err(error) => {
                    error!(
                        parsed,
                        "failed to send eligible listings, leaving batch for redelivery: {}", error
                    );
                    report.deferred = parsed;
                    return Ok(report);
                }
            }
        }

        for receipt in receipts {
            acknowledge(&self.inbound, &receipt, &mut report).await;
        }

        Ok(report)
    }
}
