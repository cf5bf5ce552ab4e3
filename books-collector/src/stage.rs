use async_trait::async_trait;
use books_common::config::PollConfig;
use books_common::queue::{QueueMessage, QueuePort};
use books_common::record::Record;
use books_common::stage::{acknowledge, CycleReport, Stage, StageError};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::store::RecordStore;

/// Read the records carried by one message. Bodies are JSON arrays of records;
/// a single record object from older producers is read as a one-element array.
pub fn parse_batch(body: &str) -> Result<Vec<Record>, serde_json::Error> {
    match serde_json::from_str::<Value>(body)? {
        object @ Value::Object(_) => Ok(vec![serde_json::from_value(object)?]),
        other => serde_json::from_value(other),
    }
}

/// Persists every record it receives, acknowledging a message only once all of its rows are durable.
pub struct CollectorStage<I, S> {
    /// Eligible listings from the processor.
    inbound: I,
    store: S,
    poll: PollConfig,
}

impl<I: QueuePort, S: RecordStore> CollectorStage<I, S> {
    pub fn new(inbound: I, store: S, poll: PollConfig) -> Self {
        Self {
            inbound,
            store,
            poll,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn handle(&mut self, message: QueueMessage, report: &mut CycleReport) {
        let records = match parse_batch(&message.body) {
            Ok(records) => records,
            Err(error) => {
                warn!(
                    message_id = %message.message_id,
                    "dropping malformed batch: {}", error
                );
                report.malformed += 1;
                acknowledge(&self.inbound, &message.receipt, report).await;
                return;
            }
        };

        if !records.is_empty() {
            if let Err(error) = self.store.append(&records) {
                error!(
                    message_id = %message.message_id,
                    "failed to persist batch, leaving it for redelivery: {}", error
                );
                report.deferred += 1;
                return;
            }

            for record in &records {
                info!(
                    message_id = %message.message_id,
                    title = record.title(),
                    seller_id = record.seller_id(),
                    "listing written to store"
                );
            }
            report.completed += records.len();
        }

        acknowledge(&self.inbound, &message.receipt, report).await;
    }
}

#[async_trait]
impl<I: QueuePort, S: RecordStore> Stage for CollectorStage<I, S> {
    fn name(&self) -> &'static str {
        "collector"
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
