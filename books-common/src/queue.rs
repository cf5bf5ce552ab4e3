use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Enumeration of errors for operations on a queue.
/// All of them are considered transient: the caller logs and tries again on a later cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("receive from {queue} failed with: {reason}")]
    ReceiveError { queue: String, reason: String },
    #[error("delete from {queue} failed with: {reason}")]
    DeleteError { queue: String, reason: String },
    #[error("send to {queue} failed with: {reason}")]
    SendError { queue: String, reason: String },
}

pub type QueueResult<T> = std::result::Result<T, QueueError>;

/// A message as handed out by `QueuePort::receive`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    /// Token identifying this particular delivery. Required to delete the message.
    pub receipt: String,
    pub body: String,
}

/// The operations a stage needs from the queue it consumes from or publishes to.
///
/// Delivery is at-least-once: a received message stays hidden for the queue's
/// visibility window and is delivered again unless deleted with its receipt.
#[async_trait]
pub trait QueuePort: Send + Sync {
    /// Wait up to `wait` for at most `max_count` messages. An empty `Vec` is not an error.
    async fn receive(&self, max_count: usize, wait: time::Duration)
        -> QueueResult<Vec<QueueMessage>>;

    /// Acknowledge one delivery so it is never redelivered.
    async fn delete(&self, receipt: &str) -> QueueResult<()>;

    /// Publish a new message, returning the id the queue assigned to it.
    async fn send(&self, body: String) -> QueueResult<String>;
}

#[derive(Debug, Clone)]
struct StoredMessage {
    sequence: u64,
    message_id: String,
    body: String,
}

#[derive(Debug, Default)]
struct MemoryQueueState {
    visible: VecDeque<StoredMessage>,
    in_flight: HashMap<String, StoredMessage>,
    next_sequence: u64,
    failing_receives: usize,
    failing_sends: usize,
    failing_deletes: usize,
}

/// In-process queue for tests and local runs.
///
/// Received messages move to an in-flight set until deleted. `expire_in_flight`
/// plays the part of a lapsed visibility timeout. Clones share the same queue.
#[derive(Debug, Clone)]
pub struct MemoryQueue {
    name: String,
    state: Arc<Mutex<MemoryQueueState>>,
}

impl MemoryQueue {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            state: Default::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue a body directly, as an upstream producer would.
    pub fn push(&self, body: &str) -> String {
        let message_id = Uuid::now_v7().to_string();
        let mut state = self.lock();
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.visible.push_back(StoredMessage {
            sequence,
            message_id: message_id.clone(),
            body: body.to_owned(),
        });
        message_id
    }

    /// Bodies waiting to be received, in delivery order.
    pub fn visible_bodies(&self) -> Vec<String> {
        self.lock()
            .visible
            .iter()
            .map(|message| message.body.clone())
            .collect()
    }

    pub fn visible_count(&self) -> usize {
        self.lock().visible.len()
    }

    /// Messages received but neither deleted nor expired.
    pub fn in_flight_count(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// Return every in-flight message to the front of the queue, invalidating its receipt.
    pub fn expire_in_flight(&self) {
        let mut state = self.lock();
        let mut expired: Vec<StoredMessage> = state.in_flight.drain().map(|(_, m)| m).collect();
        expired.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        for message in expired {
            state.visible.push_front(message);
        }
    }

    pub fn fail_next_receives(&self, count: usize) {
        self.lock().failing_receives = count;
    }

    pub fn fail_next_sends(&self, count: usize) {
        self.lock().failing_sends = count;
    }

    pub fn fail_next_deletes(&self, count: usize) {
        self.lock().failing_deletes = count;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryQueueState> {
        // A panic while holding the lock only happens in a failing test.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn injected_failure(counter: &mut usize) -> bool {
        if *counter > 0 {
            *counter -= 1;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl QueuePort for MemoryQueue {
    async fn receive(
        &self,
        max_count: usize,
        _wait: time::Duration,
    ) -> QueueResult<Vec<QueueMessage>> {
        let mut state = self.lock();
        if Self::injected_failure(&mut state.failing_receives) {
            return Err(QueueError::ReceiveError {
                queue: self.name.clone(),
                reason: "injected failure".to_owned(),
            });
        }

        let count = max_count.min(state.visible.len());
        let drained: Vec<StoredMessage> = state.visible.drain(..count).collect();
        let mut messages = Vec::with_capacity(count);
        for message in drained {
            let receipt = Uuid::now_v7().to_string();
            messages.push(QueueMessage {
                message_id: message.message_id.clone(),
                receipt: receipt.clone(),
                body: message.body.clone(),
            });
            state.in_flight.insert(receipt, message);
        }

        Ok(messages)
    }

    async fn delete(&self, receipt: &str) -> QueueResult<()> {
        let mut state = self.lock();
        if Self::injected_failure(&mut state.failing_deletes) {
            return Err(QueueError::DeleteError {
                queue: self.name.clone(),
                reason: "injected failure".to_owned(),
            });
        }

        match state.in_flight.remove(receipt) {
            Some(_) => Ok(()),
            None => Err(QueueError::DeleteError {
                queue: self.name.clone(),
                reason: format!("unknown receipt {receipt}"),
            }),
        }
    }

    async fn send(&self, body: String) -> QueueResult<String> {
        {
            let mut state = self.lock();
            if Self::injected_failure(&mut state.failing_sends) {
                return Err(QueueError::SendError {
                    queue: self.name.clone(),
                    reason: "injected failure".to_owned(),
                });
            }
        }

        Ok(self.push(&body))
    }
}
