use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ve_core::Event;

pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Backpressure {
    Block,
    #[default]
    DropNewest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxConfig {
    pub capacity: Option<usize>,
    pub backpressure: Backpressure,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            capacity: Some(DEFAULT_MAILBOX_CAPACITY),
            backpressure: Backpressure::default(),
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MailboxError {
    #[error("mailbox is full")]
    Full,
    #[error("mailbox is closed")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct Mailbox {
    sender: Sender<Event>,
    backpressure: Backpressure,
}

impl Mailbox {
    pub fn channel(config: &MailboxConfig) -> (Self, Receiver<Event>) {
        let (sender, receiver) = match config.capacity {
            Some(capacity) => bounded(capacity.max(1)),
            None => unbounded(),
        };
        (
            Self {
                sender,
                backpressure: config.backpressure,
            },
            receiver,
        )
    }

    pub fn deliver(&self, event: Event) -> Result<(), MailboxError> {
        match self.backpressure {
            Backpressure::Block => self.sender.send(event).map_err(|_| MailboxError::Closed),
            Backpressure::DropNewest => self.try_deliver(event),
        }
    }

    pub fn try_deliver(&self, event: Event) -> Result<(), MailboxError> {
        self.sender.try_send(event).map_err(|error| match error {
            TrySendError::Full(_) => MailboxError::Full,
            TrySendError::Disconnected(_) => MailboxError::Closed,
        })
    }

    pub fn pending(&self) -> usize {
        self.sender.len()
    }

    pub fn backpressure(&self) -> Backpressure {
        self.backpressure
    }
}
