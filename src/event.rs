//! Messages exchanged between workers and the queues that carry them.

use anyhow::{Result, anyhow};
use tokio::sync::mpsc;

/// Classified button gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gesture {
    None,
    Click,
    Twice,
    Press,
}

impl Gesture {
    pub fn name(self) -> &'static str {
        match self {
            Gesture::None => "none",
            Gesture::Click => "click",
            Gesture::Twice => "twice",
            Gesture::Press => "press",
        }
    }
}

/// Request sent to the display consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayToken {
    /// Show the next page.
    Advance,
    /// Re-render the current page with fresh data.
    Redraw,
}

impl From<bool> for DisplayToken {
    fn from(advance: bool) -> Self {
        if advance {
            DisplayToken::Advance
        } else {
            DisplayToken::Redraw
        }
    }
}

/// Producer side of an unbounded FIFO queue.
///
/// Cloned freely by every producer; the single consumer owns the receiver.
#[derive(Debug)]
pub struct Queue<T> {
    sender: mpsc::UnboundedSender<T>,
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T> Queue<T> {
    /// Enqueues a message; fails only when the consumer is gone.
    pub fn push(&self, message: T) -> Result<()> {
        self.sender
            .send(message)
            .map_err(|_| anyhow!("queue consumer has stopped"))
    }
}

/// Creates a queue and its consumer.
pub fn channel<T>() -> (Queue<T>, mpsc::UnboundedReceiver<T>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Queue { sender }, receiver)
}

pub type GestureQueue = Queue<Gesture>;
pub type DisplayQueue = Queue<DisplayToken>;
