use tokio::sync::mpsc;

use super::token::RequestId;

/// Notification published to host subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadEvent {
    Started {
        request: RequestId,
        source: String,
    },
    Succeeded {
        request: RequestId,
        source: String,
        triangles: usize,
    },
    Failed {
        request: RequestId,
        source: String,
        reason: String,
    },
    Cleared,
}

impl LoadEvent {
    pub fn request(&self) -> Option<RequestId> {
        match self {
            LoadEvent::Started { request, .. }
            | LoadEvent::Succeeded { request, .. }
            | LoadEvent::Failed { request, .. } => Some(*request),
            LoadEvent::Cleared => None,
        }
    }
}

/// Fan-out of [`LoadEvent`]s; subscribers whose receiver is gone are pruned.
#[derive(Debug, Default)]
pub struct EventHub {
    subscribers: Vec<mpsc::UnboundedSender<LoadEvent>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<LoadEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn emit(&mut self, event: LoadEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
