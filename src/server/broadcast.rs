//! Best-effort fan-out of chat events into session delivery queues

use super::table::SessionTable;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;

/// Which sessions a broadcast reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every joined session, the source included
    All,
    /// Every joined session except the source
    AllExceptSource,
}

/// Writes events into the delivery queue of every joined session
#[derive(Debug, Clone)]
pub struct Broadcaster {
    table: Arc<SessionTable>,
}

impl Broadcaster {
    pub fn new(table: Arc<SessionTable>) -> Self {
        Self { table }
    }

    /// Enqueue `message` for every recipient in `scope` without waiting
    ///
    /// Sessions that have not joined yet are skipped. A full or closed queue
    /// loses the message for that recipient only. Returns the number of
    /// queues that accepted it.
    pub fn deliver(&self, source: usize, scope: Scope, message: &str) -> usize {
        let mut delivered = 0;

        self.table.for_each(|slot| {
            if scope == Scope::AllExceptSource && slot.index == source {
                return;
            }
            if slot.name.is_empty() {
                return;
            }

            match slot.queue.try_send(message.to_string()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(
                        "Delivery queue of slot {} full, dropping message",
                        slot.index
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!("Delivery queue of slot {} closed", slot.index);
                }
            }
        });

        delivered
    }
}
