//! Session - the live state of one connected participant

use super::connection::{delivery_task, ConnectionError};
use super::table::SessionTable;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Protocol state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Next line is the desired display name
    AwaitingName,
    /// Joined; lines are chat messages or rename directives
    Active,
    /// Connection finished
    Terminated,
}

/// Handle owned by a connection task for the lifetime of its slot
pub struct Session {
    /// Unique connection identifier, for logs
    id: Uuid,

    /// Slot in the session table
    slot: usize,

    /// Committed display name; empty until joined
    name: String,

    state: SessionState,

    /// Sender side of this session's delivery queue, for direct replies
    outbound: mpsc::Sender<String>,

    /// Stops the delivery task
    cancel: CancellationToken,

    delivery: JoinHandle<()>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("slot", &self.slot)
            .field("name", &self.name)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Start the delivery task for an already allocated slot
    pub fn spawn<W>(
        id: Uuid,
        slot: usize,
        outbound: mpsc::Sender<String>,
        queue: mpsc::Receiver<String>,
        writer: W,
    ) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let delivery = tokio::spawn(delivery_task(writer, queue, cancel.clone()));

        Self {
            id,
            slot,
            name: String::new(),
            state: SessionState::AwaitingName,
            outbound,
            cancel,
            delivery,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn has_joined(&self) -> bool {
        !self.name.is_empty()
    }

    /// Record a name committed in the table and move to `Active`
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.state = SessionState::Active;
    }

    /// Queue a reply for this client only
    ///
    /// Unlike broadcasts this waits for queue space, so replies are never dropped.
    pub async fn reply(&self, text: impl Into<String>) -> Result<(), ConnectionError> {
        self.outbound
            .send(text.into())
            .await
            .map_err(|_| ConnectionError::Closed)
    }

    /// Stop the delivery task, wait for it, then free the slot
    pub async fn close(mut self, table: &SessionTable) {
        self.state = SessionState::Terminated;
        self.cancel.cancel();

        if let Err(e) = self.delivery.await {
            tracing::warn!("Delivery task for {} ended abnormally: {}", self.id, e);
        }

        table.release(self.slot);
        tracing::debug!("Released slot {} held by {}", self.slot, self.id);
    }
}
