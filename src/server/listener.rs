//! TCP listener, admission and the per-connection protocol loop

use super::admission::{ConnectionCounter, ConnectionPermit};
use super::broadcast::{Broadcaster, Scope};
use super::connection::{read_line, write_text, ConnectionError};
use super::session::{Session, SessionState};
use super::table::{NameError, SessionTable};
use crate::config::Config;
use crate::history::HistoryStore;
use crate::protocol::{self, Line};
use anyhow::{anyhow, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Server state shared across connections
struct ServerState {
    table: Arc<SessionTable>,
    broadcaster: Broadcaster,
    history: Arc<HistoryStore>,
    banner: String,
    queue_capacity: usize,
}

/// TCP chat server listener
pub struct ServerListener {
    listener: TcpListener,
    counter: Arc<ConnectionCounter>,
    state: Arc<ServerState>,
}

impl ServerListener {
    /// Bind the listening socket and set up an empty session table
    pub async fn bind(config: &Config, history: HistoryStore) -> Result<Self> {
        let address = config.listen_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| anyhow!("Failed to bind {}: {}", address, e))?;

        let table = Arc::new(SessionTable::new(config.server.max_clients));
        let state = Arc::new(ServerState {
            broadcaster: Broadcaster::new(Arc::clone(&table)),
            table,
            history: Arc::new(history),
            banner: config.banner()?,
            queue_capacity: config.server.queue_capacity.max(1),
        });

        Ok(Self {
            listener,
            counter: ConnectionCounter::new(config.server.max_clients),
            state,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Session table, for read-only queries such as the operator console
    pub fn table(&self) -> Arc<SessionTable> {
        Arc::clone(&self.state.table)
    }

    /// Accept connections until shutdown or a fatal transcript error
    pub async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        tracing::info!("Server listening on {}", self.local_addr()?);

        // Connection tasks report fatal errors here
        let (fatal_tx, mut fatal_rx) = mpsc::channel::<anyhow::Error>(8);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Shutdown signal received");
                    break;
                }

                Some(err) = fatal_rx.recv() => {
                    tracing::error!("Fatal error, stopping server: {}", err);
                    return Err(err);
                }

                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => self.admit(stream, addr, &fatal_tx).await,
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Reserve capacity and a slot for a new connection, or turn it away
    async fn admit(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
        fatal_tx: &mpsc::Sender<anyhow::Error>,
    ) {
        let Some(permit) = self.counter.try_reserve() else {
            reject(stream, addr).await;
            return;
        };

        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel::<String>(self.state.queue_capacity);
        let Some(slot) = self.state.table.allocate(tx.clone()) else {
            drop(permit);
            reject(stream, addr).await;
            return;
        };

        tracing::info!(
            "Client connected: {} ({}) in slot {}, {}/{} connections",
            addr,
            id,
            slot,
            self.counter.current(),
            self.counter.limit()
        );

        let (reader, writer) = stream.into_split();
        let session = Session::spawn(id, slot, tx, rx, writer);
        let state = Arc::clone(&self.state);
        let fatal_tx = fatal_tx.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_client(BufReader::new(reader), session, state, permit).await {
                tracing::error!("Client {} failed: {}", id, e);
                let _ = fatal_tx.send(e).await;
            }
        });
    }
}

/// Tell an over-capacity client the server is full and close the stream
async fn reject(mut stream: TcpStream, addr: SocketAddr) {
    if let Err(e) = write_text(&mut stream, protocol::SERVER_FULL).await {
        tracing::debug!("Failed to notify rejected client {}: {}", addr, e);
    }
    let _ = stream.shutdown().await;

    let message = "One client rejected because the server is full";
    println!("{}", message);
    tracing::warn!("{} ({})", message, addr);
}

/// Drive one connection from banner to departure
///
/// Only transcript failures are returned as errors; transport failures just
/// end the session.
async fn handle_client<R>(
    mut reader: R,
    mut session: Session,
    state: Arc<ServerState>,
    permit: ConnectionPermit,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let outcome = run_protocol(&mut reader, &mut session, &state).await;
    let departure = announce_departure(&session, &state);

    let id = session.id();
    session.close(&state.table).await;
    drop(permit);

    tracing::info!("Client handler finished: {}", id);

    match outcome.and(departure) {
        Ok(()) | Err(ConnectionError::Closed) => Ok(()),
        Err(ConnectionError::History(e)) => Err(e.into()),
    }
}

async fn run_protocol<R>(
    reader: &mut R,
    session: &mut Session,
    state: &ServerState,
) -> Result<(), ConnectionError>
where
    R: AsyncBufRead + Unpin,
{
    session.reply(state.banner.as_str()).await?;

    let mut line = String::new();
    loop {
        match read_line(reader, &mut line).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("Client {} closed the connection", session.id());
                return Ok(());
            }
            Err(e) => {
                tracing::debug!("Error reading from client {}: {}", session.id(), e);
                return Ok(());
            }
        }

        match session.state() {
            SessionState::AwaitingName => handle_name(&line, session, state).await?,
            SessionState::Active => handle_active(&line, session, state).await?,
            SessionState::Terminated => return Ok(()),
        }
    }
}

/// First phase: the line is the desired display name
async fn handle_name(
    line: &str,
    session: &mut Session,
    state: &ServerState,
) -> Result<(), ConnectionError> {
    let Some(name) = protocol::parse_name(line) else {
        session.reply(protocol::ERASE_LAST_LINE).await?;
        return session.reply(protocol::NAME_PROMPT).await;
    };

    match state.table.claim_name(session.slot(), name) {
        Ok(_) => {}
        Err(NameError::Duplicate(_)) => return session.reply(protocol::DUPLICATE_NAME).await,
        Err(NameError::Empty) => return session.reply(protocol::NAME_PROMPT).await,
    }
    session.set_name(name);

    let event = protocol::join_event(name);
    tracing::info!("[{}]: {}", protocol::timestamp(), event.trim_end());
    state.history.append(&event)?;
    state
        .broadcaster
        .deliver(session.slot(), Scope::AllExceptSource, &event);

    let transcript = state.history.read_all(true)?;
    session.reply(protocol::frame_transcript(transcript)).await
}

/// Second phase: blank lines, rename directives and chat messages
async fn handle_active(
    line: &str,
    session: &mut Session,
    state: &ServerState,
) -> Result<(), ConnectionError> {
    match Line::classify(line) {
        Line::Blank => Ok(()),
        Line::Rename(new_name) => handle_rename(new_name, session, state).await,
        Line::Text(text) => {
            session.reply(protocol::ERASE_LAST_LINE).await?;

            let event = protocol::chat_event(&protocol::timestamp(), session.name(), text);
            state.history.append(&event)?;
            state
                .broadcaster
                .deliver(session.slot(), Scope::AllExceptSource, &event);
            Ok(())
        }
    }
}

async fn handle_rename(
    new_name: &str,
    session: &mut Session,
    state: &ServerState,
) -> Result<(), ConnectionError> {
    let old_name = match state.table.claim_name(session.slot(), new_name) {
        Ok(old_name) => old_name,
        // An empty target collides with every unnamed slot
        Err(NameError::Duplicate(_) | NameError::Empty) => {
            return session.reply(protocol::DUPLICATE_NAME).await
        }
    };
    session.set_name(new_name);
    session.reply(protocol::ERASE_LAST_LINE).await?;

    let event = protocol::rename_event(&protocol::timestamp(), &old_name, new_name);
    tracing::info!("{}", event.trim_end());
    state.history.append(&event)?;
    state.broadcaster.deliver(session.slot(), Scope::All, &event);
    Ok(())
}

/// Persist and broadcast a departure if the session had joined
fn announce_departure(session: &Session, state: &ServerState) -> Result<(), ConnectionError> {
    tracing::info!(
        "[{}]: {} has left the chat...",
        protocol::timestamp(),
        session.name()
    );
    if !session.has_joined() {
        return Ok(());
    }

    let event = protocol::leave_event(session.name());
    state.history.append(&event)?;
    state.broadcaster.deliver(session.slot(), Scope::All, &event);
    Ok(())
}
