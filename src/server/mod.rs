//! Server module - session table, broadcast fan-out and the TCP connection loop

mod admission;
mod broadcast;
mod connection;
mod listener;
mod session;
mod table;

pub use admission::{ConnectionCounter, ConnectionPermit};
pub use broadcast::{Broadcaster, Scope};
pub use connection::{delivery_task, ConnectionError};
pub use listener::ServerListener;
pub use session::{Session, SessionState};
pub use table::{NameError, SessionTable, SlotSnapshot, DEFAULT_CAPACITY};
