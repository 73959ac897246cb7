//! chatrelay - a line-oriented TCP chat relay
//!
//! This crate provides the core functionality for chatrelay, including:
//! - A fixed-capacity session table with unique display names
//! - Best-effort broadcast into bounded per-session delivery queues
//! - An append-only transcript replayed to newly joined clients
//! - Configuration management and the operator console
//!
//! # Architecture
//!
//! One task accepts TCP connections and applies the admission gate. Each
//! admitted connection gets a protocol task (naming, then chat relay) and a
//! delivery task that drains its queue onto the socket. Tasks cooperate only
//! through the session table and the transcript.

pub mod config;
pub mod console;
pub mod history;
pub mod protocol;
pub mod server;
