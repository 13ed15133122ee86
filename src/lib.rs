//! # Respite
//!
//! A small in-memory key-value server speaking RESP.
//!
//! Requests arrive as arrays of bulk strings, are executed against a shared
//! store of plain strings and hashes, and every accepted write is appended to
//! an append-only file that is replayed on startup.

pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod persistence;
pub mod resp;
pub mod server;
pub mod store;
