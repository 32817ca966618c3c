//! PostgreSQL wire protocol implementation.
//!
//! This module contains the low-level protocol encoding and decoding.
//!
//! # Structure
//!
//! - `backend`: Server → Client message parsers, one module per message family
//! - `frontend`: Client → Server message writers
//! - `codec`: Low-level encoding/decoding primitives
//! - `types`: Common protocol types (FormatCode, Oid, TransactionStatus)
//! - `message`: owned `BackendMessage` union and the single decode entry point

pub mod backend;
pub mod codec;
pub mod frontend;
pub mod message;
pub mod types;

pub use message::BackendMessage;
pub use types::{FormatCode, Oid, TransactionStatus};
