//! Tally Core Library
//!
//! Local-first core of the Tally shared-expenses app. Edits are immutable,
//! timestamped operations; CRDTs fold any set of them into the same
//! materialized [`State`] no matter the arrival order, and the [`Engine`]
//! persists, applies and broadcasts them in sandbox or authenticated
//! sessions.

pub mod broadcast;
pub mod config;
pub mod crdt;
pub mod engine;
pub mod operation;
pub mod reducer;
pub mod state;
pub mod storage;
pub mod transport;
pub mod types;
pub mod version;

pub use broadcast::{Broadcast, Subscription};
pub use config::EngineConfig;
pub use engine::{Engine, Origin, SessionMode, Update};
pub use operation::{Operation, OperationBase, OperationPayload};
pub use state::State;
pub use types::*;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage operation failed: {0}")]
    Storage(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Transport operation failed: {0}")]
    Transport(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Session closed")]
    SessionClosed,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
