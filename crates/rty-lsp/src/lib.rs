//! The language server.
//!
//! Mediates between an editor and the compiler pipeline over framed
//! JSON-RPC on stdio. The loop is single-threaded and cooperative: it reads
//! one framed message, processes it to completion (including any
//! synchronous reanalysis), and only then reads the next.
//!
//! # Architecture
//!
//! ```text
//!   Editor ── stdio frames ──▶ transport ──▶ LspLoop dispatch
//!                                               │
//!                              ┌────────────────┼───────────────┐
//!                              ▼                ▼               ▼
//!                        incremental       diagnostic      symbol
//!                        state (GS,        drain/publish   queries
//!                        indexed trees)
//! ```
//!
//! Incremental state is two global states: `initial_gs`, the post-index
//! baseline, and `final_gs`, a deep-copied derivative produced by each
//! slow-path reanalysis. Cached indexed trees are deep-copied per pass so
//! reanalysis never mutates the cache.

#![warn(missing_docs)]

pub mod methods;
pub mod protocol;
pub mod transport;

mod diagnostics;
mod server;
mod state;
mod uri;

pub use server::LspLoop;
pub use state::SourceUpdate;

use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum LspError {
    /// The peer violated the framing or message shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A cached tree could not be deep-copied even after reparsing.
    #[error("indexed tree is not copyable")]
    DeepCopy,

    /// IO error on the transport.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error on the transport.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Server result type.
pub type Result<T> = std::result::Result<T, LspError>;
