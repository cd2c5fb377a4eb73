//! Wire payload types.
//!
//! Hand-rolled serde mirrors of the LSP structures this server actually
//! sends. Envelopes stay `serde_json::Value` — the dispatcher echoes and
//! mutates them directly — but everything placed under `result` or `params`
//! goes through these types.

use serde::{Deserialize, Serialize};

/// JSON-RPC error code for an unknown method.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// A 0-based line/character position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Line number (0-based).
    pub line: u32,
    /// Character offset (0-based).
    pub character: u32,
}

/// A range between two positions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    /// Start position.
    pub start: Position,
    /// End position (exclusive).
    pub end: Position,
}

/// A URI plus a range within it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Document URI.
    pub uri: String,
    /// Range within the document.
    pub range: Range,
}

/// Related information attached to a complex diagnostic.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticRelatedInformation {
    /// Where the related message points.
    pub location: Location,
    /// The message for that location.
    pub message: String,
}

/// One published diagnostic.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// The range the message applies to.
    pub range: Range,
    /// The error class's numeric code.
    pub code: u16,
    /// Pre-formatted message text.
    pub message: String,
    /// Extra locations for multi-section diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_information: Option<Vec<DiagnosticRelatedInformation>>,
}

/// Parameters of a `textDocument/publishDiagnostics` notification.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublishDiagnosticsParams {
    /// The URI diagnostics are reported for.
    pub uri: String,
    /// The diagnostics.
    pub diagnostics: Vec<Diagnostic>,
}

/// An entry of a `textDocument/documentSymbol` reply.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInformation {
    /// The symbol's own name.
    pub name: String,
    /// Numeric LSP symbol kind.
    pub kind: u32,
    /// Where the symbol is defined.
    pub location: Location,
    /// Qualified name of the containing symbol.
    pub container_name: String,
}

/// Numeric LSP symbol kinds, as far as this server maps them.
pub mod symbol_kind {
    /// Module.
    pub const MODULE: u32 = 2;
    /// Class.
    pub const CLASS: u32 = 5;
    /// Method.
    pub const METHOD: u32 = 6;
    /// Field.
    pub const FIELD: u32 = 8;
    /// Constructor.
    pub const CONSTRUCTOR: u32 = 9;
    /// Variable.
    pub const VARIABLE: u32 = 13;
    /// Constant.
    pub const CONSTANT: u32 = 14;
    /// Type parameter.
    pub const TYPE_PARAMETER: u32 = 26;
}

/// What the server advertises at `initialize`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCapabilities {
    /// Full-document sync.
    pub text_document_sync: u8,
    /// `textDocument/documentSymbol` support.
    pub document_symbol_provider: bool,
}

/// The `initialize` reply payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitializeResult {
    /// Advertised capabilities.
    pub capabilities: ServerCapabilities,
}

impl Default for InitializeResult {
    fn default() -> Self {
        Self {
            capabilities: ServerCapabilities {
                text_document_sync: 1,
                document_symbol_provider: true,
            },
        }
    }
}
