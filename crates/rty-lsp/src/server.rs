//! The dispatcher loop.

use std::io::{BufRead, Write};

use rustc_hash::FxHashMap;
use rty_core::{names, FileRef, GlobalState, QueuedError, SymbolKind, SymbolRef};
use rty_pipeline::{Opts, ParsedFile, Workers};
use serde_json::{json, Value};
use tracing::{debug, info, trace, warn};

use crate::methods::{self, LspMethod};
use crate::protocol::{self, SymbolInformation};
use crate::state::SourceUpdate;
use crate::transport;
use crate::{LspError, Result};

/// A one-shot callback for a server-initiated request's reply.
pub type ReplyCallback<R, W> = Box<dyn FnOnce(&mut LspLoop<R, W>, &Value)>;

/// The pending completion pair for one outstanding request id.
pub struct ResponseHandler<R, W> {
    /// Runs on a `result` reply.
    pub on_result: ReplyCallback<R, W>,
    /// Runs on an `error` reply.
    pub on_error: ReplyCallback<R, W>,
}

/// The server: transport endpoints plus all incremental state.
///
/// Generic over its reader and writer so tests can drive a whole session
/// over in-memory pipes.
pub struct LspLoop<R, W> {
    input: R,
    output: W,
    pub(crate) opts: Opts,
    pub(crate) workers: Workers,
    /// Post-index baseline state.
    pub(crate) initial_gs: GlobalState,
    /// Post-typecheck derivative, rebuilt by each slow path.
    pub(crate) final_gs: Option<GlobalState>,
    /// Indexed-tree cache, sparse over `FileRef` ids.
    pub(crate) indexed: Vec<Option<ParsedFile>>,
    /// Diagnostics accumulated per file since the last invalidation.
    pub(crate) errors_accumulated: FxHashMap<FileRef, Vec<QueuedError>>,
    /// Files with new diagnostics since the last publish, in order.
    pub(crate) updated_errors: Vec<FileRef>,
    awaiting_response: FxHashMap<String, ResponseHandler<R, W>>,
    request_counter: u64,
    pub(crate) root_uri: String,
}

impl<R: BufRead, W: Write> LspLoop<R, W> {
    /// Create a server over the given transport endpoints.
    #[must_use]
    pub fn new(opts: Opts, workers: Workers, input: R, output: W) -> Self {
        Self {
            input,
            output,
            opts,
            workers,
            initial_gs: GlobalState::new(),
            final_gs: None,
            indexed: Vec::new(),
            errors_accumulated: FxHashMap::default(),
            updated_errors: Vec::new(),
            awaiting_response: FxHashMap::default(),
            request_counter: 0,
            root_uri: String::new(),
        }
    }

    /// Run the loop until `exit`, EOF, or a protocol error.
    pub fn run(&mut self) -> Result<()> {
        loop {
            let Some(body) = transport::read_message(&mut self.input)? else {
                info!("eof");
                return Ok(());
            };
            trace!(%body, "read");

            let message: Value = match serde_json::from_str(&body) {
                Ok(value) => value,
                Err(err) => {
                    info!(%err, "json parse error");
                    return Err(err.into());
                }
            };

            if self.handle_reply(&message) {
                continue;
            }

            let Some(name) = message.get("method").and_then(Value::as_str) else {
                info!("message carries neither method nor reply");
                return Err(LspError::Protocol(
                    "message carries neither method nor reply".to_owned(),
                ));
            };
            let method = methods::get_method(name);

            if method.is_notification {
                info!(method = %method.name, "processing notification");
                if !self.handle_notification(&method, &message)? {
                    return Ok(());
                }
            } else {
                info!(method = %method.name, "processing request");
                self.handle_request(&method, message)?;
            }
        }
    }

    /// Returns `Ok(false)` when the notification asks the loop to exit.
    fn handle_notification(&mut self, method: &LspMethod, message: &Value) -> Result<bool> {
        match method.name.as_str() {
            "initialized" => {
                self.re_index(true);
                self.run_slow_path(Vec::new())?;
                self.push_errors()?;
            }
            "exit" => return Ok(false),
            "textDocument/didChange" => {
                let uri = field_str(message, &["params", "textDocument", "uri"])?.to_owned();
                let content =
                    field_str(message, &["params", "contentChanges", "0", "text"])?.to_owned();
                if self.is_under_root(&uri) {
                    let path = self.remote_name_to_local(&uri);
                    self.try_fast_path(vec![SourceUpdate { path, content }])?;
                    self.push_errors()?;
                }
            }
            "workspace/didChangeWatchedFiles" => {
                let params = message.get("params").cloned().unwrap_or(Value::Null);
                self.send_request(
                    "readFile",
                    params,
                    Box::new(|server, contents| {
                        if let Err(err) = server.apply_watched_edits(contents) {
                            warn!(%err, "failed to apply watched-file contents");
                        }
                    }),
                    Box::new(|_, _| {}),
                )?;
            }
            _ => {
                debug!(method = %method.name, "ignoring notification");
            }
        }
        Ok(true)
    }

    /// The `readFile` reply: an array of `{uri, content}` to run through
    /// reanalysis.
    fn apply_watched_edits(&mut self, contents: &Value) -> Result<()> {
        let Some(changes) = contents.as_array() else {
            return Err(LspError::Protocol(
                "readFile reply is not an array".to_owned(),
            ));
        };
        let mut updates = Vec::new();
        for change in changes {
            let uri = field_str(change, &["uri"])?;
            let content = field_str(change, &["content"])?;
            if self.is_under_root(uri) {
                updates.push(SourceUpdate {
                    path: self.remote_name_to_local(uri),
                    content: content.to_owned(),
                });
            }
        }
        self.try_fast_path(updates)?;
        self.push_errors()
    }

    fn handle_request(&mut self, method: &LspMethod, message: Value) -> Result<()> {
        let mut error: Option<(i64, String)> = None;
        let result = match method.name.as_str() {
            "initialize" => {
                self.root_uri = field_str(&message, &["params", "rootUri"])?.to_owned();
                serde_json::to_value(protocol::InitializeResult::default())?
            }
            "shutdown" => Value::Null,
            "textDocument/documentSymbol" => {
                let uri = field_str(&message, &["params", "textDocument", "uri"])?;
                serde_json::to_value(self.document_symbols(uri))?
            }
            _ => {
                error = Some((
                    protocol::METHOD_NOT_FOUND,
                    format!("Unknown method: {}", method.name),
                ));
                Value::Null
            }
        };

        match error {
            None => self.send_result(message, result),
            Some((code, text)) => self.send_error(message, code, text),
        }
    }

    fn document_symbols(&self, uri: &str) -> Vec<SymbolInformation> {
        let mut out = Vec::new();
        let Some(final_gs) = &self.final_gs else {
            return out;
        };
        let fref = self.uri_to_file_ref(uri);
        if !fref.exists() {
            return out;
        }
        for idx in 1..final_gs.symbols_used() {
            let sref = SymbolRef::new(idx);
            if final_gs.symbol(sref).definition_loc.file == fref {
                if let Some(info) = self.symbol_information(final_gs, sref) {
                    out.push(info);
                }
            }
        }
        out
    }

    /// Map a symbol to its `SymbolInformation`, or `None` for symbols with
    /// no LSP kind.
    fn symbol_information(
        &self,
        gs: &GlobalState,
        sref: SymbolRef,
    ) -> Option<SymbolInformation> {
        use protocol::symbol_kind::*;

        let sym = gs.symbol(sref);
        let kind = match sym.kind {
            SymbolKind::ClassOrModule { is_module: true } => MODULE,
            SymbolKind::ClassOrModule { is_module: false } => CLASS,
            SymbolKind::Method => {
                if sym.name == names::initialize() {
                    CONSTRUCTOR
                } else {
                    METHOD
                }
            }
            SymbolKind::Field => FIELD,
            SymbolKind::StaticField => CONSTANT,
            SymbolKind::MethodArgument => VARIABLE,
            SymbolKind::TypeMember | SymbolKind::TypeArgument => TYPE_PARAMETER,
        };
        Some(SymbolInformation {
            name: sym.name.to_string(),
            kind,
            location: self.loc_to_location(gs, sym.definition_loc),
            container_name: gs.full_name(sym.owner),
        })
    }

    // --- outbound ---

    pub(crate) fn send_raw(&mut self, message: &Value) -> Result<()> {
        trace!(%message, "write");
        transport::write_message(&mut self.output, message)?;
        Ok(())
    }

    /// Send a server-initiated notification.
    pub(crate) fn send_notification(&mut self, method: &str, params: Value) -> Result<()> {
        let message = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        self.send_raw(&message)
    }

    /// Send a server-initiated request; the callbacks fire on its reply.
    pub fn send_request(
        &mut self,
        method: &str,
        params: Value,
        on_result: ReplyCallback<R, W>,
        on_error: ReplyCallback<R, W>,
    ) -> Result<()> {
        self.request_counter += 1;
        let id = format!("ruby-typer-req-{}", self.request_counter);
        let message = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        self.awaiting_response
            .insert(id, ResponseHandler { on_result, on_error });
        self.send_raw(&message)
    }

    /// Reply to a request: echo its envelope with `result` swapped in.
    fn send_result(&mut self, mut envelope: Value, result: Value) -> Result<()> {
        if let Some(fields) = envelope.as_object_mut() {
            fields.remove("method");
            fields.remove("params");
            fields.insert("result".to_owned(), result);
        }
        self.send_raw(&envelope)
    }

    /// Reply to a request with an error.
    fn send_error(&mut self, mut envelope: Value, code: i64, text: String) -> Result<()> {
        if let Some(fields) = envelope.as_object_mut() {
            fields.remove("method");
            fields.remove("params");
            fields.insert("error".to_owned(), json!({ "code": code, "message": text }));
        }
        self.send_raw(&envelope)
    }

    /// Consume a correlated reply; the matching callback fires exactly once.
    ///
    /// Returns whether the message was a reply (and is therefore done).
    pub fn handle_reply(&mut self, message: &Value) -> bool {
        if let Some(result) = message.get("result") {
            if let Some(id) = message.get("id").and_then(Value::as_str) {
                if let Some(handler) = self.awaiting_response.remove(id) {
                    (handler.on_result)(self, result);
                }
            }
            return true;
        }
        if let Some(error) = message.get("error") {
            if let Some(id) = message.get("id").and_then(Value::as_str) {
                if let Some(handler) = self.awaiting_response.remove(id) {
                    (handler.on_error)(self, error);
                }
            }
            return true;
        }
        false
    }

    /// Number of requests still awaiting a reply.
    #[must_use]
    pub fn pending_responses(&self) -> usize {
        self.awaiting_response.len()
    }
}

/// Walk a `Value` path, where numeric segments index arrays.
fn field_str<'a>(message: &'a Value, path: &[&str]) -> Result<&'a str> {
    let mut cur = message;
    for segment in path {
        cur = match segment.parse::<usize>() {
            Ok(index) => cur.get(index),
            Err(_) => cur.get(segment),
        }
        .ok_or_else(|| LspError::Protocol(format!("missing field `{}`", path.join("."))))?;
    }
    cur.as_str()
        .ok_or_else(|| LspError::Protocol(format!("field `{}` is not a string", path.join("."))))
}
