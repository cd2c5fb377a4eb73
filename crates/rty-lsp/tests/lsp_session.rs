//! End-to-end sessions over in-memory pipes.

use std::io::Cursor;

use rty_lsp::{transport, LspLoop};
use rty_pipeline::{Opts, Workers};
use serde_json::{json, Value};

fn frame(message: &Value) -> Vec<u8> {
    let body = message.to_string();
    format!("Content-Length: {}\r\n\r\n{body}", body.len()).into_bytes()
}

/// Feed a scripted message sequence through a fresh server and collect
/// everything it writes back.
fn run_session(messages: &[Value]) -> Vec<Value> {
    let mut input = Vec::new();
    for message in messages {
        input.extend(frame(message));
    }

    let mut output = Vec::new();
    {
        let workers = Workers::new(Some(1)).expect("pool");
        let mut server = LspLoop::new(Opts::default(), workers, Cursor::new(input), &mut output);
        server.run().expect("session");
    }

    let mut written = Cursor::new(output);
    let mut replies = Vec::new();
    while let Some(body) = transport::read_message(&mut written).expect("well-framed output") {
        replies.push(serde_json::from_str(&body).expect("valid JSON output"));
    }
    replies
}

fn initialize() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": { "rootUri": "file:///w" },
    })
}

fn initialized() -> Value {
    json!({ "jsonrpc": "2.0", "method": "initialized" })
}

fn did_change(uri: &str, text: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "textDocument/didChange",
        "params": {
            "textDocument": { "uri": uri },
            "contentChanges": [ { "text": text } ],
        },
    })
}

fn reply_with_id<'a>(replies: &'a [Value], id: i64) -> &'a Value {
    replies
        .iter()
        .find(|r| r.get("id") == Some(&json!(id)))
        .unwrap_or_else(|| panic!("no reply with id {id} in {replies:?}"))
}

fn notifications<'a>(replies: &'a [Value], method: &str) -> Vec<&'a Value> {
    replies
        .iter()
        .filter(|r| r.get("method").and_then(Value::as_str) == Some(method))
        .collect()
}

#[test]
fn initialize_then_document_symbol() {
    let replies = run_session(&[
        initialize(),
        initialized(),
        did_change(
            "file:///w/a.rb",
            "class Widget\n  def render\n  end\nend\n",
        ),
        json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "textDocument/documentSymbol",
            "params": { "textDocument": { "uri": "file:///w/a.rb" } },
        }),
        json!({ "jsonrpc": "2.0", "method": "exit" }),
    ]);

    let init_reply = reply_with_id(&replies, 1);
    assert_eq!(init_reply["result"]["capabilities"]["textDocumentSync"], 1);
    assert_eq!(
        init_reply["result"]["capabilities"]["documentSymbolProvider"],
        true
    );
    assert!(init_reply.get("method").is_none());
    assert!(init_reply.get("params").is_none());

    let symbols = reply_with_id(&replies, 2)["result"]
        .as_array()
        .expect("symbol array")
        .clone();
    assert!(!symbols.is_empty());
    for symbol in &symbols {
        let uri = symbol["location"]["uri"].as_str().expect("uri");
        assert!(uri.starts_with("file:///w/"), "unexpected uri {uri}");
    }
    let names: Vec<&str> = symbols
        .iter()
        .map(|s| s["name"].as_str().expect("name"))
        .collect();
    assert!(names.contains(&"Widget"));
    assert!(names.contains(&"render"));

    let widget = symbols
        .iter()
        .find(|s| s["name"] == "Widget")
        .expect("widget entry");
    assert_eq!(widget["kind"], 5);
    let render = symbols
        .iter()
        .find(|s| s["name"] == "render")
        .expect("render entry");
    assert_eq!(render["kind"], 6);
    assert_eq!(render["containerName"], "Widget");
}

#[test]
fn did_change_publishes_syntax_diagnostics() {
    let replies = run_session(&[
        initialize(),
        initialized(),
        did_change("file:///w/a.rb", "class Foo\n  def\nend\n"),
    ]);

    let published = notifications(&replies, "textDocument/publishDiagnostics");
    assert!(!published.is_empty(), "expected a publish in {replies:?}");

    let params = &published[0]["params"];
    assert_eq!(params["uri"], "file:///w/a.rb");
    let diagnostics = params["diagnostics"].as_array().expect("diagnostics");
    assert!(!diagnostics.is_empty());
    assert_eq!(diagnostics[0]["code"], 2001);
    // 0-based: the bad token sits on source line 2.
    assert_eq!(diagnostics[0]["range"]["start"]["line"], 1);
}

#[test]
fn silenced_classes_never_surface() {
    let replies = run_session(&[
        initialize(),
        initialized(),
        did_change(
            "file:///w/a.rb",
            "class Foo\n  def m\n  end\n  def m\n  end\nend\n",
        ),
    ]);

    for publish in notifications(&replies, "textDocument/publishDiagnostics") {
        for diagnostic in publish["params"]["diagnostics"].as_array().expect("array") {
            assert_ne!(diagnostic["code"], 4010, "silenced class surfaced");
        }
    }
}

#[test]
fn edits_outside_the_root_are_ignored() {
    let replies = run_session(&[
        initialize(),
        initialized(),
        did_change("file:///elsewhere/a.rb", "class Foo\n  def\nend\n"),
    ]);

    assert!(notifications(&replies, "textDocument/publishDiagnostics").is_empty());
}

#[test]
fn watched_file_changes_round_trip_through_read_file() {
    let watched = json!({
        "jsonrpc": "2.0",
        "method": "workspace/didChangeWatchedFiles",
        "params": { "changes": [ { "uri": "file:///w/b.rb", "type": 2 } ] },
    });
    // The server's readFile request uses its first generated id.
    let read_file_reply = json!({
        "jsonrpc": "2.0",
        "id": "ruby-typer-req-1",
        "result": [ { "uri": "file:///w/b.rb", "content": "class Beta\n  def\nend\n" } ],
    });
    let replies = run_session(&[initialize(), initialized(), watched, read_file_reply]);

    let requests: Vec<&Value> = replies
        .iter()
        .filter(|r| r.get("method").and_then(Value::as_str) == Some("readFile"))
        .collect();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["id"], "ruby-typer-req-1");

    let published = notifications(&replies, "textDocument/publishDiagnostics");
    assert!(
        published
            .iter()
            .any(|p| p["params"]["uri"] == "file:///w/b.rb"),
        "expected diagnostics for the watched file in {replies:?}"
    );
}

#[test]
fn shutdown_returns_null() {
    let replies = run_session(&[
        initialize(),
        json!({ "jsonrpc": "2.0", "id": 7, "method": "shutdown" }),
    ]);
    assert_eq!(reply_with_id(&replies, 7)["result"], Value::Null);
}

#[test]
fn unsupported_requests_get_method_not_found() {
    let replies = run_session(&[
        initialize(),
        json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "textDocument/hover",
            "params": {},
        }),
    ]);

    let reply = reply_with_id(&replies, 3);
    assert_eq!(reply["error"]["code"], -32601);
    assert!(reply["error"]["message"]
        .as_str()
        .expect("message")
        .contains("textDocument/hover"));
}

#[test]
fn unknown_notifications_are_ignored() {
    let replies = run_session(&[
        initialize(),
        json!({ "jsonrpc": "2.0", "method": "window/didFeelLucky" }),
        json!({ "jsonrpc": "2.0", "id": 4, "method": "shutdown" }),
    ]);
    // The session survives to answer the shutdown.
    assert_eq!(reply_with_id(&replies, 4)["result"], Value::Null);
}

#[test]
fn sequential_edits_republish() {
    let replies = run_session(&[
        initialize(),
        initialized(),
        did_change("file:///w/a.rb", "class Foo\n  def\nend\n"),
        did_change("file:///w/a.rb", "class Foo\n  def m\n  end\nend\n"),
        did_change("file:///w/a.rb", "class Foo\n  def\nend\n"),
    ]);

    let published = notifications(&replies, "textDocument/publishDiagnostics");
    // First and third edits are broken; the middle one is clean and
    // publishes nothing because its diagnostics set is empty.
    assert_eq!(published.len(), 2);
    for publish in published {
        assert!(!publish["params"]["diagnostics"]
            .as_array()
            .expect("array")
            .is_empty());
    }
}
