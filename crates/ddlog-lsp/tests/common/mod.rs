//! Common test utilities for integration tests.
//!
//! This module provides shared infrastructure for LSP integration tests,
//! including the `LspClient` for communicating with the server binary.

use serde_json::{Value, json};
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, Command, Stdio};

/// A server-to-client notification, in arrival order.
#[derive(Debug, Clone)]
pub(crate) struct CapturedNotification {
    /// The LSP method name (e.g., "textDocument/publishDiagnostics").
    pub method: String,
    pub params: Value,
}

/// LSP test client for communicating with the server binary.
pub(crate) struct LspClient {
    process: Child,
    notifications: Vec<CapturedNotification>,
    reader: BufReader<std::process::ChildStdout>,
}

impl LspClient {
    /// Spawn the ddlog-lsp binary.
    pub(crate) fn spawn() -> Self {
        let mut process = Command::new(env!("CARGO_BIN_EXE_ddlog-lsp"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("Failed to spawn ddlog-lsp binary");

        let stdout = process.stdout.take().expect("Failed to capture stdout");

        Self {
            process,
            notifications: Vec::new(),
            reader: BufReader::new(stdout),
        }
    }

    /// Send a JSON-RPC message to the server.
    pub(crate) fn send(&mut self, message: &Value) {
        let body = serde_json::to_string(message).unwrap();
        let header = format!("Content-Length: {}\r\n\r\n", body.len());

        let stdin = self.process.stdin.as_mut().expect("stdin not captured");
        stdin.write_all(header.as_bytes()).unwrap();
        stdin.write_all(body.as_bytes()).unwrap();
        stdin.flush().unwrap();
    }

    /// Read one JSON-RPC message from the server.
    fn read_message(&mut self) -> Value {
        let mut content_length = 0;
        loop {
            let mut line = String::new();
            let bytes_read = self
                .reader
                .read_line(&mut line)
                .expect("Failed to read header");

            // EOF - server closed connection
            assert!(bytes_read != 0, "Server closed connection unexpectedly");

            if line == "\r\n" || line == "\n" {
                break;
            }

            if line.to_lowercase().starts_with("content-length:") {
                content_length = line
                    .split(':')
                    .nth(1)
                    .unwrap()
                    .trim()
                    .parse()
                    .expect("Invalid content length");
            }
        }

        let mut body = vec![0u8; content_length];
        self.reader
            .read_exact(&mut body)
            .expect("Failed to read body");

        serde_json::from_slice(&body).unwrap_or_else(|e| {
            panic!("Invalid JSON: {e} in: {:?}", String::from_utf8_lossy(&body))
        })
    }

    /// Records a notification; returns `None` for requests and responses.
    fn capture(&mut self, message: &Value) -> Option<CapturedNotification> {
        if message.get("id").is_some() {
            return None;
        }
        let method = message.get("method")?.as_str()?.to_string();
        let notification = CapturedNotification {
            method,
            params: message.get("params").cloned().unwrap_or(Value::Null),
        };
        self.notifications.push(notification.clone());
        Some(notification)
    }

    /// Read messages until the response with `id`, capturing notifications on
    /// the way.
    pub(crate) fn read_response(&mut self, id: i64) -> Value {
        loop {
            let message = self.read_message();
            if self.capture(&message).is_some() {
                continue;
            }
            if message.get("id") == Some(&json!(id)) && message.get("method").is_none() {
                return message;
            }
        }
    }

    /// Read messages until diagnostics for `uri` are published and return
    /// their parameters.
    pub(crate) fn wait_for_diagnostics(&mut self, uri: &str) -> Value {
        loop {
            let message = self.read_message();
            if let Some(notification) = self.capture(&message)
                && notification.method == "textDocument/publishDiagnostics"
                && notification.params["uri"] == json!(uri)
            {
                return notification.params;
            }
        }
    }

    #[allow(dead_code)] // Not used in all tests
    pub(crate) fn notifications(&self) -> &[CapturedNotification] {
        &self.notifications
    }

    /// Initialize the LSP session with one workspace folder.
    pub(crate) fn initialize(&mut self, root_uri: &str, options: Value) -> Value {
        self.send(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "processId": null,
                "capabilities": {
                    "workspace": {
                        "workspaceFolders": true
                    },
                    "textDocument": {
                        "documentSymbol": {
                            "hierarchicalDocumentSymbolSupport": true
                        },
                        "publishDiagnostics": {}
                    }
                },
                "rootUri": root_uri,
                "workspaceFolders": [{ "uri": root_uri, "name": "ws" }],
                "initializationOptions": options
            }
        }));

        let response = self.read_response(1);

        self.send(&json!({
            "jsonrpc": "2.0",
            "method": "initialized",
            "params": {}
        }));

        response
    }

    /// Open a DDlog document.
    pub(crate) fn did_open(&mut self, uri: &str, text: &str) {
        self.send(&json!({
            "jsonrpc": "2.0",
            "method": "textDocument/didOpen",
            "params": {
                "textDocument": {
                    "uri": uri,
                    "languageId": "ddlog",
                    "version": 1,
                    "text": text
                }
            }
        }));
    }

    /// Send one incremental change replacing `range` with `text`.
    #[allow(dead_code)] // Not used in all tests
    pub(crate) fn did_change(&mut self, uri: &str, version: i32, range: Value, text: &str) {
        self.send(&json!({
            "jsonrpc": "2.0",
            "method": "textDocument/didChange",
            "params": {
                "textDocument": { "uri": uri, "version": version },
                "contentChanges": [{ "range": range, "text": text }]
            }
        }));
    }

    #[allow(dead_code)] // Not used in all tests
    pub(crate) fn did_close(&mut self, uri: &str) {
        self.send(&json!({
            "jsonrpc": "2.0",
            "method": "textDocument/didClose",
            "params": { "textDocument": { "uri": uri } }
        }));
    }

    /// Request the document outline.
    pub(crate) fn document_symbol(&mut self, id: i64, uri: &str) -> Value {
        self.send(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "textDocument/documentSymbol",
            "params": { "textDocument": { "uri": uri } }
        }));
        self.read_response(id)
    }

    /// Request go-to-definition.
    #[allow(dead_code)] // Not used in all tests
    pub(crate) fn definition(&mut self, id: i64, uri: &str, line: u32, character: u32) -> Value {
        self.send(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "textDocument/definition",
            "params": {
                "textDocument": { "uri": uri },
                "position": { "line": line, "character": character }
            }
        }));
        self.read_response(id)
    }

    /// Search declarations across the workspace.
    #[allow(dead_code)] // Not used in all tests
    pub(crate) fn workspace_symbol(&mut self, id: i64, query: &str) -> Value {
        self.send(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "workspace/symbol",
            "params": { "query": query }
        }));
        self.read_response(id)
    }

    /// Shutdown the server.
    pub(crate) fn shutdown(&mut self) -> Value {
        self.send(&json!({
            "jsonrpc": "2.0",
            "id": 999,
            "method": "shutdown"
        }));
        self.read_response(999)
    }
}

impl Drop for LspClient {
    fn drop(&mut self) {
        let _ = self.process.kill();
    }
}
