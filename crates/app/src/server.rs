//! HTTP chat endpoint.
//!
//! `POST /api/chat` with `{"message": "..."}` answers one stateless turn with
//! the generic assistant persona. No history is kept between requests.
//! A pool of worker threads shares one listener, so a slow upstream call only
//! ties up its own worker.

use anyhow::{anyhow, Context, Result};
use chat_host::get_system_instructions;
use providers::{CompletionGateway, OpenAIGateway};
use serde_json::{json, Value};
use shared::agent_api::CurrentTurn;
use shared::settings::{ChatSettings, ProfileKind};
use std::io::Read;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tiny_http::{Header, Method, Request, Response, Server};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use uuid::Uuid;

const CHAT_PATH: &str = "/api/chat";
const INVALID_MESSAGE: &str = "Geçerli bir mesaj gerekli";
const GENERIC_FAILURE: &str = "Bir hata oluştu. Lütfen tekrar deneyin.";
const BODY_TOO_LARGE: &str = "İstek gövdesi çok büyük";

/// Largest request body read into memory.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Stateless single-turn chat handler
pub struct ChatEndpoint {
    gateway: Arc<dyn CompletionGateway>,
    system_instructions: &'static str,
    runtime: Handle,
}

impl ChatEndpoint {
    pub fn new(gateway: Arc<dyn CompletionGateway>, runtime: Handle) -> Self {
        Self {
            gateway,
            system_instructions: get_system_instructions(ProfileKind::Api),
            runtime,
        }
    }

    /// Route one request. Returns the status code and JSON body to send.
    ///
    /// Blocks on the gateway call, so it must not run on a runtime worker.
    pub fn respond(&self, method: &Method, path: &str, body: &str) -> (u16, Value) {
        let path = path.split('?').next().unwrap_or(path);
        if path != CHAT_PATH {
            return (404, json!({ "error": "Bulunamadı" }));
        }
        if *method != Method::Post {
            return (405, json!({ "error": "Yalnızca POST desteklenir" }));
        }

        let message = match extract_message(body) {
            Some(message) => message,
            None => return (400, json!({ "error": INVALID_MESSAGE })),
        };

        let current = CurrentTurn::text(message);
        let result = self.runtime.block_on(self.gateway.complete(
            self.system_instructions,
            &[],
            &current,
        ));

        match result {
            Ok(reply) => (200, json!({ "message": reply })),
            Err(e) => {
                warn!(kind = e.kind(), status = ?e.status(), error = %e, "chat request failed");
                (500, json!({ "error": GENERIC_FAILURE }))
            }
        }
    }

    fn handle(&self, mut request: Request) {
        let request_id = Uuid::new_v4();
        let method = request.method().clone();
        let path = request.url().to_string();

        let (status, payload) = match read_body(request.body_length(), request.as_reader()) {
            Ok(body) => self.respond(&method, &path, &body),
            Err((status, payload)) => {
                warn!(%request_id, status, "rejected request body");
                (status, payload)
            }
        };

        info!(%request_id, %method, path = %path, status, "handled request");
        if let Err(e) = request.respond(json_response(status, &payload)) {
            warn!(%request_id, error = %e, "failed to send response");
        }
    }
}

/// Request body as text, reading at most [`MAX_BODY_BYTES`]. Oversized bodies
/// are rejected with 413, unreadable or non-UTF-8 ones with 400.
fn read_body(declared_len: Option<usize>, reader: impl Read) -> Result<String, (u16, Value)> {
    let too_large = || (413, json!({ "error": BODY_TOO_LARGE }));
    let invalid = || (400, json!({ "error": INVALID_MESSAGE }));
    if declared_len.is_some_and(|len| len > MAX_BODY_BYTES) {
        return Err(too_large());
    }

    let mut raw = Vec::new();
    reader
        .take(MAX_BODY_BYTES as u64 + 1)
        .read_to_end(&mut raw)
        .map_err(|e| {
            debug!(error = %e, "could not read request body");
            invalid()
        })?;
    if raw.len() > MAX_BODY_BYTES {
        return Err(too_large());
    }
    String::from_utf8(raw).map_err(|_| invalid())
}

/// The `message` field, if the body is a JSON object with a non-blank string there.
fn extract_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let message = value.get("message")?.as_str()?;
    if message.trim().is_empty() {
        return None;
    }
    Some(message.to_string())
}

fn json_response(status: u16, payload: &Value) -> Response<std::io::Cursor<Vec<u8>>> {
    let mut response = Response::from_string(payload.to_string()).with_status_code(status);
    let content_type = &b"application/json; charset=utf-8"[..];
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], content_type) {
        response = response.with_header(header);
    }
    response
}

/// Start `workers` threads (at least one) answering requests from `server`.
///
/// A worker stops when `recv` fails, either because the listener died or
/// because `Server::unblock` was called, and passes the stop on to the next
/// idle worker, so one `unblock` shuts the whole pool down.
pub fn spawn_workers(
    server: Arc<Server>,
    endpoint: Arc<ChatEndpoint>,
    workers: usize,
) -> Result<Vec<JoinHandle<()>>> {
    (0..workers.max(1))
        .map(|id| {
            let server = Arc::clone(&server);
            let endpoint = Arc::clone(&endpoint);
            thread::Builder::new()
                .name(format!("chat-worker-{}", id))
                .spawn(move || loop {
                    match server.recv() {
                        Ok(request) => endpoint.handle(request),
                        Err(e) => {
                            debug!(worker = id, error = %e, "request worker stopping");
                            server.unblock();
                            break;
                        }
                    }
                })
                .context("failed to start request worker")
        })
        .collect()
}

/// Serve until the process is stopped.
pub fn run(settings: &ChatSettings, runtime: Handle) -> Result<()> {
    let server = Server::http(settings.bind_address.as_str())
        .map_err(|e| anyhow!("could not listen on {}: {}", settings.bind_address, e))?;
    let gateway = Arc::new(OpenAIGateway::new(settings.completion.clone()));
    let endpoint = Arc::new(ChatEndpoint::new(gateway, runtime));

    info!(
        address = %settings.bind_address,
        workers = settings.server_workers,
        "serving {}",
        CHAT_PATH
    );
    for worker in spawn_workers(Arc::new(server), endpoint, settings.server_workers)? {
        if worker.join().is_err() {
            warn!("request worker panicked");
        }
    }
    Ok(())
}
