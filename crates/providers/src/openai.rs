use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use shared::agent_api::{ChatMessage, ContentPart, CurrentTurn, MessageContent, Role};
use shared::settings::CompletionSettings;
use shared::CompletionError;
use std::env;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

use crate::gateway::CompletionGateway;

static SHARED_HTTP: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(120))
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
});

/// Longest slice of an error body carried into an upstream error.
const ERROR_DETAIL_CHARS: usize = 800;

// ── Request types ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage>,
    max_tokens: u32,
    temperature: f32,
}

/// One entry of the outbound `messages` array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenAIMessage {
    pub role: Role,
    pub content: MessageContent,
}

// ── Response types ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    #[serde(default)]
    message: Option<OpenAIResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorBody {
    #[serde(default)]
    error: Option<OpenAIErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

// ── Conversion ───────────────────────────────────────────────────────

/// Encode the turn being submitted.
///
/// With an image the content becomes a parts array: a text part (only when
/// there is text) followed by the image reference. Without one it stays a
/// plain string.
pub fn encode_current_turn(turn: &CurrentTurn) -> MessageContent {
    let text = turn.text.as_deref().filter(|t| !t.is_empty());
    match turn.image.as_deref().filter(|i| !i.is_empty()) {
        Some(image) => {
            let mut parts = Vec::with_capacity(2);
            if let Some(text) = text {
                parts.push(ContentPart::text(text));
            }
            parts.push(ContentPart::image_ref(image));
            MessageContent::Parts(parts)
        }
        None => MessageContent::Text(text.unwrap_or_default().to_string()),
    }
}

/// Ordered request messages: system instructions, replayed turns, then the
/// current turn.
pub fn build_messages(
    system_instructions: &str,
    prior_turns: &[ChatMessage],
    current_turn: &CurrentTurn,
) -> Vec<OpenAIMessage> {
    let mut out = Vec::with_capacity(prior_turns.len() + 2);
    out.push(OpenAIMessage {
        role: Role::System,
        content: MessageContent::Text(system_instructions.to_string()),
    });
    out.extend(prior_turns.iter().map(|m| OpenAIMessage {
        role: m.role,
        content: MessageContent::Text(m.content.clone()),
    }));
    out.push(OpenAIMessage {
        role: Role::User,
        content: encode_current_turn(current_turn),
    });
    out
}

/// Best description of a failed response: the API's own error message, else
/// the start of the body, else the status reason.
fn upstream_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<OpenAIErrorBody>(body) {
        if let Some(message) = parsed.error.and_then(|e| e.message) {
            if !message.trim().is_empty() {
                return message;
            }
        }
    }
    let detail: String = body.chars().take(ERROR_DETAIL_CHARS).collect();
    if !detail.trim().is_empty() {
        return detail;
    }
    status
        .canonical_reason()
        .unwrap_or("Unknown error")
        .to_string()
}

fn extract_reply(body: &str) -> Result<String, CompletionError> {
    let parsed: OpenAIResponse = serde_json::from_str(body)
        .map_err(|e| CompletionError::malformed(format!("invalid JSON body: {}", e)))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .ok_or_else(|| CompletionError::malformed("response has no choices[0].message.content"))
}

// ── Client ───────────────────────────────────────────────────────────

/// Chat-completions adapter. Holds only configuration; the credential is read
/// from the environment on every call.
pub struct OpenAIGateway {
    http: Client,
    settings: CompletionSettings,
}

impl OpenAIGateway {
    pub fn new(settings: CompletionSettings) -> Self {
        Self {
            http: SHARED_HTTP.clone(),
            settings,
        }
    }

    pub fn with_client(settings: CompletionSettings, http: Client) -> Self {
        Self { http, settings }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    fn api_key(&self) -> Result<String, CompletionError> {
        let var = &self.settings.api_key_env;
        env::var(var)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                CompletionError::configuration(format!(
                    "API key not found. Please set {} in your environment variables.",
                    var
                ))
            })
    }
}

#[async_trait::async_trait]
impl CompletionGateway for OpenAIGateway {
    async fn complete(
        &self,
        system_instructions: &str,
        prior_turns: &[ChatMessage],
        current_turn: &CurrentTurn,
    ) -> Result<String, CompletionError> {
        let key = self.api_key()?;

        let req = OpenAIRequest {
            model: &self.settings.model,
            messages: build_messages(system_instructions, prior_turns, current_turn),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };
        debug!(
            model = %self.settings.model,
            messages = req.messages.len(),
            with_image = current_turn.image.is_some(),
            "sending chat completion request"
        );

        let resp = self
            .http
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", key))
            .header("Content-Type", "application/json")
            .json(&req)
            .send()
            .await
            .map_err(|e| CompletionError::upstream(None, format!("request failed: {}", e)))?;

        let status = resp.status();
        let body = resp.text().await;

        if !status.is_success() {
            let body = body.unwrap_or_default();
            return Err(CompletionError::upstream(
                Some(status.as_u16()),
                upstream_message(status, &body),
            ));
        }

        let body = body
            .map_err(|e| CompletionError::malformed(format!("failed to read body: {}", e)))?;
        extract_reply(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::mpsc;

    struct Captured {
        authorization: String,
        path: String,
        body: serde_json::Value,
    }

    /// One-shot stub backend: answers the first request with `status`/`body`
    /// and reports what it received.
    fn spawn_stub(status: u16, body: &'static str) -> (String, mpsc::Receiver<Captured>) {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            if let Ok(mut request) = server.recv() {
                let mut raw = String::new();
                request.as_reader().read_to_string(&mut raw).unwrap();
                let authorization = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Authorization"))
                    .map(|h| h.value.as_str().to_string())
                    .unwrap_or_default();
                let _ = tx.send(Captured {
                    authorization,
                    path: request.url().to_string(),
                    body: serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null),
                });
                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .unwrap();
                let response = tiny_http::Response::from_string(body)
                    .with_status_code(status)
                    .with_header(header);
                let _ = request.respond(response);
            }
        });
        (format!("http://{}", addr), rx)
    }

    fn settings(base_url: &str, key_env: &str) -> CompletionSettings {
        CompletionSettings {
            base_url: base_url.to_string(),
            api_key_env: key_env.to_string(),
            ..CompletionSettings::default()
        }
    }

    /// Gateway talking straight to the local stub, ignoring any proxy setup.
    fn gateway(base_url: &str, key_env: &str) -> OpenAIGateway {
        let http = Client::builder().no_proxy().build().unwrap();
        OpenAIGateway::with_client(settings(base_url, key_env), http)
    }

    #[test]
    fn test_encode_text_only_is_plain_string() {
        let content = encode_current_turn(&CurrentTurn::text("Merhaba"));
        assert_eq!(content, MessageContent::Text("Merhaba".into()));
    }

    #[test]
    fn test_encode_caption_and_image_is_two_parts() {
        let turn = CurrentTurn::text("Bu görselde ne görüyorsun?")
            .with_image("data:image/png;base64,AAA=");
        let json = serde_json::to_value(encode_current_turn(&turn)).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"type": "text", "text": "Bu görselde ne görüyorsun?"},
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAA="}}
            ])
        );
    }

    #[test]
    fn test_encode_image_without_text_has_only_image_part() {
        let turn = CurrentTurn {
            text: None,
            image: Some("https://example.com/kumas.jpg".into()),
        };
        match encode_current_turn(&turn) {
            MessageContent::Parts(parts) => {
                assert_eq!(parts, vec![ContentPart::image_ref("https://example.com/kumas.jpg")]);
            }
            other => panic!("expected parts, got {:?}", other),
        }
    }

    #[test]
    fn test_build_messages_order() {
        let prior = vec![ChatMessage::user("Merhaba"), ChatMessage::assistant("Hoş geldiniz")];
        let messages = build_messages("persona", &prior, &CurrentTurn::text("Nasılsın?"));
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(messages[0].content, MessageContent::Text("persona".into()));
        assert_eq!(messages[3].content, MessageContent::Text("Nasılsın?".into()));
    }

    #[test]
    fn test_upstream_message_prefers_api_error() {
        let msg = upstream_message(
            StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"Incorrect API key provided"}}"#,
        );
        assert_eq!(msg, "Incorrect API key provided");
        assert_eq!(upstream_message(StatusCode::BAD_GATEWAY, "   "), "Bad Gateway");
        assert_eq!(upstream_message(StatusCode::BAD_GATEWAY, "proxy down"), "proxy down");
    }

    #[tokio::test]
    async fn test_missing_credential_fails_before_network() {
        let gateway = gateway("http://127.0.0.1:9", "ONESEARCH_TEST_KEY_NEVER_SET");
        let err = gateway
            .complete("persona", &[], &CurrentTurn::text("Merhaba"))
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_blank_credential_is_missing() {
        std::env::set_var("ONESEARCH_TEST_KEY_BLANK", "   ");
        let gateway = gateway("http://127.0.0.1:9", "ONESEARCH_TEST_KEY_BLANK");
        let err = gateway
            .complete("persona", &[], &CurrentTurn::text("Merhaba"))
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_success_returns_reply_verbatim() {
        std::env::set_var("ONESEARCH_TEST_KEY_OK", "sk-test");
        let (base, rx) = spawn_stub(
            200,
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"  Hoş geldiniz\n"}}]}"#,
        );
        let gateway = gateway(&base, "ONESEARCH_TEST_KEY_OK");

        let prior = vec![ChatMessage::user("önceki"), ChatMessage::assistant("cevap")];
        let reply = gateway
            .complete("persona", &prior, &CurrentTurn::text("Merhaba"))
            .await
            .unwrap();
        assert_eq!(reply, "  Hoş geldiniz\n");

        let captured = rx.recv().unwrap();
        assert_eq!(captured.authorization, "Bearer sk-test");
        assert_eq!(captured.path, "/v1/chat/completions");
        assert_eq!(captured.body["model"], "gpt-4o");
        assert_eq!(captured.body["max_tokens"], 1000);
        let temperature = captured.body["temperature"].as_f64().unwrap();
        assert!((temperature - 0.7).abs() < 1e-6);
        let messages = captured.body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "persona");
        assert_eq!(messages[3], serde_json::json!({"role": "user", "content": "Merhaba"}));
    }

    #[tokio::test]
    async fn test_image_turn_sent_as_parts() {
        std::env::set_var("ONESEARCH_TEST_KEY_IMAGE", "sk-test");
        let (base, rx) = spawn_stub(200, r#"{"choices":[{"message":{"content":"Bir kumaş"}}]}"#);
        let gateway = gateway(&base, "ONESEARCH_TEST_KEY_IMAGE");

        let turn = CurrentTurn::text("Bu ne?").with_image("data:image/png;base64,AAA=");
        gateway.complete("persona", &[], &turn).await.unwrap();

        let captured = rx.recv().unwrap();
        let current = &captured.body["messages"][1];
        assert_eq!(current["content"][0]["type"], "text");
        assert_eq!(current["content"][1]["image_url"]["url"], "data:image/png;base64,AAA=");
    }

    #[tokio::test]
    async fn test_error_status_is_upstream_with_message() {
        std::env::set_var("ONESEARCH_TEST_KEY_500", "sk-test");
        let (base, _rx) = spawn_stub(500, r#"{"error":{"message":"server error"}}"#);
        let gateway = gateway(&base, "ONESEARCH_TEST_KEY_500");

        let err = gateway
            .complete("persona", &[], &CurrentTurn::text("Merhaba"))
            .await
            .unwrap_err();
        assert_eq!(err, CompletionError::upstream(Some(500), "server error"));
    }

    #[tokio::test]
    async fn test_missing_content_is_malformed() {
        std::env::set_var("ONESEARCH_TEST_KEY_EMPTY_CHOICES", "sk-test");
        let (base, _rx) = spawn_stub(200, r#"{"choices":[]}"#);
        let gateway = gateway(&base, "ONESEARCH_TEST_KEY_EMPTY_CHOICES");

        let err = gateway
            .complete("persona", &[], &CurrentTurn::text("Merhaba"))
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_non_json_success_is_malformed() {
        std::env::set_var("ONESEARCH_TEST_KEY_HTML", "sk-test");
        let (base, _rx) = spawn_stub(200, "<html>maintenance</html>");
        let gateway = gateway(&base, "ONESEARCH_TEST_KEY_HTML");

        let err = gateway
            .complete("persona", &[], &CurrentTurn::text("Merhaba"))
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_upstream_without_status() {
        std::env::set_var("ONESEARCH_TEST_KEY_DOWN", "sk-test");
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let gateway = gateway(&format!("http://127.0.0.1:{}", port), "ONESEARCH_TEST_KEY_DOWN");

        let err = gateway
            .complete("persona", &[], &CurrentTurn::text("Merhaba"))
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Upstream { status: None, .. }));
    }
}
