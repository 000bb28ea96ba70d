use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use slop_core::config::{ClientConfig, EndpointConfig, EndpointKind};
use slop_core::prompts::{OptimizationMode, PromptKind, StandardTemplates};
use slop_core::session::{ChatMessage, Role};
use slop_interaction::{
    CompletionClient, CompletionError, CompletionStream, HttpMethod, HttpTransport, TransportRequest,
    TransportResponse,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

struct Scripted {
    status: u16,
    chunks: Vec<String>,
    hold_open: bool,
}

/// Records every request and answers from a queue of scripted responses.
#[derive(Default)]
struct ScriptedTransport {
    requests: Mutex<Vec<TransportRequest>>,
    responses: Mutex<VecDeque<Scripted>>,
}

impl ScriptedTransport {
    fn push(&self, status: u16, chunks: Vec<String>, hold_open: bool) {
        self.responses.lock().unwrap().push_back(Scripted {
            status,
            chunks,
            hold_open,
        });
    }

    fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, CompletionError> {
        self.requests.lock().unwrap().push(request);
        let scripted = self.responses.lock().unwrap().pop_front().unwrap_or(Scripted {
            status: 200,
            chunks: vec!["data: [DONE]\n\n".to_string()],
            hold_open: false,
        });

        let chunks = stream::iter(
            scripted
                .chunks
                .into_iter()
                .map(|c| Ok::<_, CompletionError>(c.into_bytes())),
        );
        let body = if scripted.hold_open {
            chunks.chain(stream::pending()).boxed()
        } else {
            chunks.boxed()
        };

        Ok(TransportResponse {
            status: scripted.status,
            body,
        })
    }
}

fn frame(content: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({"choices": [{"delta": {"content": content}}]})
    )
}

fn sse(parts: &[&str]) -> Vec<String> {
    let mut chunks: Vec<String> = parts.iter().map(|p| frame(p)).collect();
    chunks.push("data: [DONE]\n\n".to_string());
    chunks
}

fn client_with(transport: Arc<ScriptedTransport>) -> CompletionClient {
    let config = ClientConfig::with_primary(EndpointConfig::new("http://primary:1234/v1/", "big-model", "pk"));
    CompletionClient::new(transport, config)
}

async fn drain(mut stream: CompletionStream) -> (String, Option<CompletionError>) {
    let mut text = String::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(delta) => text.push_str(&delta),
            Err(e) => return (text, Some(e)),
        }
    }
    (text, None)
}

fn messages_of(request: &TransportRequest) -> Vec<ChatMessage> {
    let body = request.body.clone().unwrap();
    serde_json::from_value(body["messages"].clone()).unwrap()
}

#[tokio::test]
async fn test_optimize_streams_deltas_in_order() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.push(200, sse(&["---\nname: x\n", "---\n", "Body"]), false);
    let client = client_with(transport.clone());

    let (text, err) = drain(client.optimize("write a story", OptimizationMode::Prompts)).await;
    assert_eq!(text, "---\nname: x\n---\nBody");
    assert!(err.is_none());

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(request.url, "http://primary:1234/v1/chat/completions");
    assert_eq!(request.bearer.as_deref(), Some("pk"));

    let body = request.body.clone().unwrap();
    assert_eq!(body["model"], "big-model");
    assert_eq!(body["temperature"], 0.7);
    assert_eq!(body["stream"], true);

    let messages = messages_of(request);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);
    assert!(messages[0].content.contains("write a story"));
    assert!(!messages[0].content.contains("{{originalPrompt}}"));
}

#[tokio::test]
async fn test_skill_mode_uses_skill_template() {
    let transport = Arc::new(ScriptedTransport::default());
    let client = client_with(transport.clone());

    drain(client.optimize("a code reviewer", OptimizationMode::Skills)).await;
    let messages = messages_of(&transport.requests()[0]);
    assert!(messages[0].content.contains("a code reviewer"));
    assert!(!messages[0].content.contains("{{BEST_PRACTICES}}"));
    assert_ne!(
        messages[0].content,
        StandardTemplates::default_template(PromptKind::Optimize).replace("{{originalPrompt}}", "a code reviewer")
    );
}

#[tokio::test]
async fn test_chat_falls_back_to_primary_endpoint() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.push(200, sse(&["Hello", " there"]), false);
    let client = client_with(transport.clone());

    let (text, err) = drain(client.chat("hi", None, None)).await;
    assert_eq!(text, "Hello there");
    assert!(err.is_none());

    let request = &transport.requests()[0];
    assert_eq!(request.url, "http://primary:1234/v1/chat/completions");
    assert_eq!(request.bearer.as_deref(), Some("pk"));
    assert_eq!(request.body.as_ref().unwrap()["model"], "big-model");
}

#[tokio::test]
async fn test_chat_uses_chat_endpoint_fields_when_set() {
    let transport = Arc::new(ScriptedTransport::default());
    let client = client_with(transport.clone());
    client
        .update_config(EndpointKind::Chat, EndpointConfig::new("", "small-model", ""))
        .await
        .unwrap();

    drain(client.chat("hi", None, None)).await;
    let request = &transport.requests()[0];
    assert_eq!(request.url, "http://primary:1234/v1/chat/completions");
    assert_eq!(request.body.as_ref().unwrap()["model"], "small-model");
}

#[tokio::test]
async fn test_chat_records_reply_without_context_block() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.push(200, sse(&["Sure."]), false);
    let client = client_with(transport.clone());

    drain(client.chat("make it shorter", Some("idea"), Some("RESULT TEXT"))).await;

    assert_eq!(
        client.transcript(),
        vec![ChatMessage::user("make it shorter"), ChatMessage::assistant("Sure.")]
    );

    let sent = messages_of(&transport.requests()[0]);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].content.contains("RESULT TEXT"));
    assert!(sent[0].content.ends_with("\n\nmake it shorter"));
}

#[tokio::test]
async fn test_chat_with_blank_result_uses_fallback_context() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.push(200, sse(&["Paste a result first."]), false);
    let client = client_with(transport.clone());

    drain(client.chat("is this good?", Some("idea"), Some("   "))).await;

    let sent = messages_of(&transport.requests()[0]);
    assert_eq!(
        sent[0].content,
        format!(
            "{}\n\nis this good?",
            StandardTemplates::default_template(PromptKind::ChatFallback)
        )
    );
}

#[tokio::test]
async fn test_new_call_aborts_active_chat() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.push(200, vec![frame("partial")], true);
    transport.push(200, sse(&["optimized"]), false);
    let client = client_with(transport.clone());

    let mut chat = client.chat("hello", None, None);
    assert_eq!(chat.next().await, Some(Ok("partial".to_string())));

    let optimize = client.optimize("idea", OptimizationMode::Prompts);
    assert_eq!(chat.next().await, Some(Err(CompletionError::Aborted)));
    assert_eq!(chat.next().await, None);

    let (text, err) = drain(optimize).await;
    assert_eq!(text, "optimized");
    assert!(err.is_none());
    assert_eq!(client.transcript(), vec![ChatMessage::user("hello")]);
}

#[tokio::test]
async fn test_cancel_is_idempotent() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.push(200, vec![frame("a")], true);
    let client = client_with(transport);

    let mut stream = client.chat("hello", None, None);
    assert!(client.is_streaming());
    client.cancel();
    client.cancel();

    assert_eq!(stream.next().await, Some(Err(CompletionError::Aborted)));
    assert!(!client.is_streaming());
}

#[tokio::test]
async fn test_http_error_carries_status_and_body() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.push(500, vec!["model not loaded".to_string()], false);
    let client = client_with(transport);

    let (text, err) = drain(client.optimize("x", OptimizationMode::Prompts)).await;
    assert!(text.is_empty());
    let err = err.unwrap();
    assert_eq!(err, CompletionError::http(500, "model not loaded"));
    assert_eq!(err.to_string(), "API Error: 500 - model not loaded");
}

#[tokio::test]
async fn test_refine_message_roles() {
    let transport = Arc::new(ScriptedTransport::default());
    let client = client_with(transport.clone());
    let history = vec![ChatMessage::user("shorter"), ChatMessage::assistant("ok")];

    drain(client.refine_with_history("idea", "current", &history, OptimizationMode::Prompts)).await;
    drain(client.refine_without_history("idea", "current", OptimizationMode::Prompts)).await;

    let requests = transport.requests();
    let with_history = messages_of(&requests[0]);
    assert_eq!(with_history.len(), 1);
    assert_eq!(with_history[0].role, Role::System);
    assert!(with_history[0].content.contains("user: shorter\nassistant: ok"));
    assert!(with_history[0].content.contains("current"));

    let without_history = messages_of(&requests[1]);
    assert_eq!(without_history.len(), 1);
    assert_eq!(without_history[0].role, Role::User);
    assert!(!without_history[0].content.contains("{{currentResult}}"));
}

#[tokio::test]
async fn test_template_override_applies_to_prompts_mode() {
    let transport = Arc::new(ScriptedTransport::default());
    let client = client_with(transport.clone());
    client
        .set_template_override(PromptKind::Optimize, Some("Improve: {{ originalPrompt }}".to_string()))
        .await
        .unwrap();
    assert!(client.is_template_overridden(PromptKind::Optimize));

    drain(client.optimize("my idea", OptimizationMode::Prompts)).await;
    assert_eq!(messages_of(&transport.requests()[0])[0].content, "Improve: my idea");
}

#[tokio::test]
async fn test_list_models() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.push(
        200,
        vec![r#"{"object":"list","data":[{"id":"qwen","object":"model"},{"id":"llama"}]}"#.to_string()],
        false,
    );
    transport.push(401, vec!["unauthorized".to_string()], false);
    transport.push(200, vec![r#"{"object":"list"}"#.to_string()], false);
    let client = client_with(transport.clone());

    let models = client.list_models(None).await.unwrap();
    let ids: Vec<&str> = models.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["qwen", "llama"]);
    assert_eq!(models[0].extra["object"], "model");

    let err = client.list_models(None).await.unwrap_err();
    assert_eq!(err, CompletionError::http(401, "unauthorized"));

    let probe = EndpointConfig::new("http://other/v1", "m", "");
    assert!(client.list_models(Some(&probe)).await.unwrap().is_empty());

    let requests = transport.requests();
    assert_eq!(requests[0].method, HttpMethod::Get);
    assert_eq!(requests[0].url, "http://primary:1234/v1/models");
    assert_eq!(requests[2].url, "http://other/v1/models");
    assert_eq!(requests[2].bearer, None);
}

#[tokio::test]
async fn test_primary_config_requires_url_and_model() {
    let client = client_with(Arc::new(ScriptedTransport::default()));
    let err = client
        .update_config(EndpointKind::Primary, EndpointConfig::new("http://x/v1", "", ""))
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(client.config().primary.model, "big-model");
}
