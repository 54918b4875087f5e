//! Router tests over in-memory stores and scripted model clients

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use tutor_config::{AgentCatalog, Settings};
use tutor_core::{
    AudioClip, Error, GenerateRequest, GenerateResponse, LanguageModel, Result, SpeechToText,
    TextToSpeech,
};
use tutor_server::{create_router, AppState};

struct ScriptedLlm;

#[async_trait]
impl LanguageModel for ScriptedLlm {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        if request.messages.iter().any(|m| m.content.contains("#fail")) {
            return Err(Error::Llm("scripted outage".to_string()));
        }
        let system = &request.messages[0].content;
        let reply = if system.contains("classifier") {
            r#"{"selected_agent": "qna", "confidence": 0.8, "reasoning": "question"}"#
        } else if system.contains("transcript of a") {
            "TITLE: Animals\nSUMMARY: We talked about animals."
        } else if system.contains("friendly opening") {
            "Hi Noa! Ask me anything."
        } else {
            "Great question, Noa. A cat says meow!"
        };
        Ok(GenerateResponse::text(reply))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

struct ToneTts;

#[async_trait]
impl TextToSpeech for ToneTts {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        Ok(text.as_bytes().to_vec())
    }

    fn model_name(&self) -> &str {
        "tone"
    }
}

struct ScriptedStt;

#[async_trait]
impl SpeechToText for ScriptedStt {
    async fn transcribe(&self, clip: &AudioClip) -> Result<String> {
        if clip.bytes == b"boom" {
            return Err(Error::Stt("upstream rejected audio".to_string()));
        }
        Ok(format!("I goes to school ({}, {})", clip.file_name, clip.mime_type))
    }

    fn model_name(&self) -> &str {
        "scripted-whisper"
    }
}

fn app() -> Router {
    let state = AppState::in_memory(
        Settings::default(),
        AgentCatalog::builtin().unwrap(),
        Arc::new(ScriptedLlm),
        Arc::new(ToneTts),
        Arc::new(ScriptedStt),
    )
    .unwrap();
    create_router(state)
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

const BOUNDARY: &str = "tutor-test-boundary";

/// One-part multipart upload; `None` content type omits the header
async fn upload(
    app: &Router,
    field: &str,
    file_name: &str,
    content_type: Option<&str>,
    data: &[u8],
) -> (StatusCode, Value) {
    let mut body = format!(
        "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
        BOUNDARY, field, file_name
    )
    .into_bytes();
    if let Some(content_type) = content_type {
        body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
    }
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/speech/transcribe")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn create_user(app: &Router) -> String {
    let (status, user) = call(
        app,
        Method::POST,
        "/api/users",
        Some(json!({"email": "noa@example.com", "name": "Noa Cohen", "auth_id": "auth-noa"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    user["id"].as_str().unwrap().to_string()
}

async fn start(app: &Router, user_id: &str, conversation_type: &str) -> Value {
    let (status, started) = call(
        app,
        Method::POST,
        "/api/conversations/start",
        Some(json!({"user_id": user_id, "title": "Practice", "type": conversation_type})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    started
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["catalog_version"], 3);
    assert_eq!(body["phrase_cache"]["capacity"], 100);
    assert_eq!(body["models"]["tts"], "tts-1");
    assert_eq!(body["models"]["stt"], "scripted-whisper");
}

#[tokio::test]
async fn test_metrics_disabled_without_recorder() {
    let app = app();
    let (status, _) = call(&app, Method::GET, "/metrics", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_user_upsert_is_idempotent() {
    let app = app();
    let first = create_user(&app).await;
    let second = create_user(&app).await;
    assert_eq!(first, second);

    let (status, user) = call(&app, Method::GET, &format!("/api/users/{}", first), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["name"], "Noa Cohen");

    let (status, _) = call(&app, Method::GET, "/api/users/nobody", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_conversation_lifecycle() {
    let app = app();
    let user_id = create_user(&app).await;

    let started = start(&app, &user_id, "QnA").await;
    assert_eq!(started["conversation"]["type"], "QnA");
    assert_eq!(started["conversation"]["theme"], "qna");
    assert_eq!(started["opening"]["text"], "Hi Noa! Ask me anything.");
    assert!(started["opening"]["audio_url"]
        .as_str()
        .unwrap()
        .starts_with("data:audio/mp3;base64,"));
    let conversation_id = started["conversation"]["id"].as_str().unwrap().to_string();

    // One student turn
    let (status, processed) = call(
        &app,
        Method::POST,
        "/api/speech/process",
        Some(json!({
            "text": "What sound does a cat make?",
            "user_id": user_id,
            "conversation_id": conversation_id,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(processed["success"], true);
    assert_eq!(processed["response"]["text"], "Great question, Noa. A cat says meow!");
    assert_eq!(processed["response"]["metadata"]["agent"], "qna");
    assert_eq!(processed["messages"]["student"]["sender"], "student");
    assert_eq!(processed["messages"]["tutor"]["metadata"]["agent"], "qna");
    let tutor_message_id = processed["messages"]["tutor"]["id"].as_str().unwrap().to_string();

    // Opening + student + tutor, oldest first
    let (_, messages) = call(
        &app,
        Method::GET,
        &format!("/api/messages/conversation/{}", conversation_id),
        None,
    )
    .await;
    let messages = messages.as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0]["text"], "Hi Noa! Ask me anything.");
    assert_eq!(messages[1]["sender"], "student");

    // Feedback
    let feedback_uri = format!("/api/messages/{}/feedback", tutor_message_id);
    let (status, liked) = call(
        &app,
        Method::PATCH,
        &feedback_uri,
        Some(json!({"liked": true, "disliked": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(liked["feedback"]["liked"], true);

    let (status, _) = call(
        &app,
        Method::PATCH,
        &feedback_uri,
        Some(json!({"liked": true, "disliked": true})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Active conversation, then end it
    let (status, active) = call(
        &app,
        Method::GET,
        &format!("/api/conversations/active/{}", user_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(active["id"], conversation_id.as_str());

    let (status, ended) = call(
        &app,
        Method::POST,
        &format!("/api/conversations/{}/end", conversation_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ended["status"], "completed");
    assert_eq!(ended["title"], "Animals");
    assert_eq!(ended["summary"], "We talked about animals.");

    let (status, _) = call(
        &app,
        Method::GET,
        &format!("/api/conversations/active/{}", user_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, listed) = call(
        &app,
        Method::GET,
        &format!("/api/conversations/user/{}", user_id),
        None,
    )
    .await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_starting_again_completes_previous() {
    let app = app();
    let user_id = create_user(&app).await;

    let first = start(&app, &user_id, "Free").await;
    let second = start(&app, &user_id, "Teach").await;

    let first_id = first["conversation"]["id"].as_str().unwrap();
    let (_, previous) = call(&app, Method::GET, &format!("/api/conversations/{}", first_id), None).await;
    assert_eq!(previous["status"], "completed");
    assert_eq!(previous["is_active"], false);

    let (_, active) = call(
        &app,
        Method::GET,
        &format!("/api/conversations/active/{}", user_id),
        None,
    )
    .await;
    assert_eq!(active["id"], second["conversation"]["id"]);
}

#[tokio::test]
async fn test_request_validation() {
    let app = app();
    let user_id = create_user(&app).await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/speech/process",
        Some(json!({"text": "  ", "user_id": user_id, "conversation_id": "c1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/speech/process",
        Some(json!({"text": "hello", "user_id": user_id, "conversation_id": "missing"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/conversations/start",
        Some(json!({"user_id": "ghost", "title": "Hi", "type": "Free"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/conversations/missing/end",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_conversation_removes_messages() {
    let app = app();
    let user_id = create_user(&app).await;
    let started = start(&app, &user_id, "Free").await;
    let conversation_id = started["conversation"]["id"].as_str().unwrap().to_string();

    let (status, _) = call(
        &app,
        Method::DELETE,
        &format!("/api/conversations/{}", conversation_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(
        &app,
        Method::GET,
        &format!("/api/conversations/{}", conversation_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, messages) = call(
        &app,
        Method::GET,
        &format!("/api/messages/conversation/{}", conversation_id),
        None,
    )
    .await;
    assert!(messages.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_speech_maintenance_routes() {
    let app = app();
    let user_id = create_user(&app).await;
    start(&app, &user_id, "Free").await;

    let (_, health) = call(&app, Method::GET, "/health", None).await;
    assert!(health["phrase_cache"]["entries"].as_u64().unwrap() > 0);

    let (status, body) = call(&app, Method::DELETE, "/api/speech/cache", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, health) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(health["phrase_cache"]["entries"], 0);

    let (status, body) = call(&app, Method::POST, "/api/speech/reset/any-id", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_transcribe_upload() {
    let app = app();

    let (status, body) = upload(&app, "audio", "take1.ogg", Some("audio/ogg"), b"OggS").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["text"], "I goes to school (take1.ogg, audio/ogg)");

    // Browser defaults fill in a missing type
    let (status, body) = upload(&app, "audio", "blob", None, b"\x1a\x45").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "I goes to school (blob, audio/webm)");
}

#[tokio::test]
async fn test_transcribe_requires_audio() {
    let app = app();

    let (status, body) = upload(&app, "file", "take1.webm", Some("audio/webm"), b"data").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Invalid request: audio file is required");

    let (status, _) = upload(&app, "audio", "empty.webm", Some("audio/webm"), b"").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = upload(&app, "audio", "bad.webm", Some("audio/webm"), b"boom").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_model_outage_returns_apology() {
    let app = app();
    let user_id = create_user(&app).await;
    let started = start(&app, &user_id, "Free").await;
    let conversation_id = started["conversation"]["id"].as_str().unwrap();

    let (status, processed) = call(
        &app,
        Method::POST,
        "/api/speech/process",
        Some(json!({
            "text": "#fail please",
            "user_id": user_id,
            "conversation_id": conversation_id,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(processed["success"], true);
    assert!(processed["response"].get("metadata").is_none());
    assert!(processed["messages"]["tutor"].get("metadata").map_or(true, Value::is_null));
    assert!(!processed["response"]["text"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_messages_by_user_and_manual_create() {
    let app = app();
    let user_id = create_user(&app).await;
    let started = start(&app, &user_id, "Free").await;
    let conversation_id = started["conversation"]["id"].as_str().unwrap();

    let (status, created) = call(
        &app,
        Method::POST,
        "/api/messages",
        Some(json!({
            "user_id": user_id,
            "conversation_id": conversation_id,
            "sender": "student",
            "text": "  I has a dog  ",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["text"], "I has a dog");
    assert_eq!(created["sender"], "student");

    // Opening greeting, then the stored note
    let (status, listed) = call(&app, Method::GET, &format!("/api/messages/user/{}", user_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[1]["id"], created["id"]);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/messages",
        Some(json!({
            "user_id": user_id,
            "conversation_id": "missing",
            "sender": "tutor",
            "text": "hello",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/messages",
        Some(json!({
            "user_id": user_id,
            "conversation_id": conversation_id,
            "sender": "student",
            "text": " ",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rename_user() {
    let app = app();
    let user_id = create_user(&app).await;
    let uri = format!("/api/users/{}", user_id);

    let (status, renamed) = call(&app, Method::PATCH, &uri, Some(json!({"name": " Maya "}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["name"], "Maya");

    let (_, fetched) = call(&app, Method::GET, &uri, None).await;
    assert_eq!(fetched["name"], "Maya");

    let (status, _) = call(&app, Method::PATCH, &uri, Some(json!({"name": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, Method::PATCH, "/api/users/nobody", Some(json!({"name": "Maya"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
