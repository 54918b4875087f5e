//! HTTP Endpoints
//!
//! REST API for users, conversations, messages and the speech turn loop.

use std::time::{Duration, Instant};

use axum::{
    extract::{DefaultBodyLimit, Json, Multipart, Path, State},
    http::{HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use tutor_agent::TutorResponse;
use tutor_core::{AudioClip, Conversation, ConversationMessage, ConversationType, Feedback, Sender, User};

use crate::metrics::{self, metrics_handler};
use crate::state::AppState;
use crate::ServerError;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let config = state.get_config();
    let cors_layer = build_cors_layer(&config.server.cors_origins, config.server.cors_enabled);
    let timeout = Duration::from_secs(config.server.timeout_seconds);
    let upload_limit = config.stt.max_upload_bytes;

    Router::new()
        // Users
        .route("/api/users", post(upsert_user))
        .route("/api/users/:id", get(get_user).patch(rename_user))
        // Conversations
        .route("/api/conversations/start", post(start_conversation))
        .route("/api/conversations/user/:user_id", get(list_user_conversations))
        .route("/api/conversations/active/:user_id", get(get_active_conversation))
        .route(
            "/api/conversations/:id",
            get(get_conversation).delete(delete_conversation),
        )
        .route("/api/conversations/:id/end", post(end_conversation))
        // Speech turn loop
        .route("/api/speech/process", post(process_speech))
        .route(
            "/api/speech/transcribe",
            post(transcribe_speech).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/speech/reset/:conversation_id", post(reset_conversation))
        .route("/api/speech/cache", delete(clear_audio_cache))
        // Messages
        .route("/api/messages", post(create_message))
        .route("/api/messages/conversation/:id", get(list_conversation_messages))
        .route("/api/messages/user/:user_id", get(list_user_messages))
        .route("/api/messages/:id/feedback", patch(update_feedback))
        .route("/api/messages/:id", delete(delete_message))
        // Health check
        .route("/health", get(health_check))
        // Prometheus metrics
        .route("/metrics", get(metrics_handler))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Build CORS layer from configured origins
///
/// - `enabled == false` allows every origin (development only)
/// - no usable origins falls back to `http://localhost:3000`
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins");
        return CorsLayer::permissive();
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    let methods = [
        Method::GET,
        Method::POST,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];

    if parsed_origins.is_empty() {
        tracing::info!("No usable CORS origins configured, defaulting to localhost:3000");
        return CorsLayer::new()
            .allow_origin(HeaderValue::from_static("http://localhost:3000"))
            .allow_methods(methods)
            .allow_headers(Any);
    }

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods(methods)
        .allow_headers(Any)
}

fn require(value: &str, field: &str) -> Result<(), ServerError> {
    if value.trim().is_empty() {
        return Err(ServerError::InvalidRequest(format!("{} is required", field)));
    }
    Ok(())
}

async fn find_conversation(state: &AppState, id: &str) -> Result<Conversation, ServerError> {
    state
        .conversations
        .get_by_id(id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("conversation {}", id)))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct UpsertUserRequest {
    email: String,
    name: String,
    auth_id: String,
}

/// Create or update a user by external auth id
async fn upsert_user(
    State(state): State<AppState>,
    Json(request): Json<UpsertUserRequest>,
) -> Result<Json<User>, ServerError> {
    require(&request.email, "email")?;
    require(&request.auth_id, "auth_id")?;

    let user = state
        .users
        .upsert(&request.email, &request.name, &request.auth_id)
        .await?;
    Ok(Json(user))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, ServerError> {
    state
        .users
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("user {}", id)))
}

#[derive(Debug, Deserialize)]
struct RenameUserRequest {
    name: String,
}

async fn rename_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RenameUserRequest>,
) -> Result<Json<User>, ServerError> {
    require(&request.name, "name")?;

    state
        .users
        .rename(&id, request.name.trim())
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("user {}", id)))
}

// ---------------------------------------------------------------------------
// Conversations
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct StartConversationRequest {
    user_id: String,
    title: String,
    #[serde(rename = "type", default)]
    conversation_type: ConversationType,
    #[serde(default)]
    theme: Option<String>,
}

/// End the user's active conversation and open a new one with a greeting
async fn start_conversation(
    State(state): State<AppState>,
    Json(request): Json<StartConversationRequest>,
) -> Result<impl IntoResponse, ServerError> {
    require(&request.user_id, "user_id")?;
    require(&request.title, "title")?;

    if state.users.get_by_id(&request.user_id).await?.is_none() {
        return Err(ServerError::NotFound(format!("user {}", request.user_id)));
    }

    let start = Instant::now();
    let started = state
        .orchestrator
        .start_conversation(
            &request.user_id,
            request.title.trim(),
            request.conversation_type,
            request.theme.as_deref().filter(|t| !t.trim().is_empty()),
        )
        .await?;
    metrics::record_opening(request.conversation_type.as_str(), start.elapsed());

    tracing::info!(
        conversation_id = %started.conversation.id,
        user_id = %request.user_id,
        conversation_type = %request.conversation_type,
        "Conversation started"
    );

    Ok((StatusCode::CREATED, Json(started)))
}

async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Conversation>, ServerError> {
    find_conversation(&state, &id).await.map(Json)
}

async fn list_user_conversations(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Conversation>>, ServerError> {
    Ok(Json(state.conversations.list_for_user(&user_id).await?))
}

async fn get_active_conversation(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Conversation>, ServerError> {
    state
        .conversations
        .get_active_for_user(&user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("active conversation for user {}", user_id)))
}

/// Summarize and complete a conversation
async fn end_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Conversation>, ServerError> {
    find_conversation(&state, &id).await?;

    state.orchestrator.end_conversation(&id).await;
    metrics::record_conversation_ended();

    find_conversation(&state, &id).await.map(Json)
}

/// Delete a conversation with its messages and agent history
async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServerError> {
    find_conversation(&state, &id).await?;

    let removed = state.messages.delete_for_conversation(&id).await?;
    state.conversations.delete(&id).await?;
    state.orchestrator.reset_conversation(&id);

    tracing::info!(conversation_id = %id, messages = removed, "Conversation deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Speech
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ProcessRequest {
    text: String,
    user_id: String,
    conversation_id: String,
}

/// Persist the student turn, answer it with text and audio, persist the reply
async fn process_speech(
    State(state): State<AppState>,
    Json(request): Json<ProcessRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    require(&request.text, "text")?;
    require(&request.user_id, "user_id")?;
    require(&request.conversation_id, "conversation_id")?;
    find_conversation(&state, &request.conversation_id).await?;

    let start = Instant::now();
    let exchange = state
        .orchestrator
        .record_exchange(request.text.trim(), &request.user_id, &request.conversation_id)
        .await?;

    metrics::record_request(served_by(&exchange.response), start.elapsed());
    metrics::record_cache_size(state.orchestrator.synthesizer().cache().len());

    Ok(Json(serde_json::json!({
        "success": true,
        "response": exchange.response,
        "messages": {
            "student": exchange.student_message,
            "tutor": exchange.tutor_message,
        },
    })))
}

/// Agent label for request metrics; a reply without metadata is the apology fallback
fn served_by(response: &TutorResponse) -> &'static str {
    match &response.metadata {
        Some(meta) => meta.agent.as_str(),
        None => {
            metrics::record_error("degraded");
            "none"
        }
    }
}

/// Transcribe the multipart `audio` field of a recorded clip
async fn transcribe_speech(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ServerError> {
    let mut clip = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::InvalidRequest(format!("malformed upload: {}", e)))?
    {
        if field.name() != Some("audio") {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let mime_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::InvalidRequest(format!("malformed upload: {}", e)))?;

        let mut audio = AudioClip::webm(bytes.to_vec());
        if let Some(name) = file_name.filter(|n| !n.is_empty()) {
            audio.file_name = name;
        }
        if let Some(mime) = mime_type {
            audio.mime_type = mime;
        }
        clip = Some(audio);
        break;
    }

    let clip = clip
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ServerError::InvalidRequest("audio file is required".to_string()))?;

    let start = Instant::now();
    let text = state.stt.transcribe(&clip).await?;
    tracing::info!(
        bytes = clip.bytes.len(),
        chars = text.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Recording transcribed"
    );

    Ok(Json(serde_json::json!({ "success": true, "text": text })))
}

/// Forget the agent history of one conversation
async fn reset_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Json<serde_json::Value> {
    state.orchestrator.reset_conversation(&conversation_id);
    Json(serde_json::json!({ "success": true }))
}

async fn clear_audio_cache(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.orchestrator.clear_audio_cache();
    metrics::record_cache_size(0);
    tracing::info!("Phrase audio cache cleared");
    Json(serde_json::json!({ "success": true }))
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Oldest first
async fn list_conversation_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ConversationMessage>>, ServerError> {
    Ok(Json(state.messages.list_by_conversation(&id).await?))
}

async fn list_user_messages(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<ConversationMessage>>, ServerError> {
    Ok(Json(state.messages.list_by_user(&user_id).await?))
}

#[derive(Debug, Deserialize)]
struct CreateMessageRequest {
    user_id: String,
    conversation_id: String,
    sender: Sender,
    text: String,
}

/// Store a message outside the turn loop, e.g. a typed note
async fn create_message(
    State(state): State<AppState>,
    Json(request): Json<CreateMessageRequest>,
) -> Result<impl IntoResponse, ServerError> {
    require(&request.user_id, "user_id")?;
    require(&request.conversation_id, "conversation_id")?;
    require(&request.text, "text")?;
    find_conversation(&state, &request.conversation_id).await?;

    let message = state
        .messages
        .create(
            &request.user_id,
            &request.conversation_id,
            request.sender,
            request.text.trim(),
            None,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Debug, Deserialize)]
struct FeedbackRequest {
    liked: bool,
    disliked: bool,
}

async fn update_feedback(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<ConversationMessage>, ServerError> {
    let feedback = Feedback::from_flags(request.liked, request.disliked)?;

    state
        .messages
        .update_feedback(&id, feedback)
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("message {}", id)))
}

async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServerError> {
    state.messages.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = state.get_config();
    let cache = state.orchestrator.synthesizer().cache();

    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": config.environment,
        "catalog_version": state.orchestrator.catalog_version(),
        "models": {
            "agent": config.llm.model,
            "utility": config.llm.utility_model,
            "tts": config.tts.model,
            "stt": state.stt.model_name(),
        },
        "phrase_cache": {
            "entries": cache.len(),
            "capacity": cache.capacity(),
        },
        "active_histories": state.orchestrator.history().active_conversations(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_variants() {
        let _ = build_cors_layer(&[], true);
        let _ = build_cors_layer(&["not a header\n".to_string()], true);
        let _ = build_cors_layer(&["https://tutor.example.com".to_string()], true);
        let _ = build_cors_layer(&[], false);
    }

    #[test]
    fn test_served_by_falls_back_without_metadata() {
        let apology = TutorResponse::text_only("Sorry, let's try that again.");
        assert_eq!(served_by(&apology), "none");
    }

    #[test]
    fn test_require() {
        assert!(require("hello", "text").is_ok());
        assert!(matches!(
            require("   ", "text"),
            Err(ServerError::InvalidRequest(msg)) if msg == "text is required"
        ));
    }
}
