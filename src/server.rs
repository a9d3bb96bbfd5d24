//! HTTP API
//!
//! Thin axum layer over the orchestrator, the session store and the
//! example/grammar library. Handlers translate store errors into 500s and
//! missing entities into 404s.

use crate::agent::heuristics::{extract_code, validate_code};
use crate::agent::{AskRequest, Orchestrator, OutcomeStatus};
use crate::error::Result;
use crate::library::{language_description, DslLibrary, Example};
use crate::storage::{SessionInfo, SessionStore};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub library: Arc<dyn DslLibrary>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, library: Arc<dyn DslLibrary>) -> Self {
        Self {
            orchestrator,
            library,
        }
    }

    fn sessions(&self) -> &Arc<dyn SessionStore> {
        self.orchestrator.sessions()
    }
}

fn default_language() -> String {
    "classroom".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub success: bool,
    pub response: String,
    pub session_id: String,
    pub language: String,
    /// False when the code is a best-effort answer after exhaustion
    pub validated: bool,
    pub iterations: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub name: String,
    pub description: String,
    pub examples_count: usize,
    pub has_grammar: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExamplesResponse {
    pub language: String,
    pub examples: Vec<Example>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GrammarResponse {
    pub language: String,
    pub grammar: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateRequest {
    pub code: String,
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub success: bool,
    pub is_valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub active_sessions: usize,
    pub available_languages: usize,
    pub available_grammars: usize,
    pub total_examples: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn internal(e: anyhow::Error) -> ApiError {
    error!("Request failed: {:#}", e);
    api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// POST /api/chat
async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> std::result::Result<Json<ChatResponse>, ApiError> {
    if req.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "message cannot be empty"));
    }

    let mut request = AskRequest::new(req.message, req.language);
    if let Some(session_id) = req.session_id {
        request = request.with_session(session_id);
    }

    let outcome = state
        .orchestrator
        .run(request, CancellationToken::new())
        .await
        .map_err(internal)?;

    Ok(Json(ChatResponse {
        success: outcome.status != OutcomeStatus::GenerationFailed,
        response: outcome.response_text(),
        validated: outcome.is_validated(),
        session_id: outcome.session_id,
        language: outcome.language,
        iterations: outcome.iterations,
        error: outcome.error,
    }))
}

/// GET /api/languages
async fn languages(
    State(state): State<AppState>,
) -> std::result::Result<Json<Vec<LanguageInfo>>, ApiError> {
    let mut infos = Vec::new();
    for name in state.library.languages() {
        let examples_count = state.library.examples_for(&name).map_err(internal)?.len();
        let has_grammar = state.library.grammar_for(&name).map_err(internal)?.is_some();
        infos.push(LanguageInfo {
            description: language_description(&name),
            name,
            examples_count,
            has_grammar,
        });
    }
    Ok(Json(infos))
}

/// GET /api/sessions/:id
async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> std::result::Result<Json<SessionInfo>, ApiError> {
    state
        .sessions()
        .get(&session_id)
        .map_err(internal)?
        .map(|session| Json(session.info()))
        .ok_or_else(|| {
            api_error(
                StatusCode::NOT_FOUND,
                format!("Session '{}' not found", session_id),
            )
        })
}

/// DELETE /api/sessions/:id
async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> std::result::Result<Json<DeleteResponse>, ApiError> {
    if state.sessions().delete(&session_id).map_err(internal)? {
        Ok(Json(DeleteResponse {
            success: true,
            message: format!("Session {} deleted", session_id),
        }))
    } else {
        Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Session '{}' not found", session_id),
        ))
    }
}

/// GET /api/examples/:language
async fn get_examples(
    State(state): State<AppState>,
    Path(language): Path<String>,
) -> std::result::Result<Json<ExamplesResponse>, ApiError> {
    let examples = state.library.examples_for(&language).map_err(internal)?;
    if examples.is_empty() {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("No examples found for language: {}", language),
        ));
    }
    Ok(Json(ExamplesResponse { language, examples }))
}

/// GET /api/grammars/:language
async fn get_grammar(
    State(state): State<AppState>,
    Path(language): Path<String>,
) -> std::result::Result<Json<GrammarResponse>, ApiError> {
    match state.library.grammar_for(&language).map_err(internal)? {
        Some(grammar) => Ok(Json(GrammarResponse { language, grammar })),
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("No grammar found for language: {}", language),
        )),
    }
}

/// POST /api/validate
async fn validate(Json(req): Json<ValidateRequest>) -> Json<ValidateResponse> {
    let errors = validate_code(&req.language, &extract_code(&req.code));
    debug!("Validated {} code: {} error(s)", req.language, errors.len());
    Json(ValidateResponse {
        success: true,
        is_valid: errors.is_empty(),
        errors,
    })
}

/// GET /api/stats
async fn stats(State(state): State<AppState>) -> std::result::Result<Json<StatsResponse>, ApiError> {
    let languages = state.library.languages();
    let mut total_examples = 0;
    for language in &languages {
        total_examples += state.library.examples_for(language).map_err(internal)?.len();
    }

    Ok(Json(StatsResponse {
        active_sessions: state.sessions().count().map_err(internal)?,
        available_languages: languages.len(),
        available_grammars: state.library.grammar_languages().len(),
        total_examples,
    }))
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
    })
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/languages", get(languages))
        .route(
            "/api/sessions/:session_id",
            get(get_session).delete(delete_session),
        )
        .route("/api/examples/:language", get(get_examples))
        .route("/api/grammars/:language", get(get_grammar))
        .route("/api/validate", post(validate))
        .route("/api/stats", get(stats))
        .route("/health", get(health))
        .with_state(state)
}

/// Evict idle sessions every `interval` until `shutdown` fires
pub fn spawn_session_reaper(
    sessions: Arc<dyn SessionStore>,
    interval: Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => match sessions.cleanup_expired() {
                    Ok(removed) => debug!("Reaper pass removed {} session(s)", removed),
                    Err(e) => error!("Session cleanup failed: {:#}", e),
                },
            }
        }
        debug!("Session reaper stopped");
    })
}

/// Serve the API on `host:port` until Ctrl-C
pub async fn serve(state: AppState, host: &str, port: u16, cleanup_interval: Duration) -> Result<()> {
    let shutdown = CancellationToken::new();
    let reaper = spawn_session_reaper(state.sessions().clone(), cleanup_interval, shutdown.clone());

    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    let signal = shutdown.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    let _ = reaper.await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemorySessionStore, Role};

    #[test]
    fn test_chat_request_defaults() {
        let req: ChatRequest = serde_json::from_str(r#"{"message": "hi"}"#).unwrap();
        assert_eq!(req.language, "classroom");
        assert!(req.session_id.is_none());
    }

    #[test]
    fn test_chat_response_omits_missing_error() {
        let json = serde_json::to_value(ChatResponse {
            success: true,
            response: "code".into(),
            session_id: "s".into(),
            language: "classroom".into(),
            validated: true,
            iterations: 1,
            error: None,
        })
        .unwrap();
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn test_reaper_evicts_and_stops() {
        let store = Arc::new(InMemorySessionStore::new(0));
        store.get_or_create("old", None).unwrap();
        store.append("old", Role::User, "hi").unwrap();

        let shutdown = CancellationToken::new();
        let handle = spawn_session_reaper(store.clone(), Duration::from_millis(10), shutdown.clone());
        tokio::time::sleep(Duration::from_millis(60)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(store.count().unwrap(), 0);
    }
}
