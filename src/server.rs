use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Form, Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;
use crate::backend::HttpAnswerService;
use crate::config::AppConfig;
use crate::format::format_message;
use crate::replay::{replay, sse_event};
use crate::session::{RenderedTurn, Role, SessionError, SessionHandle, SessionId, SessionStore, Turn};
use crate::ui::{ChatPage, render_chat_page};

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let settings = config.backend_settings()?;
    info!(
        name: "backend.config.loaded",
        url = %settings.url,
        variant = %settings.variant,
        tag_session = settings.tag_session,
        "Answer service configuration loaded"
    );

    let sessions = SessionStore::new(config.chat.welcome.clone());
    let _sweeper = spawn_session_sweeper(
        sessions.clone(),
        config.session_timeout(),
        config.sweep_interval(),
    );

    let state = AppState {
        sessions,
        answers: Arc::new(HttpAnswerService::new(settings)),
        config: Arc::clone(&config),
    };

    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/sessions/{id}", get(page_handler))
        .route("/sessions/{id}/messages", post(page_submit_handler))
        .route("/sessions/{id}/clear", post(page_clear_handler))
        .route("/api/sessions", post(api_create_session))
        .route("/api/sessions/{id}", axum::routing::delete(api_delete_session))
        .route("/api/sessions/{id}/turns", get(api_get_turns))
        .route("/api/sessions/{id}/messages", post(api_submit))
        .route("/api/sessions/{id}/clear", post(api_clear_session))
        .route("/api/sessions/{id}/reveal", get(api_reveal))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Periodically drop sessions idle for longer than `timeout`.
pub fn spawn_session_sweeper(
    sessions: SessionStore,
    timeout: Duration,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = sessions.cleanup_expired_with_timeout(timeout);
            if removed > 0 {
                info!(
                    name: "sessions.expired",
                    removed,
                    remaining = sessions.len(),
                    "Expired idle sessions"
                );
            }
        }
    })
}

fn lookup(state: &AppState, raw: &str) -> Option<SessionHandle> {
    let id: SessionId = raw.parse().ok()?;
    state.sessions.get(&id)
}

fn session_error_status(e: &SessionError) -> StatusCode {
    match e {
        SessionError::UnknownSession(_) => StatusCode::NOT_FOUND,
        SessionError::AnswerPending | SessionError::Superseded => StatusCode::CONFLICT,
    }
}

fn api_error(e: &SessionError) -> (StatusCode, String) {
    (session_error_status(e), e.to_string())
}

fn not_found(raw: &str) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("Unknown session: {raw}"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Page Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Query parameters for the chat page.
#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    /// `1` replays the newest answer on load.
    #[serde(default)]
    reveal: Option<String>,
}

/// Form body for submitting a message.
#[derive(Debug, Deserialize)]
struct MessageForm {
    #[serde(default)]
    text: String,
}

/// GET / - Start a session and show it.
async fn index_handler(State(state): State<AppState>) -> Redirect {
    let session = state.sessions.start();
    info!(name: "session.started", session_id = %session.id(), "Session started");
    Redirect::to(&format!("/sessions/{}", session.id()))
}

/// GET /sessions/:id - Render the chat page.
async fn page_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let Some(session) = lookup(&state, &id) else {
        return Redirect::to("/").into_response();
    };

    let reveal = query.reveal.as_deref() == Some("1");
    let html = session.read(|s| {
        render_chat_page(&ChatPage {
            title: &state.config.chat.title,
            session_id: s.id(),
            transcript: s.render_transcript(),
            reveal,
        })
    });
    Html(html).into_response()
}

/// POST /sessions/:id/messages - Submit from the input form.
async fn page_submit_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<MessageForm>,
) -> Redirect {
    let Some(session) = lookup(&state, &id) else {
        return Redirect::to("/");
    };

    match session.submit(&form.text, Arc::clone(&state.answers)).await {
        Ok(Some(_)) => Redirect::to(&format!("/sessions/{}?reveal=1", session.id())),
        Ok(None) => Redirect::to(&format!("/sessions/{}", session.id())),
        Err(e) => {
            tracing::warn!(session_id = %session.id(), error = %e, "Message not accepted");
            Redirect::to(&format!("/sessions/{}", session.id()))
        }
    }
}

/// POST /sessions/:id/clear - Reset the transcript under a new id.
async fn page_clear_handler(State(state): State<AppState>, Path(id): Path<String>) -> Redirect {
    let Ok(old) = id.parse::<SessionId>() else {
        return Redirect::to("/");
    };
    match state.sessions.clear(&old) {
        Ok(new_id) => {
            info!(name: "session.cleared", old = %old, new = %new_id, "Session cleared");
            Redirect::to(&format!("/sessions/{new_id}"))
        }
        Err(_) => Redirect::to("/"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Turn DTO for API responses.
#[derive(Debug, Serialize)]
struct TurnDto {
    role: Role,
    text: String,
    /// Text converted to display markup.
    html: String,
}

impl From<&Turn> for TurnDto {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role(),
            text: turn.text().to_string(),
            html: format_message(turn.text()),
        }
    }
}

impl From<RenderedTurn<'_>> for TurnDto {
    fn from(turn: RenderedTurn<'_>) -> Self {
        Self {
            role: turn.role,
            text: turn.text.to_string(),
            html: turn.html,
        }
    }
}

/// Session DTO for API responses.
#[derive(Debug, Serialize)]
struct SessionDto {
    session_id: SessionId,
    turns: Vec<TurnDto>,
}

impl SessionDto {
    fn of(session: &SessionHandle) -> Self {
        session.read(|s| Self {
            session_id: s.id(),
            turns: s.render_transcript().iter().map(TurnDto::from).collect(),
        })
    }
}

/// Request body for the message API.
#[derive(Debug, Deserialize)]
struct MessageRequest {
    text: String,
}

/// Response from the message API.
#[derive(Debug, Serialize)]
struct MessageResponse {
    /// The assistant turn appended for this message.
    turn: TurnDto,
}

/// Response from the clear API.
#[derive(Debug, Serialize)]
struct ClearResponse {
    session_id: SessionId,
}

/// POST /api/sessions - Start a session.
async fn api_create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionDto>) {
    let session = state.sessions.start();
    info!(name: "session.started", session_id = %session.id(), "Session started");
    (StatusCode::CREATED, Json(SessionDto::of(&session)))
}

/// GET /api/sessions/:id/turns - Get the transcript.
async fn api_get_turns(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TurnDto>>, (StatusCode, String)> {
    let session = lookup(&state, &id).ok_or_else(|| not_found(&id))?;
    Ok(Json(SessionDto::of(&session).turns))
}

/// POST /api/sessions/:id/messages - Send a message and wait for the answer.
async fn api_submit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> Result<Response, (StatusCode, String)> {
    let session = lookup(&state, &id).ok_or_else(|| not_found(&id))?;

    tracing::info!(
        session_id = %session.id(),
        length = req.text.len(),
        "Received chat message"
    );

    match session.submit(&req.text, Arc::clone(&state.answers)).await {
        Ok(Some(turn)) => Ok(Json(MessageResponse {
            turn: TurnDto::from(&turn),
        })
        .into_response()),
        Ok(None) => Ok(StatusCode::NO_CONTENT.into_response()),
        Err(e) => Err(api_error(&e)),
    }
}

/// POST /api/sessions/:id/clear - Reset the transcript under a new id.
async fn api_clear_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ClearResponse>, (StatusCode, String)> {
    let old = id
        .parse::<SessionId>()
        .ok()
        .ok_or_else(|| not_found(&id))?;
    let session_id = state.sessions.clear(&old).map_err(|e| api_error(&e))?;
    info!(name: "session.cleared", old = %old, new = %session_id, "Session cleared");
    Ok(Json(ClearResponse { session_id }))
}

/// DELETE /api/sessions/:id - Drop a session.
async fn api_delete_session(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    let removed = id
        .parse::<SessionId>()
        .ok()
        .and_then(|id| state.sessions.remove(&id));
    if removed.is_some() {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// GET /api/sessions/:id/reveal - Replay the newest answer as SSE.
async fn api_reveal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, (StatusCode, String)> {
    let session = lookup(&state, &id).ok_or_else(|| not_found(&id))?;
    let text = session
        .read(|s| {
            s.render_transcript()
                .latest_assistant_text()
                .map(str::to_owned)
        })
        .ok_or_else(|| (StatusCode::NOT_FOUND, "No answer to reveal".to_string()))?;

    let frames = replay(text, state.config.replay_pacing())
        .map(|frame| Ok::<_, Infallible>(sse_event(&frame.map_text(format_message))));

    Ok(build_sse_response(Body::from_stream(frames)))
}

fn build_sse_response(body: Body) -> Response {
    let mut resp = Response::new(body);
    let h = resp.headers_mut();
    h.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    h.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    h.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    h.insert("X-Accel-Buffering", HeaderValue::from_static("no"));
    resp
}
