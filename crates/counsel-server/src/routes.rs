use std::path::Path as FsPath;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use base64::Engine;
use chrono::Utc;
use counsel_core::{
    config::Config,
    db::{SessionSnapshot, SessionStore},
    pipeline::Pipeline,
    storage,
    types::{CaseState, ChatMessage, Role},
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

// ── AppState ──────────────────────────────────────────────────────────────

pub struct AppState {
    pub store: Arc<SessionStore>,
    pub pipeline: Arc<Pipeline>,
    pub config: Arc<Config>,
}

// ── Error helper ──────────────────────────────────────────────────────────

fn internal(e: impl std::fmt::Display) -> StatusCode {
    tracing::error!("internal error: {e}");
    StatusCode::INTERNAL_SERVER_ERROR
}

// ── Request body types ────────────────────────────────────────────────────

/// One turn of wire-format history. Converted to the canonical message
/// type exactly once, here at the boundary.
#[derive(Deserialize)]
pub struct WireTurn {
    role: String,
    content: String,
}

#[derive(Deserialize)]
pub struct ChatBody {
    message: Option<String>,
    #[serde(default)]
    history: Vec<WireTurn>,
    user_id: Option<String>,
    session_id: Option<String>,
    language: Option<String>,
}

#[derive(Deserialize)]
pub struct UserQuery {
    user_id: Option<String>,
}

#[derive(Deserialize)]
pub struct RenameBody {
    user_id: String,
    title: String,
}

fn convert_history(history: Vec<WireTurn>) -> Vec<ChatMessage> {
    history
        .into_iter()
        .map(|t| ChatMessage { role: Role::parse(&t.role), content: t.content })
        .collect()
}

// ── Health ────────────────────────────────────────────────────────────────

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ── Chat turn ─────────────────────────────────────────────────────────────

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatBody>,
) -> Result<Json<Value>, StatusCode> {
    let message = body.message.as_deref().unwrap_or("").trim().to_string();
    if message.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let session_key = match (&body.user_id, &body.session_id) {
        (Some(u), Some(s)) if !u.is_empty() && !s.is_empty() => Some((u.clone(), s.clone())),
        _ => None,
    };

    // Rehydrate the prior snapshot when the caller identifies the session;
    // otherwise rebuild from the wire history.
    let prior = match &session_key {
        Some((u, s)) => state.store.get_session(u, s).map_err(internal)?,
        None => None,
    };

    let mut case = prior
        .as_ref()
        .and_then(|snap| snap.backend_state.clone())
        .unwrap_or_else(|| {
            let mut fresh = CaseState::new(
                body.language.as_deref().or(Some(state.config.default_language.as_str())),
            );
            fresh.messages = convert_history(body.history);
            fresh
        });
    if let Some((_, s)) = &session_key {
        case.session_id = Some(s.clone());
    }

    case.push(ChatMessage::user(message));

    state.pipeline.run_turn(&mut case).await;

    if let Some((user_id, session_id)) = &session_key {
        persist_turn(&state, user_id, session_id, &case, prior.as_ref());
    }

    Ok(Json(json!({
        "response": case.last_assistant_reply().unwrap_or(""),
        "facts": case.case_facts,
        "research": case.legal_research,
        "strategy": case.strategy_brief,
        "critic": case.critic_feedback,
        "docs": case.generated_docs,
        "next_step": case.next_step,
        "iteration": case.iteration,
        "error": case.error,
        "error_source": case.error_source,
    })))
}

/// Persist the turn's snapshot and any generated documents. Both are
/// best-effort: a storage failure is logged and the turn response is
/// returned regardless.
fn persist_turn(
    state: &AppState,
    user_id: &str,
    session_id: &str,
    case: &CaseState,
    prior: Option<&SessionSnapshot>,
) {
    let now = Utc::now();
    let snapshot = SessionSnapshot {
        session_id: session_id.to_string(),
        title: prior
            .map(|p| p.title.clone())
            .unwrap_or_else(|| "New Consultation".to_string()),
        date: now.format("%m/%d/%Y").to_string(),
        timestamp: now.timestamp_millis(),
        is_renamed: prior.is_some_and(|p| p.is_renamed),
        messages: case.messages.clone(),
        facts: case.case_facts.clone(),
        strategy: case.strategy_brief.clone(),
        backend_state: Some(case.clone()),
    };
    if let Err(e) = state.store.save_session(user_id, &snapshot) {
        warn!(%user_id, %session_id, "failed to persist session snapshot: {e:#}");
    }

    let Some(docs) = &case.generated_docs else {
        return;
    };
    let root = FsPath::new(&state.config.data_dir);
    let dir = match storage::case_dir(root, user_id, session_id) {
        Ok(d) => d,
        Err(e) => {
            warn!(%user_id, %session_id, "refusing document persistence: {e}");
            return;
        }
    };
    if let Err(e) = std::fs::create_dir_all(&dir) {
        warn!("failed to create case dir {}: {e}", dir.display());
        return;
    }
    let engine = base64::engine::general_purpose::STANDARD;
    for (name, value) in docs {
        let Some(b64) = value.as_str() else { continue };
        let bytes = match engine.decode(b64) {
            Ok(b) => b,
            Err(e) => {
                warn!(doc = %name, "generated document is not valid base64: {e}");
                continue;
            }
        };
        let path = dir.join(format!("{name}.md"));
        if let Err(e) = std::fs::write(&path, bytes) {
            warn!("failed to write {}: {e}", path.display());
        }
    }
}

// ── Sessions ──────────────────────────────────────────────────────────────

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UserQuery>,
) -> Result<Json<Value>, StatusCode> {
    let user_id = q.user_id.filter(|u| !u.is_empty()).ok_or(StatusCode::BAD_REQUEST)?;
    let sessions = state.store.list_sessions(&user_id).map_err(internal)?;
    Ok(Json(json!(sessions)))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(q): Query<UserQuery>,
) -> Result<Json<Value>, StatusCode> {
    let user_id = q.user_id.filter(|u| !u.is_empty()).ok_or(StatusCode::BAD_REQUEST)?;
    match state.store.get_session(&user_id, &id).map_err(internal)? {
        None => Err(StatusCode::NOT_FOUND),
        Some(snapshot) => Ok(Json(serde_json::to_value(snapshot).map_err(internal)?)),
    }
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(q): Query<UserQuery>,
) -> Result<StatusCode, StatusCode> {
    let user_id = q.user_id.filter(|u| !u.is_empty()).ok_or(StatusCode::BAD_REQUEST)?;
    state.store.delete_session(&user_id, &id).map_err(internal)?;
    Ok(StatusCode::OK)
}

pub async fn rename_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<RenameBody>,
) -> Result<StatusCode, StatusCode> {
    let renamed = state
        .store
        .rename_session(&body.user_id, &id, &body.title)
        .map_err(internal)?;
    if renamed {
        Ok(StatusCode::OK)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}
