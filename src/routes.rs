use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    compare::{self, CompareMode, ComparisonLayout, PointerEvent},
    encoder::EncodedImage,
    error::ApiError,
    gemini::RedesignModel,
    models::{StyleSuggestion, UploadRequest},
    session::{Session, SessionSnapshot, SessionStore},
    view::Screen,
};

// Phone photos easily exceed axum's 2 MB default.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub store: SessionStore,
    pub model: Arc<dyn RedesignModel>,
}

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: CompareMode,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/image", post(upload_image))
        .route("/api/sessions/:id/image/base64", post(upload_image_base64))
        .route("/api/sessions/:id/select/:index", post(select_suggestion))
        .route("/api/sessions/:id/back", post(back_to_selection))
        .route("/api/sessions/:id/reset", post(reset_session))
        .route("/api/sessions/:id/original", get(get_original))
        .route("/api/sessions/:id/compare", get(get_comparison))
        .route("/api/sessions/:id/compare/mode", post(set_compare_mode))
        .route("/api/sessions/:id/compare/pointer", post(pointer_event))
        .route("/api/sessions/:id/download", get(download_result))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

fn find_session(state: &AppState, id: Uuid) -> Result<Arc<Session>, ApiError> {
    state.store.read().get(&id).cloned().ok_or(ApiError::SessionNotFound)
}

fn selected_style(session: &Session) -> Result<StyleSuggestion, ApiError> {
    let view = session.view();
    if view.screen != Screen::Result {
        return Err(ApiError::NothingSelected);
    }
    view.selected_suggestion().cloned().ok_or(ApiError::NothingSelected)
}

fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name.chars()
        .map(|c| if (c.is_ascii_graphic() || c == ' ') && c != '"' && c != '\\' { c } else { '_' })
        .collect();
    let encoded: String = file_name.bytes()
        .map(|b| if b.is_ascii_alphanumeric() || b"-._~".contains(&b) { (b as char).to_string() } else { format!("%{:02X}", b) })
        .collect();
    format!("attachment; filename=\"{}\"; filename*=UTF-8''{}", fallback, encoded)
}

pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionSnapshot>) {
    let session = Session::spawn();
    tracing::info!("🆕 Created session {}", session.id);
    state.store.write().insert(session.id, Arc::clone(&session));
    (StatusCode::CREATED, Json(session.snapshot()))
}

pub async fn get_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(find_session(&state, id)?.snapshot()))
}

pub async fn delete_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.store.write().remove(&id).ok_or(ApiError::SessionNotFound)?;
    tracing::info!("🗑️ Deleted session {}", id);
    Ok(StatusCode::NO_CONTENT)
}

async fn run_upload(state: &AppState, session: &Arc<Session>, image: EncodedImage) -> Result<Json<SessionSnapshot>, ApiError> {
    tracing::info!("📷 Session {} received a {} image ({} base64 chars)", session.id, image.mime_type, image.data.len());
    session.analyze_and_generate(Arc::clone(&state.model), image).await?;
    Ok(Json(session.snapshot()))
}

pub async fn upload_image(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = find_session(&state, id)?;
    let mut image = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::BadRequest(e.to_string()))? {
        if field.name() == Some("image") {
            let bytes = field.bytes().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
            image = Some(EncodedImage::from_bytes(&bytes)?);
            break;
        }
    }
    let image = image.ok_or_else(|| ApiError::BadRequest("missing `image` field".to_string()))?;
    run_upload(&state, &session, image).await
}

pub async fn upload_image_base64(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<UploadRequest>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = find_session(&state, id)?;
    let image = EncodedImage::from_payload(&body.image)?;
    run_upload(&state, &session, image).await
}

pub async fn select_suggestion(
    Path((id, index)): Path<(Uuid, usize)>,
    State(state): State<AppState>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = find_session(&state, id)?;
    session.select(index).await?;
    tracing::info!("🎯 Session {} viewing suggestion {}", id, index);
    Ok(Json(session.snapshot()))
}

pub async fn back_to_selection(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = find_session(&state, id)?;
    session.back().await?;
    Ok(Json(session.snapshot()))
}

pub async fn reset_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = find_session(&state, id)?;
    session.reset().await?;
    Ok(Json(session.snapshot()))
}

pub async fn get_original(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let session = find_session(&state, id)?;
    let view = session.view();
    let image = view.original_image.as_ref().ok_or(ApiError::NothingSelected)?;
    let bytes = image.decode()?;
    Ok(([(header::CONTENT_TYPE, image.mime_type.clone())], bytes))
}

pub async fn get_comparison(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<ComparisonLayout>, ApiError> {
    let session = find_session(&state, id)?;
    let style = selected_style(&session)?;
    Ok(Json(session.with_compare(|w| w.layout(&style.name))))
}

pub async fn set_compare_mode(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<ModeRequest>,
) -> Result<Json<ComparisonLayout>, ApiError> {
    let session = find_session(&state, id)?;
    let style = selected_style(&session)?;
    Ok(Json(session.with_compare(|w| {
        w.set_mode(body.mode);
        w.layout(&style.name)
    })))
}

pub async fn pointer_event(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(event): Json<PointerEvent>,
) -> Result<Json<ComparisonLayout>, ApiError> {
    let session = find_session(&state, id)?;
    let style = selected_style(&session)?;
    Ok(Json(session.with_compare(|w| {
        w.handle(event);
        w.layout(&style.name)
    })))
}

pub async fn download_result(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let session = find_session(&state, id)?;
    let style = selected_style(&session)?;
    let url = style.generated_image_url.as_deref().ok_or(ApiError::NothingSelected)?;
    let file = compare::download(&style.name, url)?;
    tracing::info!("💾 Session {} downloading {}", id, file.file_name);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, file.mime_type.clone()),
            (header::CONTENT_DISPOSITION, content_disposition(&file.file_name)),
        ],
        file.bytes,
    ))
}
