use super::consts;
use super::AppState;
use actix_web::{http::StatusCode, web, web::Json, web::Path, web::Query, HttpResponse, Scope};
use application::command::jukebox::EnqueueCmd;
use application::error::AppError;
use application::query::QueryError;
use log::{info, warn};
use model::jukebox::{JukeboxQueueView, QueueItem};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JukeboxApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

impl From<AppError> for JukeboxApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::InvalidInput(_) => JukeboxApiError::BadRequest(err.to_string()),
            AppError::AggregateNotFound(_, _) => JukeboxApiError::NotFound(err.to_string()),
            AppError::EmptyQueue(_) | AppError::InvalidState(_) | AppError::Conflict(_) => {
                JukeboxApiError::Conflict(err.to_string())
            }
            _ => JukeboxApiError::Internal(err.to_string()),
        }
    }
}

impl From<QueryError> for JukeboxApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::InvalidInput(_) => JukeboxApiError::BadRequest(err.to_string()),
            QueryError::NotFound(_) => JukeboxApiError::NotFound(err.to_string()),
            QueryError::DbError(_) => JukeboxApiError::Internal(err.to_string()),
        }
    }
}

impl actix_web::error::ResponseError for JukeboxApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        if let Self::Internal(msg) = self {
            warn!("Jukebox request failed: {}", msg);
        }
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

/// 点歌请求体
#[derive(Deserialize, Debug)]
pub struct AddSongRequest {
    pub song_id: i64,
    pub user_id: i64,
}

#[derive(Deserialize, Debug)]
pub struct RecentQuery {
    pub limit: Option<u64>,
}

async fn list_queue(state: web::Data<AppState>) -> Result<Json<Vec<QueueItem>>, JukeboxApiError> {
    let items = state.jukebox_query.list().await?;
    Ok(Json(items))
}

async fn queue_view(state: web::Data<AppState>) -> Result<Json<JukeboxQueueView>, JukeboxApiError> {
    let view = state.jukebox_query.view().await?;
    Ok(Json(view))
}

async fn now_playing(
    state: web::Data<AppState>,
) -> Result<Json<Option<QueueItem>>, JukeboxApiError> {
    let view = state.jukebox_query.view().await?;
    Ok(Json(view.now_playing))
}

async fn recently_played(
    state: web::Data<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<QueueItem>>, JukeboxApiError> {
    let limit = query.limit.unwrap_or(consts::DEFAULT_RECENT_LIMIT);
    let items = state.jukebox_query.recently_played(limit).await?;
    Ok(Json(items))
}

async fn add_song(
    state: web::Data<AppState>,
    Json(req): Json<AddSongRequest>,
) -> Result<HttpResponse, JukeboxApiError> {
    let entry = state
        .jukebox_service
        .enqueue(EnqueueCmd {
            song_id: req.song_id,
            user_id: req.user_id,
        })
        .await?;
    Ok(HttpResponse::Created().json(entry))
}

async fn remove_entry(
    state: web::Data<AppState>,
    path: Path<i64>,
) -> Result<HttpResponse, JukeboxApiError> {
    state.jukebox_service.remove_entry(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn play_next(state: web::Data<AppState>) -> Result<HttpResponse, JukeboxApiError> {
    let entry = state.jukebox_service.play_next().await?;
    Ok(HttpResponse::Ok().json(entry))
}

async fn skip_current(state: web::Data<AppState>) -> Result<HttpResponse, JukeboxApiError> {
    let entry = state.jukebox_service.skip_current().await?;
    Ok(HttpResponse::Ok().json(entry))
}

async fn clear_queue(state: web::Data<AppState>) -> Result<HttpResponse, JukeboxApiError> {
    let removed = state.jukebox_service.clear_queue().await?;
    Ok(HttpResponse::Ok().json(json!({ "removed": removed })))
}

fn scope_jukebox() -> Scope {
    info!("http config for {}", consts::URL_PATH_JUKEBOX);
    web::scope(consts::URL_PATH_JUKEBOX)
        .route("", web::get().to(list_queue))
        .route("/view", web::get().to(queue_view))
        .route("/now-playing", web::get().to(now_playing))
        .route("/recent", web::get().to(recently_played))
        .route("/add", web::post().to(add_song))
        .route("/remove/{id}", web::post().to(remove_entry))
        .route("/play-next", web::post().to(play_next))
        .route("/skip", web::post().to(skip_current))
        .route("/clear", web::post().to(clear_queue))
}

pub fn configure_service(svc: &mut web::ServiceConfig) {
    svc.service(scope_jukebox());
}
