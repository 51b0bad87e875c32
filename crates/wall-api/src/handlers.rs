//! # wall-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the
//! [`WallService`]. Handlers never look at roles or ownership themselves.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wall_core::error::AppError;
use wall_core::models::{Message, UserId, UserProfile, Viewer};
use wall_core::thread::ThreadNode;
use wall_core::traits::UserDirectory;
use wall_core::visibility::{self, MessageView};
use wall_core::WallService;

use crate::identity::IdentityProvider;

/// Seconds a client should wait after a `Busy` answer.
pub const RETRY_AFTER_SECS: u64 = 1;

/// State shared across all Actix-web workers.
pub struct AppState {
    pub service: WallService,
    pub directory: Arc<dyn UserDirectory>,
    pub identity: Box<dyn IdentityProvider>,
}

impl AppState {
    fn viewer(&self, req: &HttpRequest) -> Result<Viewer, ApiError> {
        Ok(self.identity.identify(req)?)
    }

    /// Resolves display profiles. A failing directory degrades to ids only.
    async fn authors<I>(&self, ids: I) -> HashMap<UserId, UserProfile>
    where
        I: IntoIterator<Item = Option<UserId>>,
    {
        let ids: Vec<UserId> = ids.into_iter().flatten().collect::<BTreeSet<_>>().into_iter().collect();
        if ids.is_empty() {
            return HashMap::new();
        }
        match self.directory.profiles(&ids).await {
            Ok(profiles) => profiles,
            Err(err) => {
                log::warn!("user directory unavailable: {err:#}");
                HashMap::new()
            }
        }
    }
}

/// HTTP face of [`AppError`].
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub retryable: bool,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            AppError::NotFound(..) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Busy(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = match &self.0 {
            AppError::NotFound(..) => "the message does not exist or has been deleted".to_string(),
            AppError::Busy(_) => "the thread is busy, please try again".to_string(),
            AppError::Storage(detail) => {
                log::error!("storage failure: {detail}");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        let mut res = HttpResponse::build(self.status_code());
        if self.0.is_retryable() {
            res.insert_header((header::RETRY_AFTER, RETRY_AFTER_SECS.to_string()));
        }
        res.json(ErrorBody { error, retryable: self.0.is_retryable() })
    }
}

type ApiResult = Result<HttpResponse, ApiError>;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ContentForm {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ThreadResponse {
    pub thread: ThreadNode<MessageView>,
    pub authors: HashMap<UserId, UserProfile>,
}

#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub page: i64,
    pub per_page: i64,
    pub page_count: i64,
    pub total_threads: i64,
    pub threads: Vec<ThreadNode<MessageView>>,
    pub authors: HashMap<UserId, UserProfile>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub messages: Vec<MessageView>,
    pub authors: HashMap<UserId, UserProfile>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub removed: u64,
}

fn thread_authors(thread: &ThreadNode<MessageView>) -> impl Iterator<Item = Option<UserId>> + '_ {
    thread.preorder().into_iter().map(|view| view.author_id())
}

/// A freshly written message, as its author sees it.
fn written(message: Message, viewer: &Viewer, data: &AppState) -> MessageView {
    visibility::project(message, viewer, &data.service.settings().stub)
}

/// Front page of the wall (`GET /wall?page=N`).
pub async fn wall_page(data: web::Data<AppState>, req: HttpRequest, query: web::Query<PageQuery>) -> ApiResult {
    let viewer = data.viewer(&req)?;
    let page = data.service.page(&viewer, query.page.unwrap_or(1)).await?;
    let authors = data.authors(page.threads.iter().flat_map(thread_authors)).await;

    Ok(HttpResponse::Ok().json(PageResponse {
        page: page.page,
        per_page: page.per_page,
        page_count: page.page_count(),
        total_threads: page.total_threads,
        threads: page.threads,
        authors,
    }))
}

/// Starts a thread (`POST /wall`).
pub async fn post_message(data: web::Data<AppState>, req: HttpRequest, form: web::Json<ContentForm>) -> ApiResult {
    let viewer = data.viewer(&req)?;
    let message = data.service.post(&viewer, &form.content).await?;
    Ok(HttpResponse::Created()
        .insert_header((header::LOCATION, format!("/wall/messages/{}", message.id)))
        .json(written(message, &viewer, &data)))
}

pub async fn latest(data: web::Data<AppState>, req: HttpRequest) -> ApiResult {
    let viewer = data.viewer(&req)?;
    let messages = data.service.latest(&viewer).await?;
    let authors = data.authors(messages.iter().map(MessageView::author_id)).await;
    Ok(HttpResponse::Ok().json(ListResponse { messages, authors }))
}

/// The whole thread containing a message (`GET /wall/messages/{id}`).
pub async fn view_thread(data: web::Data<AppState>, req: HttpRequest, path: web::Path<Uuid>) -> ApiResult {
    let viewer = data.viewer(&req)?;
    let thread = data.service.thread(&viewer, path.into_inner()).await?;
    let authors = data.authors(thread_authors(&thread)).await;
    Ok(HttpResponse::Ok().json(ThreadResponse { thread, authors }))
}

pub async fn reply(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    form: web::Json<ContentForm>,
) -> ApiResult {
    let viewer = data.viewer(&req)?;
    let message = data.service.reply(&viewer, path.into_inner(), &form.content).await?;
    Ok(HttpResponse::Created()
        .insert_header((header::LOCATION, format!("/wall/messages/{}", message.id)))
        .json(written(message, &viewer, &data)))
}

pub async fn edit(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    form: web::Json<ContentForm>,
) -> ApiResult {
    let viewer = data.viewer(&req)?;
    let message = data.service.edit(&viewer, path.into_inner(), &form.content).await?;
    Ok(HttpResponse::Ok().json(written(message, &viewer, &data)))
}

pub async fn hide(data: web::Data<AppState>, req: HttpRequest, path: web::Path<Uuid>) -> ApiResult {
    set_hidden(data, req, path.into_inner(), true).await
}

pub async fn unhide(data: web::Data<AppState>, req: HttpRequest, path: web::Path<Uuid>) -> ApiResult {
    set_hidden(data, req, path.into_inner(), false).await
}

async fn set_hidden(data: web::Data<AppState>, req: HttpRequest, id: Uuid, hidden: bool) -> ApiResult {
    let viewer = data.viewer(&req)?;
    let message = data.service.set_hidden(&viewer, id, hidden).await?;
    Ok(HttpResponse::Ok().json(written(message, &viewer, &data)))
}

/// Removes a message together with all of its replies.
pub async fn delete(data: web::Data<AppState>, req: HttpRequest, path: web::Path<Uuid>) -> ApiResult {
    let viewer = data.viewer(&req)?;
    let removed = data.service.delete(&viewer, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(DeleteResponse { removed }))
}

pub async fn by_author(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    query: web::Query<PageQuery>,
) -> ApiResult {
    let viewer = data.viewer(&req)?;
    let messages = data
        .service
        .by_author(&viewer, path.into_inner(), query.page.unwrap_or(1))
        .await?;
    let authors = data.authors(messages.iter().map(MessageView::author_id)).await;
    Ok(HttpResponse::Ok().json(ListResponse { messages, authors }))
}
