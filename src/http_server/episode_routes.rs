//! # Episode Routes
//!
//! - `POST /episodes` ingest
//! - `GET /episodes` list (summary or full view)
//! - `GET /episodes/diff?left=&right=` positional diff
//! - `GET /episodes/export` NDJSON stream
//! - `GET /episodes/:id` fetch
//! - `GET /episodes/:id/replay` replay view
//!
//! Ledger calls do blocking file I/O and run on the blocking pool.

use std::io;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use super::errors::{ApiError, ApiResult};
use crate::engine::EpisodeStore;
use crate::error::{LedgerError, LedgerResult, Operation};
use crate::export;
use crate::model::{EpisodeDocument, EpisodeId, EpisodeStatus, EpisodeSummary};
use crate::observability::Event;
use crate::query::ListFilter;
use crate::schema::validate_payload;

/// Page size when `limit` is omitted
pub const DEFAULT_PAGE_SIZE: usize = 50;
/// Largest accepted `limit`
pub const MAX_PAGE_SIZE: usize = 500;
/// Export lines buffered between the reader thread and the response
const EXPORT_CHANNEL_CAPACITY: usize = 16;

// ==================
// Request / Response Types
// ==================

/// List and export query parameters; parsed by hand so bad values
/// produce a uniform error body.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub agent_id: Option<String>,
    pub status: Option<String>,
    pub model: Option<String>,
    pub provider: Option<String>,
    pub tool: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub view: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DiffParams {
    pub left: Option<String>,
    pub right: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListView {
    Summary,
    Full,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ListResponse {
    Summary(Vec<EpisodeSummary>),
    Full(Vec<EpisodeDocument>),
}

impl ListParams {
    /// Filter fields only; pagination is not applied.
    fn filter(&self) -> ApiResult<ListFilter> {
        let status = self
            .status
            .as_deref()
            .map(|s| {
                s.parse::<EpisodeStatus>()
                    .map_err(|e| ApiError::InvalidQueryParam(format!("status: {}", e)))
            })
            .transpose()?;

        Ok(ListFilter {
            agent_id: self.agent_id.clone(),
            status,
            model: self.model.clone(),
            provider: self.provider.clone(),
            tool: self.tool.clone(),
            since: parse_time("since", self.since.as_deref())?,
            until: parse_time("until", self.until.as_deref())?,
            offset: 0,
            limit: None,
        })
    }

    fn paged_filter(&self) -> ApiResult<ListFilter> {
        let limit = parse_count("limit", self.limit.as_deref())?.unwrap_or(DEFAULT_PAGE_SIZE);
        if limit == 0 {
            return Err(ApiError::InvalidQueryParam("limit: must be at least 1".to_string()));
        }
        if limit > MAX_PAGE_SIZE {
            return Err(ApiError::LimitExceeded(limit, MAX_PAGE_SIZE));
        }
        let offset = parse_count("offset", self.offset.as_deref())?.unwrap_or(0);

        Ok(self.filter()?.offset(offset).limit(limit))
    }

    fn view(&self) -> ApiResult<ListView> {
        match self.view.as_deref() {
            None | Some("summary") => Ok(ListView::Summary),
            Some("full") => Ok(ListView::Full),
            Some(other) => Err(ApiError::InvalidQueryParam(format!(
                "view: expected summary or full, got '{}'",
                other
            ))),
        }
    }
}

fn parse_time(name: &str, value: Option<&str>) -> ApiResult<Option<DateTime<Utc>>> {
    value
        .map(|v| {
            DateTime::parse_from_rfc3339(v)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| ApiError::InvalidQueryParam(format!("{}: {}", name, e)))
        })
        .transpose()
}

fn parse_count(name: &str, value: Option<&str>) -> ApiResult<Option<usize>> {
    value
        .map(|v| {
            v.parse::<usize>()
                .map_err(|_| ApiError::InvalidQueryParam(format!("{}: expected a non-negative integer, got '{}'", name, v)))
        })
        .transpose()
}

// ==================
// Router
// ==================

/// Create episode routes
pub fn episode_routes(store: Arc<EpisodeStore>) -> Router {
    Router::new()
        .route("/episodes", get(list_handler).post(ingest_handler))
        .route("/episodes/diff", get(diff_handler))
        .route("/episodes/export", get(export_handler))
        .route("/episodes/:id", get(get_handler))
        .route("/episodes/:id/replay", get(replay_handler))
        .with_state(store)
}

/// Runs a ledger call on the blocking pool.
async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> LedgerResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

// ==================
// Handlers
// ==================

async fn ingest_handler(
    State(store): State<Arc<EpisodeStore>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<EpisodeDocument>)> {
    let Json(payload) = payload.map_err(|e| ApiError::InvalidBody(e.body_text()))?;
    let draft = validate_payload(&payload).map_err(|e| {
        warn!(event = %Event::EpisodeRejected, reason = %e, "episode rejected");
        LedgerError::validation(Operation::Ingest, e)
    })?;

    let episode = blocking(move || store.put(draft)).await?;
    Ok((StatusCode::CREATED, Json(EpisodeDocument::from(episode))))
}

async fn list_handler(
    State(store): State<Arc<EpisodeStore>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ListResponse>> {
    let filter = params.paged_filter()?;
    let response = match params.view()? {
        ListView::Summary => ListResponse::Summary(blocking(move || store.list(&filter)).await?),
        ListView::Full => {
            let episodes = blocking(move || store.list_full(&filter)).await?;
            ListResponse::Full(episodes.into_iter().map(EpisodeDocument::from).collect())
        }
    };
    Ok(Json(response))
}

async fn get_handler(
    State(store): State<Arc<EpisodeStore>>,
    Path(id): Path<String>,
) -> ApiResult<Json<EpisodeDocument>> {
    let id = EpisodeId::new(id);
    let episode = blocking(move || store.get(&id)).await?;
    Ok(Json(EpisodeDocument::from(episode)))
}

async fn replay_handler(
    State(store): State<Arc<EpisodeStore>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = EpisodeId::new(id);
    let view = blocking(move || store.replay(&id)).await?;
    Ok(Json(view))
}

async fn diff_handler(
    State(store): State<Arc<EpisodeStore>>,
    Query(params): Query<DiffParams>,
) -> ApiResult<impl IntoResponse> {
    let left = params.left.map(EpisodeId::new).ok_or(ApiError::MissingParam("left"))?;
    let right = params.right.map(EpisodeId::new).ok_or(ApiError::MissingParam("right"))?;
    let diff = blocking(move || store.diff(&left, &right)).await?;
    Ok(Json(diff))
}

/// Streams NDJSON from a blocking reader thread through a bounded channel.
///
/// The first record is not awaited: headers go out as soon as the
/// snapshot is open. If the client disconnects, the next send fails and
/// the reader thread stops.
async fn export_handler(
    State(store): State<Arc<EpisodeStore>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Response> {
    let filter = params.filter()?;
    let filter = (filter != ListFilter::default()).then_some(filter);

    let (ready_tx, ready_rx) = oneshot::channel::<LedgerResult<()>>();
    let (tx, rx) = mpsc::channel::<Result<Bytes, io::Error>>(EXPORT_CHANNEL_CAPACITY);

    tokio::task::spawn_blocking(move || {
        let mut records = match export::export_records(&store, filter.as_ref()) {
            Ok(records) => {
                let _ = ready_tx.send(Ok(()));
                records
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };

        while let Some(line) = records.next() {
            let failed = line.is_err();
            let item = line
                .map(Bytes::from)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
            if tx.blocking_send(item).is_err() {
                info!(
                    event = %Event::ExportCancelled,
                    records = records.emitted(),
                    "export consumer disconnected"
                );
                return;
            }
            if failed {
                return;
            }
        }
        info!(event = %Event::ExportComplete, records = records.emitted(), "export complete");
    });

    match ready_rx.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Err(ApiError::Internal("export reader exited before starting".to_string())),
    }

    let body = futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    });

    Ok((
        [
            (header::CONTENT_TYPE, export::CONTENT_TYPE),
            (header::CONTENT_DISPOSITION, "attachment; filename=episodes.jsonl"),
        ],
        Body::from_stream(body),
    )
        .into_response())
}
