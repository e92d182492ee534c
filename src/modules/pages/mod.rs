use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    routing::get,
};
use serde::Serialize;
use serde_json::Value;

use crate::{error::ServiceResult, web::AppState};

pub const ROUTE_HEADER: &str = "route";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/page", get(page_handler))
        .route("/api/character/:character", get(character_handler))
}

/// Stored page with its payload parsed back into JSON.
///
/// Absent pages serialize as `{ "data": [] }`.
#[derive(Debug, Serialize, PartialEq)]
pub struct PageResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    pub data: Value,
}

impl PageResponse {
    fn empty() -> Self {
        Self {
            id: None,
            route: None,
            data: Value::Array(Vec::new()),
        }
    }
}

/// Reads the `route` header. Raw UTF-8 header bytes are accepted.
pub fn route_header(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(ROUTE_HEADER)?;
    let route = String::from_utf8(value.as_bytes().to_vec()).ok()?;
    let route = route.trim();
    (!route.is_empty()).then(|| route.to_string())
}

async fn page_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ServiceResult<Json<PageResponse>> {
    let Some(route) = route_header(&headers) else {
        return Ok(Json(PageResponse::empty()));
    };
    get_page(&state, &route).await.map(Json)
}

async fn character_handler(
    State(state): State<AppState>,
    Path(character): Path<String>,
) -> ServiceResult<Json<PageResponse>> {
    get_page(&state, &format!("/character/{character}"))
        .await
        .map(Json)
}

pub async fn get_page(state: &AppState, route: &str) -> ServiceResult<PageResponse> {
    let Some(page) = state.store().find_page(route).await? else {
        return Ok(PageResponse::empty());
    };

    let data: Value = serde_json::from_str(&page.data)
        .with_context(|| format!("stored page for route {route} is not valid JSON"))?;

    Ok(PageResponse {
        id: Some(page.id),
        route: Some(page.route),
        data,
    })
}

/// Creates or overwrites the page stored under `route`.
pub async fn save_page(state: &AppState, route: &str, document: &Value) -> ServiceResult<()> {
    let payload = serde_json::to_string(document).context("failed to serialize page document")?;
    state.store().upsert_page(route, &payload).await?;
    Ok(())
}
