pub mod document;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    config::EDIT_PERMISSION_ENABLED,
    error::{ServiceError, ServiceResult},
    modules::pages,
    store::UserStore,
    utils::image_compress::{self, CompressionJob},
    web::{
        ApiMessage, AppState,
        auth::BearerUser,
        json_error,
        uploads::{FileFieldConfig, SavedFile, process_upload_form},
    },
};

pub use document::CharacterDocument;

const FILES_FIELD: &str = "files";
const DATA_FIELD: &str = "data";

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/page",
        post(save_page_handler).layer(DefaultBodyLimit::disable()),
    )
}

async fn save_page_handler(
    State(state): State<AppState>,
    user: BearerUser,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let Some(route) = pages::route_header(&headers) else {
        return Json(ApiMessage::new("缺少 route 参数")).into_response();
    };

    let upload = state.config().upload.clone();
    let outcome = match process_upload_form(
        multipart,
        &upload.static_dir,
        FileFieldConfig {
            field_name: FILES_FIELD,
            max_files: upload.max_files,
            max_file_size: upload.max_file_size,
        },
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(route = %route, error = %err, "upload rejected");
            return json_error(StatusCode::BAD_REQUEST, err.message()).into_response();
        }
    };

    let document = match parse_document(outcome.first_text(DATA_FIELD)) {
        Ok(document) => document,
        Err(err) => return err.into_response(),
    };

    save_character_page(
        &state,
        &route,
        &outcome.files,
        document,
        Some(user.username.as_str()),
    )
    .await
    .map(Json)
    .into_response()
}

/// Parses the optional `data` form field. Empty or `null` means upload-only.
pub fn parse_document(raw: Option<&str>) -> ServiceResult<Option<CharacterDocument>> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };

    let value: Value = serde_json::from_str(raw).map_err(|_| {
        ServiceError::Validation("data 参数格式错误，必须是有效的 JSON 字符串".to_string())
    })?;
    if value.is_null() {
        return Ok(None);
    }

    serde_json::from_value(value)
        .map(Some)
        .map_err(|err| ServiceError::Validation(format!("data 参数结构错误: {err}")))
}

/// Records an edit by `username`, compresses uploaded images and, when a
/// document is supplied, stores it under `route` with image slots pointed at
/// the uploaded files.
pub async fn save_character_page(
    state: &AppState,
    route: &str,
    files: &[SavedFile],
    document: Option<CharacterDocument>,
    username: Option<&str>,
) -> ServiceResult<ApiMessage> {
    let username = username.ok_or(ServiceError::Unauthenticated("用户未登录，无法编辑"))?;

    let store = state.store();
    let mut user = store
        .find_user(username)
        .await?
        .ok_or(ServiceError::NotFound("用户不存在"))?;

    if user.edit_permission != EDIT_PERMISSION_ENABLED {
        warn!(username = %username, route = %route, "edit rejected without permission");
        return Err(ServiceError::Forbidden("您没有编辑权限"));
    }

    user.last_edit_time = Some(Utc::now());
    user.edit_count += 1;
    store.save_user(&user).await?;

    let config = state.config();
    let (images, others): (Vec<&SavedFile>, Vec<&SavedFile>) = files
        .iter()
        .partition(|file| config.upload.is_allowed_image(file.content_type.as_deref()));

    let jobs: Vec<CompressionJob> = images
        .iter()
        .map(|file| CompressionJob {
            stored_path: file.stored_path.clone(),
            file_name: file.stored_name.clone(),
        })
        .collect();
    let compressed =
        image_compress::compress_batch(&config.images, &config.upload.static_dir, &jobs).await;

    for file in &others {
        info!(file = %file.stored_name, bytes = file.file_size, "stored non-image upload");
    }
    info!(
        username = %username,
        route = %route,
        images = images.len(),
        others = others.len(),
        compressed = ?compressed,
        "processed uploads"
    );

    let Some(mut document) = document else {
        return Ok(ApiMessage::new("文件上传成功"));
    };

    let image_names: Vec<&str> = images.iter().map(|file| file.stored_name.as_str()).collect();
    document.attach_uploaded_images(&image_names);

    let value = serde_json::to_value(&document).context("failed to serialize character document")?;
    pages::save_page(state, route, &value).await?;

    info!(username = %username, route = %route, blocks = document.blocks.len(), "character page saved");
    Ok(ApiMessage::new("数据保存成功"))
}
