use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    config::EDIT_PERMISSION_ENABLED,
    error::{ServiceError, ServiceResult},
    store::{UserStore, UserSummary},
    web::{ApiMessage, AppState},
};

#[derive(Deserialize)]
pub(crate) struct AdminLoginRequest {
    username: String,
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PermissionRequest {
    username: String,
    edit_permission: i8,
}

#[derive(Debug, Serialize)]
pub struct AdminLoginResponse {
    pub message: String,
    pub data: Vec<UserSummary>,
}

pub(crate) async fn admin_login_handler(
    State(state): State<AppState>,
    Json(body): Json<AdminLoginRequest>,
) -> ServiceResult<Json<AdminLoginResponse>> {
    admin_login(&state, &body.username, &body.password)
        .await
        .map(Json)
}

pub(crate) async fn update_permission_handler(
    State(state): State<AppState>,
    Json(body): Json<PermissionRequest>,
) -> ServiceResult<Json<ApiMessage>> {
    update_user_permission(&state, &body.username, body.edit_permission)
        .await
        .map(Json)
}

/// Operator login against the configured admin identity.
///
/// Credentials are compared as plain configuration values. The admin account
/// must also exist as a regular user row. Returns the full user roster.
pub async fn admin_login(
    state: &AppState,
    username: &str,
    password: &str,
) -> ServiceResult<AdminLoginResponse> {
    let admin = &state.config().admin;
    if username != admin.username {
        warn!(username = %username, "admin login with unknown account");
        return Err(ServiceError::WrongCredentials("超级用户账号错误"));
    }
    if password != admin.password {
        warn!(username = %username, "admin login with wrong password");
        return Err(ServiceError::WrongCredentials("超级用户密码错误"));
    }

    let store = state.store();
    store
        .find_user(&admin.username)
        .await?
        .ok_or(ServiceError::NotFound("管理员用户不存在"))?;

    let data = store.list_user_summaries().await?;
    info!(users = data.len(), "admin logged in");

    Ok(AdminLoginResponse {
        message: "超级用户登录成功".to_string(),
        data,
    })
}

/// Overwrites a user's edit-permission flag.
pub async fn update_user_permission(
    state: &AppState,
    username: &str,
    edit_permission: i8,
) -> ServiceResult<ApiMessage> {
    let store = state.store();
    let mut user = store
        .find_user(username)
        .await?
        .ok_or(ServiceError::NotFound("用户不存在"))?;

    user.edit_permission = edit_permission;
    store.save_user(&user).await?;

    let status = if edit_permission == EDIT_PERMISSION_ENABLED {
        "启用"
    } else {
        "禁用"
    };
    info!(username = %username, edit_permission, "edit permission updated");
    Ok(ApiMessage::new(format!("用户 {username} 编辑权限已{status}")))
}
