mod admin;

use anyhow::anyhow;
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post, put},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    config::EDIT_PERMISSION_ENABLED,
    error::{ServiceError, ServiceResult},
    store::{NewUser, UserStore},
    utils::hashing,
    web::{
        ApiMessage, AppState,
        auth::{self, BearerUser},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/register", post(register_handler))
        .route("/api/login", post(login_handler))
        .route("/api/reset", post(reset_handler))
        .route("/api/user/info", get(user_info_handler))
        .route("/api/admin", post(admin::admin_login_handler))
        .route("/api/user/permission", put(admin::update_permission_handler))
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ResetRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub message: String,
    pub username: String,
    pub authorization: String,
    pub login_count: i32,
    pub edit_permission: i8,
}

async fn register_handler(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> ServiceResult<Json<ApiMessage>> {
    register(&state, &body.username, &body.password, &body.email)
        .await
        .map(Json)
}

async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ServiceResult<Json<LoginResponse>> {
    login(&state, &body.username, &body.password).await.map(Json)
}

async fn reset_handler(
    State(state): State<AppState>,
    Json(body): Json<ResetRequest>,
) -> ServiceResult<Json<ApiMessage>> {
    reset_password(&state, &body.username, &body.email, &body.password)
        .await
        .map(Json)
}

async fn user_info_handler(
    State(state): State<AppState>,
    user: BearerUser,
) -> ServiceResult<Json<ApiMessage>> {
    get_user_info(&state, &user.username).await.map(Json)
}

/// Creates an account with independently salted password and email hashes.
pub async fn register(
    state: &AppState,
    username: &str,
    password: &str,
    email: &str,
) -> ServiceResult<ApiMessage> {
    let store = state.store();
    if store.find_user(username).await?.is_some() {
        return Err(ServiceError::Conflict("用户名已存在"));
    }

    let salt = hashing::generate_salt();
    let email_salt = hashing::generate_salt();
    let password_hash = hashing::hash_password(password, &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?;
    let email_hash = hashing::hash_email(email, &email_salt)
        .map_err(|err| anyhow!("failed to hash email: {err}"))?;

    let created = store
        .insert_user(&NewUser {
            username: username.to_string(),
            password: password_hash,
            email: email_hash,
            salt,
            email_salt,
            register_time: Utc::now(),
            edit_permission: EDIT_PERMISSION_ENABLED,
        })
        .await?;

    if !created {
        return Err(ServiceError::Conflict("用户名已存在"));
    }

    info!(username = %username, "user registered");
    Ok(ApiMessage::new("注册成功"))
}

/// Checks credentials and issues a session token.
///
/// The login counter is bumped and persisted on every attempt, including
/// failed ones.
pub async fn login(state: &AppState, username: &str, password: &str) -> ServiceResult<LoginResponse> {
    let store = state.store();
    let mut user = store
        .find_user(username)
        .await?
        .ok_or(ServiceError::NotFound("用户名不存在"))?;

    let matches = hashing::verify_password(password, &user.password);

    user.login_count += 1;
    store.save_user(&user).await?;

    if !matches {
        warn!(username = %username, attempts = user.login_count, "login rejected");
        return Err(ServiceError::WrongCredentials("密码错误"));
    }

    let token = auth::issue_token(&state.config().jwt, &user.username)
        .map_err(|err| anyhow!("failed to sign token: {err}"))?;

    Ok(LoginResponse {
        message: "登录成功".to_string(),
        username: user.username,
        authorization: token,
        login_count: user.login_count,
        edit_permission: user.edit_permission,
    })
}

/// Replaces the password when the supplied email matches the stored hash.
///
/// The reset counter is bumped on every attempt.
pub async fn reset_password(
    state: &AppState,
    username: &str,
    email: &str,
    new_password: &str,
) -> ServiceResult<ApiMessage> {
    let store = state.store();
    let mut user = store
        .find_user(username)
        .await?
        .ok_or(ServiceError::NotFound("用户不存在"))?;

    let email_matches = user
        .email_salt
        .as_deref()
        .is_some_and(|salt| hashing::verify_email(email, &user.email, salt));

    user.reset_password_count += 1;

    if !email_matches {
        store.save_user(&user).await?;
        warn!(username = %username, attempts = user.reset_password_count, "password reset rejected");
        return Err(ServiceError::WrongCredentials("邮箱错误"));
    }

    let salt = hashing::generate_salt();
    user.password = hashing::hash_password(new_password, &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?;
    user.salt = salt;
    store.save_user(&user).await?;

    info!(username = %username, "password reset");
    Ok(ApiMessage::new("密码重置成功"))
}

/// Existence check for the token holder. Never exposes user fields.
pub async fn get_user_info(state: &AppState, username: &str) -> ServiceResult<ApiMessage> {
    state
        .store()
        .find_user(username)
        .await?
        .ok_or(ServiceError::NotFound("用户不存在"))?;
    Ok(ApiMessage::new("获取用户信息成功"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::state::test_state;
    use tempfile::tempdir;

    #[tokio::test]
    async fn duplicate_registration_conflicts_without_new_row() {
        let dir = tempdir().expect("temp dir");
        let (state, store) = test_state(dir.path());

        let first = register(&state, "peacock", "pw", "p@example.com").await.expect("register");
        assert_eq!(first.message, "注册成功");

        for _ in 0..2 {
            let err = register(&state, "peacock", "other", "x@example.com")
                .await
                .expect_err("duplicate");
            assert!(matches!(err, ServiceError::Conflict(_)));
            assert_eq!(err.message(), "用户名已存在");
        }
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn registration_stores_hashes_and_defaults() {
        let dir = tempdir().expect("temp dir");
        let (state, store) = test_state(dir.path());
        register(&state, "filia", "samson", "filia@example.com").await.expect("register");

        let user = store.find_user("filia").await.expect("query").expect("user");
        assert_ne!(user.password, "samson");
        assert_ne!(user.email, "filia@example.com");
        assert_ne!(Some(user.salt.clone()), user.email_salt);
        assert_eq!(user.edit_permission, EDIT_PERMISSION_ENABLED);
        assert_eq!((user.edit_count, user.login_count, user.reset_password_count), (0, 0, 0));
        assert!(user.last_edit_time.is_none());
    }

    #[tokio::test]
    async fn login_counts_every_attempt_and_issues_token() {
        let dir = tempdir().expect("temp dir");
        let (state, store) = test_state(dir.path());
        register(&state, "cerebella", "vice", "c@example.com").await.expect("register");

        let err = login(&state, "cerebella", "wrong").await.expect_err("bad password");
        assert_eq!(err.message(), "密码错误");
        let user = store.find_user("cerebella").await.expect("query").expect("user");
        assert_eq!(user.login_count, 1);

        let response = login(&state, "cerebella", "vice").await.expect("login");
        assert_eq!(response.message, "登录成功");
        assert_eq!(response.login_count, 2);
        assert_eq!(response.edit_permission, EDIT_PERMISSION_ENABLED);

        let claims = auth::verify_token(&state.config().jwt, &response.authorization).expect("token");
        assert_eq!(claims.username, "cerebella");
    }

    #[tokio::test]
    async fn login_unknown_user_is_not_found() {
        let dir = tempdir().expect("temp dir");
        let (state, _) = test_state(dir.path());
        let err = login(&state, "ghost", "pw").await.expect_err("missing");
        assert!(matches!(err, ServiceError::NotFound("用户名不存在")));
    }

    #[tokio::test]
    async fn reset_with_correct_email_replaces_password() {
        let dir = tempdir().expect("temp dir");
        let (state, store) = test_state(dir.path());
        register(&state, "valentine", "old-pass", "v@example.com").await.expect("register");

        let message = reset_password(&state, "valentine", "v@example.com", "new-pass")
            .await
            .expect("reset");
        assert_eq!(message.message, "密码重置成功");

        assert!(login(&state, "valentine", "new-pass").await.is_ok());
        let err = login(&state, "valentine", "old-pass").await.expect_err("old password");
        assert!(matches!(err, ServiceError::WrongCredentials(_)));

        let user = store.find_user("valentine").await.expect("query").expect("user");
        assert_eq!(user.reset_password_count, 1);
    }

    #[tokio::test]
    async fn reset_with_wrong_email_counts_attempt_and_keeps_password() {
        let dir = tempdir().expect("temp dir");
        let (state, store) = test_state(dir.path());
        register(&state, "painwheel", "pw", "pw@example.com").await.expect("register");

        let err = reset_password(&state, "painwheel", "nope@example.com", "new")
            .await
            .expect_err("wrong email");
        assert_eq!(err.message(), "邮箱错误");

        let user = store.find_user("painwheel").await.expect("query").expect("user");
        assert_eq!(user.reset_password_count, 1);
        assert!(login(&state, "painwheel", "pw").await.is_ok());
    }

    #[tokio::test]
    async fn reset_unknown_user_is_not_found() {
        let dir = tempdir().expect("temp dir");
        let (state, _) = test_state(dir.path());
        let err = reset_password(&state, "ghost", "g@example.com", "pw")
            .await
            .expect_err("missing");
        assert_eq!(err.message(), "用户不存在");
    }

    #[tokio::test]
    async fn user_info_only_reports_existence() {
        let dir = tempdir().expect("temp dir");
        let (state, _) = test_state(dir.path());
        register(&state, "squigly", "pw", "s@example.com").await.expect("register");

        let found = get_user_info(&state, "squigly").await.expect("info");
        assert_eq!(found, ApiMessage::new("获取用户信息成功"));
        let err = get_user_info(&state, "ghost").await.expect_err("missing");
        assert_eq!(err.message(), "用户不存在");
    }
}
