mod mysql;

#[cfg(test)]
pub mod memory;

pub use mysql::MySqlStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Full `users` row. Password and email hold salted hashes only.
#[derive(Clone, Debug, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub email: String,
    pub salt: String,
    pub email_salt: Option<String>,
    pub register_time: DateTime<Utc>,
    pub edit_permission: i8,
    pub last_edit_time: Option<DateTime<Utc>>,
    pub edit_count: i32,
    pub login_count: i32,
    pub reset_password_count: i32,
}

#[derive(Clone, Debug)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: String,
    pub salt: String,
    pub email_salt: String,
    pub register_time: DateTime<Utc>,
    pub edit_permission: i8,
}

/// Roster entry returned to the operator after an admin login.
#[derive(Clone, Debug, FromRow, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub username: String,
    pub last_edit_time: Option<DateTime<Utc>>,
    pub edit_count: i32,
    pub edit_permission: i8,
    pub register_time: DateTime<Utc>,
}

#[derive(Clone, Debug, FromRow)]
pub struct PageRecord {
    pub id: i64,
    pub route: String,
    pub data: String,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, username: &str) -> Result<Option<UserRecord>>;

    /// Returns `false` when the username is already taken.
    async fn insert_user(&self, user: &NewUser) -> Result<bool>;

    /// Persists every mutable column of an existing row.
    async fn save_user(&self, user: &UserRecord) -> Result<()>;

    async fn list_user_summaries(&self) -> Result<Vec<UserSummary>>;
}

#[async_trait]
pub trait PageStore: Send + Sync {
    async fn find_page(&self, route: &str) -> Result<Option<PageRecord>>;

    /// Creates the page for `route` or overwrites its payload.
    async fn upsert_page(&self, route: &str, data: &str) -> Result<()>;
}

pub trait Store: UserStore + PageStore {}

impl<T: UserStore + PageStore> Store for T {}
