use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    Connection, Executor, MySqlConnection, MySqlPool, mysql::MySqlPoolOptions,
};
use tracing::info;

use super::{NewUser, PageRecord, PageStore, UserRecord, UserStore, UserSummary};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Creates the database if needed, connects the pool and, outside
    /// production, creates the schema when the database has no tables yet.
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        ensure_database(config).await?;

        let pool = MySqlPoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect(&config.database_url())
            .await
            .context("failed to connect to MySQL")?;

        if !config.server.production {
            let tables = sqlx::query("SHOW TABLES")
                .fetch_all(&pool)
                .await
                .context("failed to list tables")?;

            if tables.is_empty() {
                info!("数据库中没有检测到表，将执行首次自动同步...");
                sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .context("failed to run database migrations")?;
            }
        }

        Ok(Self { pool })
    }
}

async fn ensure_database(config: &AppConfig) -> Result<()> {
    let mut connection = MySqlConnection::connect(&config.server_url())
        .await
        .context("failed to connect to MySQL server")?;

    let name = config.database.database.replace('`', "``");
    let statement = format!(
        "CREATE DATABASE IF NOT EXISTS `{name}` DEFAULT CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci"
    );
    connection
        .execute(statement.as_str())
        .await
        .context("failed to create database")?;

    connection
        .close()
        .await
        .context("failed to close bootstrap connection")?;
    Ok(())
}

#[async_trait]
impl UserStore for MySqlStore {
    async fn find_user(&self, username: &str) -> Result<Option<UserRecord>> {
        sqlx::query_as::<_, UserRecord>(
            "SELECT id, username, password, email, salt, email_salt, register_time, edit_permission, last_edit_time, edit_count, login_count, reset_password_count FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch user")
    }

    async fn insert_user(&self, user: &NewUser) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO users (username, password, email, salt, email_salt, register_time, edit_permission, edit_count, login_count, reset_password_count)
             VALUES (?, ?, ?, ?, ?, ?, ?, 0, 0, 0)",
        )
        .bind(&user.username)
        .bind(&user.password)
        .bind(&user.email)
        .bind(&user.salt)
        .bind(&user.email_salt)
        .bind(user.register_time)
        .bind(user.edit_permission)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Ok(false),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    async fn save_user(&self, user: &UserRecord) -> Result<()> {
        sqlx::query(
            "UPDATE users
             SET password = ?, email = ?, salt = ?, email_salt = ?, edit_permission = ?,
                 last_edit_time = ?, edit_count = ?, login_count = ?, reset_password_count = ?
             WHERE id = ?",
        )
        .bind(&user.password)
        .bind(&user.email)
        .bind(&user.salt)
        .bind(&user.email_salt)
        .bind(user.edit_permission)
        .bind(user.last_edit_time)
        .bind(user.edit_count)
        .bind(user.login_count)
        .bind(user.reset_password_count)
        .bind(user.id)
        .execute(&self.pool)
        .await
        .context("failed to update user")?;
        Ok(())
    }

    async fn list_user_summaries(&self) -> Result<Vec<UserSummary>> {
        sqlx::query_as::<_, UserSummary>(
            "SELECT username, last_edit_time, edit_count, edit_permission, register_time FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list users")
    }
}

#[async_trait]
impl PageStore for MySqlStore {
    async fn find_page(&self, route: &str) -> Result<Option<PageRecord>> {
        sqlx::query_as::<_, PageRecord>("SELECT id, route, data FROM pages WHERE route = ?")
            .bind(route)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch page")
    }

    async fn upsert_page(&self, route: &str, data: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO pages (route, data) VALUES (?, ?)
             ON DUPLICATE KEY UPDATE data = VALUES(data)",
        )
        .bind(route)
        .bind(data)
        .execute(&self.pool)
        .await
        .context("failed to save page")?;
        Ok(())
    }
}
