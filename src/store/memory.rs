use std::{collections::HashMap, sync::Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use super::{NewUser, PageRecord, PageStore, UserRecord, UserStore, UserSummary};

/// In-process store backing the workflow tests.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<Vec<UserRecord>>,
    pages: Mutex<HashMap<String, PageRecord>>,
}

impl MemoryStore {
    pub fn user_count(&self) -> usize {
        self.users.lock().map(|users| users.len()).unwrap_or_default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, username: &str) -> Result<Option<UserRecord>> {
        let users = self.users.lock().map_err(|_| anyhow!("user lock poisoned"))?;
        Ok(users.iter().find(|user| user.username == username).cloned())
    }

    async fn insert_user(&self, user: &NewUser) -> Result<bool> {
        let mut users = self.users.lock().map_err(|_| anyhow!("user lock poisoned"))?;
        if users.iter().any(|existing| existing.username == user.username) {
            return Ok(false);
        }
        let id = users.len() as i64 + 1;
        users.push(UserRecord {
            id,
            username: user.username.clone(),
            password: user.password.clone(),
            email: user.email.clone(),
            salt: user.salt.clone(),
            email_salt: Some(user.email_salt.clone()),
            register_time: user.register_time,
            edit_permission: user.edit_permission,
            last_edit_time: None,
            edit_count: 0,
            login_count: 0,
            reset_password_count: 0,
        });
        Ok(true)
    }

    async fn save_user(&self, user: &UserRecord) -> Result<()> {
        let mut users = self.users.lock().map_err(|_| anyhow!("user lock poisoned"))?;
        let slot = users
            .iter_mut()
            .find(|existing| existing.id == user.id)
            .ok_or_else(|| anyhow!("user {} does not exist", user.id))?;
        *slot = user.clone();
        Ok(())
    }

    async fn list_user_summaries(&self) -> Result<Vec<UserSummary>> {
        let users = self.users.lock().map_err(|_| anyhow!("user lock poisoned"))?;
        Ok(users
            .iter()
            .map(|user| UserSummary {
                username: user.username.clone(),
                last_edit_time: user.last_edit_time,
                edit_count: user.edit_count,
                edit_permission: user.edit_permission,
                register_time: user.register_time,
            })
            .collect())
    }
}

#[async_trait]
impl PageStore for MemoryStore {
    async fn find_page(&self, route: &str) -> Result<Option<PageRecord>> {
        let pages = self.pages.lock().map_err(|_| anyhow!("page lock poisoned"))?;
        Ok(pages.get(route).cloned())
    }

    async fn upsert_page(&self, route: &str, data: &str) -> Result<()> {
        let mut pages = self.pages.lock().map_err(|_| anyhow!("page lock poisoned"))?;
        let next_id = pages.len() as i64 + 1;
        pages
            .entry(route.to_string())
            .and_modify(|page| page.data = data.to_string())
            .or_insert_with(|| PageRecord {
                id: next_id,
                route: route.to_string(),
                data: data.to_string(),
            });
        Ok(())
    }
}
