//! Mock user directory for testing.

use crate::traits::{ConnectorError, ConnectorResult, DirectoryUser, UserDirectory};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory directory keyed by login.
#[derive(Clone, Default)]
pub struct MockUserDirectory {
    users: Arc<RwLock<HashMap<String, DirectoryUser>>>,
    calls: Arc<RwLock<Vec<String>>>,
    next_mutation_error: Arc<RwLock<Option<ConnectorError>>>,
}

fn build_user(id: &str, status: &str, profile: Map<String, Value>) -> DirectoryUser {
    DirectoryUser {
        id: id.to_string(),
        status: Some(status.to_string()),
        raw: json!({"id": id, "status": status, "profile": profile}),
        profile,
    }
}

impl MockUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A directory holding `jdoe@company.com` (active) and `admin@company.com`.
    pub fn with_sample_data() -> Self {
        let mut users = HashMap::new();
        for (id, login, first, last) in [
            ("00u-jdoe", "jdoe@company.com", "John", "Doe"),
            ("00u-admin", "admin@company.com", "Admin", "User"),
        ] {
            let profile = json!({
                "login": login,
                "email": login,
                "firstName": first,
                "lastName": last,
            });
            let profile = profile.as_object().cloned().unwrap_or_default();
            users.insert(login.to_string(), build_user(id, "ACTIVE", profile));
        }
        Self {
            users: Arc::new(RwLock::new(users)),
            ..Self::default()
        }
    }

    /// Makes the next create, update, activate or deactivate call fail.
    pub async fn fail_next_mutation(&self, error: ConnectorError) {
        *self.next_mutation_error.write().await = Some(error);
    }

    /// Operations called so far, e.g. `"deactivate:00u-jdoe"`.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }

    pub async fn contains(&self, login: &str) -> bool {
        self.users.read().await.contains_key(login)
    }

    pub async fn user(&self, login: &str) -> Option<DirectoryUser> {
        self.users.read().await.get(login).cloned()
    }

    async fn record(&self, call: String) -> ConnectorResult<()> {
        self.calls.write().await.push(call);
        Ok(())
    }

    async fn take_mutation_error(&self) -> ConnectorResult<()> {
        match self.next_mutation_error.write().await.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn set_status(&self, user_id: &str, status: &str) -> ConnectorResult<()> {
        let mut users = self.users.write().await;
        let user = users
            .values_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| ConnectorError::NotFound(format!("User not found: {}", user_id)))?;
        user.status = Some(status.to_string());
        user.raw["status"] = json!(status);
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for MockUserDirectory {
    async fn find_user_by_login(&self, login: &str) -> ConnectorResult<Option<DirectoryUser>> {
        self.record(format!("find:{}", login)).await?;
        Ok(self.users.read().await.get(login).cloned())
    }

    async fn create_user(&self, profile: &Map<String, Value>) -> ConnectorResult<DirectoryUser> {
        self.take_mutation_error().await?;
        let login = profile
            .get("login")
            .or_else(|| profile.get("email"))
            .and_then(Value::as_str)
            .ok_or_else(|| ConnectorError::InvalidRequest("Profile has no login".into()))?
            .to_string();
        self.record(format!("create:{}", login)).await?;

        let mut profile = profile.clone();
        profile
            .entry("login".to_string())
            .or_insert_with(|| json!(login));
        let user = build_user(&format!("00u-{}", login), "ACTIVE", profile);
        self.users.write().await.insert(login, user.clone());
        Ok(user)
    }

    async fn update_user(
        &self,
        user_id: &str,
        profile: &Map<String, Value>,
    ) -> ConnectorResult<DirectoryUser> {
        self.take_mutation_error().await?;
        self.record(format!("update:{}", user_id)).await?;

        let mut users = self.users.write().await;
        let user = users
            .values_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| ConnectorError::NotFound(format!("User not found: {}", user_id)))?;
        user.profile = profile.clone();
        user.raw["profile"] = Value::Object(profile.clone());
        Ok(user.clone())
    }

    async fn activate_user(&self, user_id: &str) -> ConnectorResult<()> {
        self.take_mutation_error().await?;
        self.record(format!("activate:{}", user_id)).await?;
        self.set_status(user_id, "ACTIVE").await
    }

    async fn deactivate_user(&self, user_id: &str) -> ConnectorResult<()> {
        self.take_mutation_error().await?;
        self.record(format!("deactivate:{}", user_id)).await?;
        self.set_status(user_id, "DEPROVISIONED").await
    }
}
