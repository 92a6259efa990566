use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A stored endpoint and credential for one RabbitMQ management API
#[derive(Clone, Serialize, Deserialize, FromRow)]
pub struct ClusterConnection {
    pub id: Uuid,
    pub name: String,
    pub api_url: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub is_active: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Hand-written so the stored secret never ends up in logs
impl std::fmt::Debug for ClusterConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterConnection")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field("password", &"***")
            .field("is_active", &self.is_active)
            .finish()
    }
}

/// Input for creating a connection
#[derive(Debug, Clone, Deserialize)]
pub struct NewClusterConnection {
    pub name: String,
    pub api_url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub description: Option<String>,
}

fn default_active() -> bool {
    true
}

/// Partial update; absent fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterConnectionUpdate {
    pub name: Option<String>,
    pub api_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
    pub description: Option<String>,
}

impl ClusterConnection {
    pub fn from_new(input: NewClusterConnection) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            api_url: input.api_url.trim().to_string(),
            username: input.username,
            password: input.password,
            is_active: input.is_active,
            description: input.description,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an update in place. Returns true when the endpoint, the
    /// credential or the active flag changed, i.e. when a pooled client
    /// built from the old values must not be reused.
    pub fn apply(&mut self, update: ClusterConnectionUpdate) -> bool {
        let mut connection_changed = false;

        if let Some(name) = update.name {
            self.name = name.trim().to_string();
        }
        if let Some(api_url) = update.api_url {
            let api_url = api_url.trim().to_string();
            connection_changed |= api_url != self.api_url;
            self.api_url = api_url;
        }
        if let Some(username) = update.username {
            connection_changed |= username != self.username;
            self.username = username;
        }
        if let Some(password) = update.password {
            connection_changed |= password != self.password;
            self.password = password;
        }
        if let Some(is_active) = update.is_active {
            connection_changed |= is_active != self.is_active;
            self.is_active = is_active;
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }

        self.updated_at = Utc::now();
        connection_changed
    }
}
