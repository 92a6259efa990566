// Postgres-backed stores. Tables are described in sql/schema.sql.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::models::{
    AuditFilter, AuditRecord, AuditStatus, ClusterConnection, OperationType, ResourceType, User,
};
use super::store::{AuditStore, ClusterStore, StoreError, UserStore};
use crate::types::Role;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map unique-constraint violations to Conflict, everything else passes through
fn map_write_error(err: sqlx::Error, name: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(format!("cluster connection '{}' already exists", name))
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            StoreError::NotFound(db.message().to_string())
        }
        _ => StoreError::Sqlx(err),
    }
}

const CONNECTION_COLUMNS: &str =
    "id, name, api_url, username, password, is_active, description, created_at, updated_at";

#[async_trait]
impl ClusterStore for PgStore {
    async fn list_connections(&self) -> Result<Vec<ClusterConnection>, StoreError> {
        let sql = format!("SELECT {} FROM cluster_connections ORDER BY name", CONNECTION_COLUMNS);
        Ok(sqlx::query_as::<_, ClusterConnection>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_connection(&self, id: Uuid) -> Result<Option<ClusterConnection>, StoreError> {
        let sql = format!("SELECT {} FROM cluster_connections WHERE id = $1", CONNECTION_COLUMNS);
        Ok(sqlx::query_as::<_, ClusterConnection>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_connection(&self, c: &ClusterConnection) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO cluster_connections
                (id, name, api_url, username, password, is_active, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(c.id)
        .bind(&c.name)
        .bind(&c.api_url)
        .bind(&c.username)
        .bind(&c.password)
        .bind(c.is_active)
        .bind(&c.description)
        .bind(c.created_at)
        .bind(c.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &c.name))?;
        Ok(())
    }

    async fn update_connection(&self, c: &ClusterConnection) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE cluster_connections
            SET name = $2, api_url = $3, username = $4, password = $5,
                is_active = $6, description = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(c.id)
        .bind(&c.name)
        .bind(&c.api_url)
        .bind(&c.username)
        .bind(&c.password)
        .bind(c.is_active)
        .bind(&c.description)
        .bind(c.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &c.name))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("cluster connection {}", c.id)));
        }
        Ok(())
    }

    async fn delete_connection(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_cluster_assignments WHERE cluster_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM cluster_connections WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn assigned_cluster_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT cluster_id FROM user_cluster_assignments WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn is_assigned(&self, user_id: Uuid, cluster_id: Uuid) -> Result<bool, StoreError> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM user_cluster_assignments WHERE user_id = $1 AND cluster_id = $2",
        )
        .bind(user_id)
        .bind(cluster_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0 > 0)
    }

    async fn assigned_user_ids(&self, cluster_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT user_id FROM user_cluster_assignments WHERE cluster_id = $1")
                .bind(cluster_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn assign(&self, user_id: Uuid, cluster_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_cluster_assignments (user_id, cluster_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, cluster_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(cluster_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &cluster_id.to_string()))?;
        Ok(())
    }

    async fn unassign(&self, user_id: Uuid, cluster_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM user_cluster_assignments WHERE user_id = $1 AND cluster_id = $2",
        )
        .bind(user_id)
        .bind(cluster_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    role: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, role, is_active, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|r| match Role::parse(&r.role) {
            Some(role) => Some(User {
                id: r.id,
                username: r.username,
                role,
                is_active: r.is_active,
                created_at: r.created_at,
            }),
            None => {
                tracing::warn!("User {} has unknown role '{}'", r.id, r.role);
                None
            }
        }))
    }
}

#[derive(FromRow)]
struct AuditRow {
    id: Uuid,
    user_id: Uuid,
    username: String,
    cluster_id: Uuid,
    cluster_name: String,
    operation: String,
    resource_type: String,
    resource_name: String,
    vhost: Option<String>,
    details: Option<serde_json::Value>,
    status: String,
    error_message: Option<String>,
    operation_at: DateTime<Utc>,
    client_ip: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditRecord {
    type Error = StoreError;

    fn try_from(r: AuditRow) -> Result<Self, Self::Error> {
        let invalid = |what: &str, value: &str| {
            StoreError::Unavailable(format!("audit record {} has invalid {} '{}'", r.id, what, value))
        };
        Ok(AuditRecord {
            operation: OperationType::parse(&r.operation).ok_or_else(|| invalid("operation", &r.operation))?,
            resource_type: ResourceType::parse(&r.resource_type)
                .ok_or_else(|| invalid("resource type", &r.resource_type))?,
            status: AuditStatus::parse(&r.status).ok_or_else(|| invalid("status", &r.status))?,
            id: r.id,
            user_id: r.user_id,
            username: r.username,
            cluster_id: r.cluster_id,
            cluster_name: r.cluster_name,
            resource_name: r.resource_name,
            vhost: r.vhost,
            details: r.details,
            error_message: r.error_message,
            operation_at: r.operation_at,
            client_ip: r.client_ip,
            user_agent: r.user_agent,
            created_at: r.created_at,
        })
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn insert_audit(&self, r: &AuditRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO audit_records
                (id, user_id, username, cluster_id, cluster_name, operation, resource_type,
                 resource_name, vhost, details, status, error_message, operation_at,
                 client_ip, user_agent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(r.id)
        .bind(r.user_id)
        .bind(&r.username)
        .bind(r.cluster_id)
        .bind(&r.cluster_name)
        .bind(r.operation.as_str())
        .bind(r.resource_type.as_str())
        .bind(&r.resource_name)
        .bind(&r.vhost)
        .bind(&r.details)
        .bind(r.status.as_str())
        .bind(&r.error_message)
        .bind(r.operation_at)
        .bind(&r.client_ip)
        .bind(&r.user_agent)
        .bind(r.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_audits(&self, filter: &AuditFilter, max_limit: i64) -> Result<Vec<AuditRecord>, StoreError> {
        let (limit, offset) = filter.page(max_limit);

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, user_id, username, cluster_id, cluster_name, operation, resource_type, \
             resource_name, vhost, details, status, error_message, operation_at, client_ip, \
             user_agent, created_at FROM audit_records WHERE TRUE",
        );
        if let Some(user_id) = filter.user_id {
            query.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(cluster_id) = filter.cluster_id {
            query.push(" AND cluster_id = ").push_bind(cluster_id);
        }
        if let Some(operation) = filter.operation {
            query.push(" AND operation = ").push_bind(operation.as_str());
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(since) = filter.since {
            query.push(" AND operation_at >= ").push_bind(since);
        }
        if let Some(until) = filter.until {
            query.push(" AND operation_at <= ").push_bind(until);
        }
        query
            .push(" ORDER BY operation_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows: Vec<AuditRow> = query.build_query_as::<AuditRow>().fetch_all(&self.pool).await?;
        rows.into_iter().map(AuditRecord::try_from).collect()
    }
}
