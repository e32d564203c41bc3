use async_trait::async_trait;
use carpool_core::repository::{ConversationStore, UserDirectory};
use carpool_core::{StoreResult, UserProfile};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::map_sqlx_error;

/// Read-only view over the users and conversations tables, which other parts of the
/// system write.
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    display_name: String,
    roles: Vec<String>,
    enabled: bool,
    approved: bool,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        UserProfile {
            id: row.id,
            username: row.username,
            display_name: row.display_name,
            roles: row.roles.into_iter().collect(),
            enabled: row.enabled,
            approved: row.approved,
        }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserProfile>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, display_name, roles, enabled, approved FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(UserProfile::from))
    }

    async fn list_enabled(&self) -> StoreResult<Vec<UserProfile>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, display_name, roles, enabled, approved
            FROM users
            WHERE enabled AND approved
            ORDER BY username
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(UserProfile::from).collect())
    }
}

#[async_trait]
impl ConversationStore for PgUserDirectory {
    async fn exists_between(&self, a: Uuid, b: Uuid) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM conversations
                WHERE (participant_a = $1 AND participant_b = $2)
                   OR (participant_a = $2 AND participant_b = $1)
            )
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }
}
