use chrono::{DateTime, Utc};
use sqlx::Row;

use fieldpulse_core::domain::message::{InfoMessage, MessageId};

use super::{new_id, parse_timestamp, RepositoryError};
use crate::DbPool;

pub struct SqlMessageRepository {
    pool: DbPool,
}

impl SqlMessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        title: &str,
        body: &str,
        audience_role: Option<&str>,
        created_by: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<InfoMessage, RepositoryError> {
        let message = InfoMessage {
            id: MessageId(new_id("MSG")),
            title: title.to_string(),
            body: body.to_string(),
            audience_role: audience_role.map(str::to_string),
            created_by: created_by.to_string(),
            created_at: Utc::now(),
            expires_at,
        };

        sqlx::query(
            "INSERT INTO info_message (id, title, body, audience_role, created_by, created_at,
                expires_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id.0)
        .bind(&message.title)
        .bind(&message.body)
        .bind(&message.audience_role)
        .bind(&message.created_by)
        .bind(message.created_at.to_rfc3339())
        .bind(message.expires_at.map(|at| at.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(|error| RepositoryError::from_write(error, "message"))?;

        Ok(message)
    }

    /// Unexpired messages visible to `role` (all roles when `None`), newest first.
    ///
    /// Expiry is compared on parsed timestamps; stored RFC 3339 strings with differing
    /// fractional precision do not order correctly as text.
    pub async fn list_active(
        &self,
        at: DateTime<Utc>,
        role: Option<&str>,
    ) -> Result<Vec<InfoMessage>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, title, body, audience_role, created_by, created_at, expires_at
             FROM info_message
             ORDER BY created_at DESC, id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let message = row_to_message(row)?;
            if message.is_active_at(at) && message.is_visible_to(role) {
                messages.push(message);
            }
        }
        Ok(messages)
    }
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<InfoMessage, RepositoryError> {
    let created_at: String = row.try_get("created_at")?;
    let expires_at: Option<String> = row.try_get("expires_at")?;

    Ok(InfoMessage {
        id: MessageId(row.try_get("id")?),
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        audience_role: row.try_get("audience_role")?,
        created_by: row.try_get("created_by")?,
        created_at: parse_timestamp("created_at", &created_at)?,
        expires_at: expires_at.as_deref().map(|raw| parse_timestamp("expires_at", raw)).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::SqlMessageRepository;
    use crate::{connect_in_memory, migrations};

    #[tokio::test]
    async fn expired_and_other_audience_messages_are_hidden() {
        let pool = connect_in_memory().await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repo = SqlMessageRepository::new(pool.clone());
        let now = Utc::now();

        repo.create("All hands", "Q2 kickoff", None, "E-RSM", None).await.expect("create");
        repo.create("BE only", "New detailing aid", Some("BE"), "E-RSM", None)
            .await
            .expect("create");
        repo.create("Old", "Expired", None, "E-RSM", Some(now - Duration::days(1)))
            .await
            .expect("create");

        let for_managers = repo.list_active(now, Some("ASM")).await.expect("list");
        assert_eq!(for_managers.len(), 1);
        assert_eq!(for_managers[0].title, "All hands");

        let for_leaves = repo.list_active(now, Some("be")).await.expect("list");
        assert_eq!(for_leaves.len(), 2);

        assert_eq!(repo.list_active(now, None).await.expect("list").len(), 2);

        pool.close().await;
    }
}
