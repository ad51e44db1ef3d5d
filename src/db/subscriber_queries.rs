use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{RegisterOutcome, Subscriber};

// ==============================================================================
// Subscriber CRUD
// ==============================================================================

/// Registers a subscriber. With a Telegram chat id the request is
/// auto-approved; without one it stays pending for admin review. Repeat
/// registrations return the existing record instead of duplicating it.
pub async fn register(
    pool: &PgPool,
    username: &str,
    telegram_id: Option<&str>,
) -> Result<RegisterOutcome, sqlx::Error> {
    let existing = sqlx::query_as::<_, Subscriber>(
        r#"
        SELECT * FROM subscribers WHERE username = $1
        "#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    if let Some(existing) = existing {
        return Ok(RegisterOutcome {
            id: existing.id,
            username: existing.username,
            message: format!("Already registered with status: {}", existing.status),
            status: existing.status,
        });
    }

    let outcome = match telegram_id {
        Some(chat_id) => {
            let row = sqlx::query_as::<_, Subscriber>(
                r#"
                INSERT INTO subscribers (username, telegram_id, status, approved_at)
                VALUES ($1, $2, 'approved', NOW())
                RETURNING *
                "#,
            )
            .bind(username)
            .bind(chat_id)
            .fetch_one(pool)
            .await?;

            RegisterOutcome {
                id: row.id,
                username: row.username,
                status: row.status,
                message: "Auto-approved successfully.".to_string(),
            }
        }
        None => {
            let row = sqlx::query_as::<_, Subscriber>(
                r#"
                INSERT INTO subscribers (username, status)
                VALUES ($1, 'pending')
                RETURNING *
                "#,
            )
            .bind(username)
            .fetch_one(pool)
            .await?;

            RegisterOutcome {
                id: row.id,
                username: row.username,
                status: row.status,
                message: "Request submitted. Pending admin approval.".to_string(),
            }
        }
    };

    Ok(outcome)
}

pub async fn get_all(pool: &PgPool) -> Result<Vec<Subscriber>, sqlx::Error> {
    sqlx::query_as::<_, Subscriber>(
        r#"
        SELECT * FROM subscribers ORDER BY requested_at DESC
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn approve(
    pool: &PgPool,
    subscriber_id: Uuid,
    telegram_id: &str,
) -> Result<Option<Subscriber>, sqlx::Error> {
    sqlx::query_as::<_, Subscriber>(
        r#"
        UPDATE subscribers
        SET status = 'approved', telegram_id = $2, approved_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(subscriber_id)
    .bind(telegram_id)
    .fetch_optional(pool)
    .await
}

pub async fn reject(pool: &PgPool, subscriber_id: Uuid) -> Result<Option<Subscriber>, sqlx::Error> {
    sqlx::query_as::<_, Subscriber>(
        r#"
        UPDATE subscribers
        SET status = 'rejected'
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(subscriber_id)
    .fetch_optional(pool)
    .await
}

/// Chat ids of approved subscribers, for broadcasts.
pub async fn approved_chat_ids(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT telegram_id FROM subscribers
        WHERE status = 'approved' AND telegram_id IS NOT NULL
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}
