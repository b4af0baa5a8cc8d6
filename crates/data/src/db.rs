use sqlx::{PgPool, Row};
use tickerchat_core::{ChatMessage, NewChatMessage, User};

/// Postgres SQLSTATE for a unique constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Run embedded migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

/// Insert a chat message and return the stored row.
pub async fn insert_chat_message(
    pool: &PgPool,
    message: &NewChatMessage,
) -> Result<ChatMessage, sqlx::Error> {
    let row = sqlx::query(
        "INSERT INTO chat_messages (from_user, text, time, delivered, seen, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING id",
    )
    .bind(&message.from_user)
    .bind(&message.text)
    .bind(&message.time)
    .bind(message.delivered)
    .bind(message.seen)
    .bind(message.created_at)
    .fetch_one(pool)
    .await?;

    Ok(ChatMessage {
        id: row.get("id"),
        from_user: message.from_user.clone(),
        text: message.text.clone(),
        time: message.time.clone(),
        created_at: message.created_at,
        delivered: message.delivered,
        seen: message.seen,
    })
}

/// Load the latest `limit` chat messages, oldest first.
pub async fn recent_chat_messages(pool: &PgPool, limit: i64) -> Result<Vec<ChatMessage>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT id, from_user, text, time, created_at, delivered, seen
         FROM (
             SELECT * FROM chat_messages
             ORDER BY created_at DESC, id DESC
             LIMIT $1
         ) latest
         ORDER BY created_at ASC, id ASC",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let messages = rows
        .iter()
        .map(|r| ChatMessage {
            id: r.get("id"),
            from_user: r.get("from_user"),
            text: r.get("text"),
            time: r.get("time"),
            created_at: r.get("created_at"),
            delivered: r.get("delivered"),
            seen: r.get("seen"),
        })
        .collect();

    Ok(messages)
}

/// Set `seen` on every message whose id is in `ids`.
pub async fn mark_chat_messages_seen(pool: &PgPool, ids: &[i64]) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE chat_messages SET seen = TRUE WHERE id = ANY($1)")
        .bind(ids)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Insert a user. The caller supplies an already-hashed password.
pub async fn insert_user(
    pool: &PgPool,
    username: &str,
    password_hash: &str,
) -> Result<User, sqlx::Error> {
    let row = sqlx::query(
        "INSERT INTO app_users (username, password)
         VALUES ($1, $2)
         RETURNING id, username",
    )
    .bind(username)
    .bind(password_hash)
    .fetch_one(pool)
    .await?;

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        password_hash: password_hash.to_string(),
    })
}

/// Find a user by username.
pub async fn find_user_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query("SELECT id, username, password FROM app_users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| User {
        id: r.get("id"),
        username: r.get("username"),
        password_hash: r.get("password"),
    }))
}

/// True if the error is a unique constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}
