use sqlx::SqliteConnection;

use crate::{
    db_types::{DealMessage, NewMessage},
    traits::{ChatSummary, MessageHit, ThreadApiError},
};

pub async fn insert_message(message: NewMessage, conn: &mut SqliteConnection) -> Result<DealMessage, ThreadApiError> {
    let message = sqlx::query_as(
        r#"
            INSERT INTO deal_messages (deal_id, sender_id, message_text, kind)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(message.deal_id)
    .bind(message.sender_id)
    .bind(message.message_text)
    .bind(message.kind)
    .fetch_one(conn)
    .await?;
    Ok(message)
}

pub async fn messages_for_deal(
    deal_id: i64,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<DealMessage>, ThreadApiError> {
    let messages =
        sqlx::query_as("SELECT * FROM deal_messages WHERE deal_id = $1 ORDER BY created_at ASC, id ASC LIMIT $2")
            .bind(deal_id)
            .bind(limit)
            .fetch_all(conn)
            .await?;
    Ok(messages)
}

pub async fn unread_count(deal_id: i64, reader_id: i64, conn: &mut SqliteConnection) -> Result<i64, ThreadApiError> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(*) FROM deal_messages WHERE deal_id = $1 AND sender_id != $2 AND read_by_partner = FALSE",
    )
    .bind(deal_id)
    .bind(reader_id)
    .fetch_one(conn)
    .await?;
    Ok(count)
}

pub async fn mark_messages_read(
    deal_id: i64,
    reader_id: i64,
    conn: &mut SqliteConnection,
) -> Result<u64, ThreadApiError> {
    let result = sqlx::query(
        "UPDATE deal_messages SET read_by_partner = TRUE WHERE deal_id = $1 AND sender_id != $2 AND read_by_partner = \
         FALSE",
    )
    .bind(deal_id)
    .bind(reader_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Per-sender counts of user messages, for the transcript header.
pub async fn counts_by_sender(deal_id: i64, conn: &mut SqliteConnection) -> Result<Vec<(i64, i64)>, ThreadApiError> {
    let counts = sqlx::query_as(
        "SELECT sender_id, COUNT(*) FROM deal_messages WHERE deal_id = $1 AND kind = 'user' GROUP BY sender_id",
    )
    .bind(deal_id)
    .fetch_all(conn)
    .await?;
    Ok(counts)
}

pub async fn chat_summaries(limit: i64, conn: &mut SqliteConnection) -> Result<Vec<ChatSummary>, ThreadApiError> {
    let summaries = sqlx::query_as(
        r#"
            SELECT d.id AS deal_id,
                   d.deal_code AS deal_code,
                   d.status AS status,
                   COUNT(dm.id) AS message_count,
                   MAX(dm.created_at) AS last_message_at
            FROM deals d
            JOIN deal_messages dm ON dm.deal_id = d.id
            GROUP BY d.id
            ORDER BY MAX(dm.created_at) DESC
            LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(summaries)
}

pub async fn search_messages(
    term: &str,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<MessageHit>, ThreadApiError> {
    let hits = sqlx::query_as(
        r#"
            SELECT dm.id AS message_id,
                   dm.deal_id AS deal_id,
                   d.deal_code AS deal_code,
                   d.status AS deal_status,
                   dm.sender_id AS sender_id,
                   dm.message_text AS message_text,
                   dm.created_at AS created_at
            FROM deal_messages dm
            JOIN deals d ON dm.deal_id = d.id
            WHERE dm.message_text LIKE $1
            ORDER BY dm.created_at DESC
            LIMIT $2
        "#,
    )
    .bind(format!("%{term}%"))
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(hits)
}
