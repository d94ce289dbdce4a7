use anyhow::Context;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::info;

use crate::models::Ticket;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Writes tickets back keyed by `key`; re-running with the same tickets
/// leaves the table unchanged apart from `updated_at`.
pub async fn upsert_tickets(pool: &PgPool, tickets: &[Ticket]) -> anyhow::Result<usize> {
    let mut tx = pool.begin().await?;
    let mut written = 0usize;

    for ticket in tickets {
        let result = sqlx::query(
            r#"
            INSERT INTO ticket_insights.tickets (key, data, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (key) DO UPDATE
            SET data = EXCLUDED.data, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&ticket.key)
        .bind(Json(ticket))
        .execute(&mut *tx)
        .await
        .with_context(|| format!("could not upsert ticket {}", ticket.key))?;

        written += result.rows_affected() as usize;
    }

    tx.commit().await.context("could not commit ticket upsert")?;
    info!(written, "tickets written");
    Ok(written)
}

pub async fn fetch_tickets(pool: &PgPool) -> anyhow::Result<Vec<Ticket>> {
    let rows = sqlx::query("SELECT key, data FROM ticket_insights.tickets ORDER BY key")
        .fetch_all(pool)
        .await?;

    decode_rows(rows)
}

/// Stored versions of the given tickets; keys not yet stored are absent.
pub async fn fetch_tickets_by_keys(
    pool: &PgPool,
    keys: &[String],
) -> anyhow::Result<Vec<Ticket>> {
    let rows = sqlx::query(
        "SELECT key, data FROM ticket_insights.tickets WHERE key = ANY($1) ORDER BY key",
    )
    .bind(keys)
    .fetch_all(pool)
    .await
    .context("could not load stored tickets")?;

    decode_rows(rows)
}

fn decode_rows(rows: Vec<PgRow>) -> anyhow::Result<Vec<Ticket>> {
    let mut tickets = Vec::with_capacity(rows.len());
    for row in rows {
        let key: String = row.get("key");
        let Json(ticket): Json<Ticket> = row
            .try_get("data")
            .with_context(|| format!("could not decode ticket {key}"))?;
        tickets.push(ticket);
    }

    Ok(tickets)
}
