use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{connection::Database, helpers::to_u64, models::DestinationSummary};

/// Returns the id of the user's destination called `name`, creating it first
/// when it does not exist yet.
pub(crate) fn find_or_create_destination(
    conn: &Connection,
    user_id: &str,
    name: &str,
    stamp: &str,
) -> Result<String> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM destinations WHERE user_id = ?1 AND name = ?2",
            params![user_id, name],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO destinations (id, user_id, name, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, user_id, name, stamp, stamp],
    )
    .with_context(|| format!("failed to create destination '{name}'"))?;

    Ok(id)
}

impl Database {
    /// The user's destinations, alphabetically, with their moment counts.
    pub async fn list_destinations(&self, user_id: &str) -> Result<Vec<DestinationSummary>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT d.id, d.name, COUNT(m.id) AS moment_count
                 FROM destinations d
                 LEFT JOIN moments m ON m.destination_id = d.id
                 WHERE d.user_id = ?1
                 GROUP BY d.id, d.name
                 ORDER BY d.name ASC",
            )?;

            let mut rows = stmt.query(params![user_id])?;
            let mut destinations = Vec::new();
            while let Some(row) = rows.next()? {
                let moment_count: i64 = row.get("moment_count")?;
                destinations.push(DestinationSummary {
                    id: row.get("id")?,
                    name: row.get("name")?,
                    moment_count: to_u64(moment_count, "moment_count")?,
                });
            }

            Ok(destinations)
        })
        .await
    }
}
