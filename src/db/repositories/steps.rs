use std::collections::HashMap;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, Row, ToSql};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, to_u32},
    models::{Step, StepRecord},
};

const STEP_COLUMNS: &str = "id, moment_id, order_id, name, description, start_date_and_time, duration, end_date_and_time";

fn row_to_step(row: &Row) -> Result<Step> {
    let order_id: i64 = row.get("order_id")?;
    let duration: i64 = row.get("duration")?;
    let start: String = row.get("start_date_and_time")?;
    let end: String = row.get("end_date_and_time")?;

    Ok(Step {
        id: row.get("id")?,
        moment_id: row.get("moment_id")?,
        order_id: to_u32(order_id, "order_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        start_date_and_time: parse_datetime(&start, "step start_date_and_time")?,
        duration: to_u32(duration, "duration")?,
        end_date_and_time: parse_datetime(&end, "step end_date_and_time")?,
    })
}

/// Steps for each of `moment_ids`, keyed by moment and ordered by `order_id`.
pub(crate) fn load_steps(
    conn: &Connection,
    moment_ids: &[String],
) -> Result<HashMap<String, Vec<Step>>> {
    let mut grouped: HashMap<String, Vec<Step>> = HashMap::new();
    if moment_ids.is_empty() {
        return Ok(grouped);
    }

    let placeholders = vec!["?"; moment_ids.len()].join(", ");
    let query = format!(
        "SELECT {STEP_COLUMNS}
         FROM steps
         WHERE moment_id IN ({placeholders})
         ORDER BY moment_id ASC, order_id ASC"
    );
    let params_refs: Vec<&dyn ToSql> = moment_ids.iter().map(|id| id as &dyn ToSql).collect();

    let mut stmt = conn.prepare(&query)?;
    let mut rows = stmt.query(params_refs.as_slice())?;
    while let Some(row) = rows.next()? {
        let step = row_to_step(row)?;
        grouped.entry(step.moment_id.clone()).or_default().push(step);
    }

    Ok(grouped)
}

pub(crate) fn insert_steps(
    conn: &Connection,
    moment_id: &str,
    steps: &[StepRecord],
    stamp: &str,
) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO steps (id, moment_id, order_id, name, description, start_date_and_time, duration, end_date_and_time, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?;

    for step in steps {
        stmt.execute(params![
            step.id,
            moment_id,
            i64::from(step.order_id),
            step.name,
            step.description,
            format_datetime(&step.start_date_and_time),
            i64::from(step.duration),
            format_datetime(&step.end_date_and_time),
            stamp,
            stamp,
        ])
        .with_context(|| format!("failed to insert step {} of moment {moment_id}", step.order_id))?;
    }

    Ok(())
}

pub(crate) fn delete_steps(conn: &Connection, moment_id: &str) -> Result<usize> {
    conn.execute("DELETE FROM steps WHERE moment_id = ?1", params![moment_id])
        .with_context(|| format!("failed to delete steps of moment {moment_id}"))
}

impl Database {
    pub async fn get_steps(&self, moment_id: &str) -> Result<Vec<Step>> {
        let moment_id = moment_id.to_string();
        self.execute(move |conn| {
            let mut grouped = load_steps(conn, std::slice::from_ref(&moment_id))?;
            Ok(grouped.remove(&moment_id).unwrap_or_default())
        })
        .await
    }

    /// Removes every step of a moment on its own, outside any moment update.
    ///
    /// Updates never go through here: they replace steps inside one
    /// transaction. This exists for maintenance and for reproducing a
    /// half-applied replacement when exercising the consistency audit.
    pub async fn delete_steps_for_moment(&self, moment_id: &str) -> Result<usize> {
        let moment_id = moment_id.to_string();
        self.execute(move |conn| delete_steps(conn, &moment_id)).await
    }
}
