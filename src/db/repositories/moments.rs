use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};

use crate::{
    db::{
        connection::Database,
        helpers::{format_datetime, parse_datetime, to_i64, to_u32, to_u64},
        models::{Moment, MomentRecord},
        repositories::{
            destinations::find_or_create_destination,
            steps::{delete_steps, insert_steps, load_steps},
        },
    },
    error::MomentsError,
    temporal::{rank::sql_before_clause, Partition},
};

const MOMENT_SELECT: &str = "SELECT m.id, m.user_id, m.destination_id, d.name AS destination_name,
            m.activity, m.name, m.is_indispensable, m.description,
            m.start_date_and_time, m.duration, m.end_date_and_time,
            m.created_at, m.updated_at
     FROM moments m
     JOIN destinations d ON d.id = m.destination_id";

/// `WHERE` side of a partition query: owner, temporal partition against a
/// fixed `now`, and an optional case-sensitive name filter.
#[derive(Debug, Clone)]
pub struct MomentFilter {
    pub user_id: String,
    pub partition: Partition,
    pub now: DateTime<Utc>,
    /// Empty disables filtering.
    pub search: String,
}

impl MomentFilter {
    pub fn new(user_id: impl Into<String>, partition: Partition, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            partition,
            now,
            search: String::new(),
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    fn where_clause(&self) -> (String, Vec<Box<dyn ToSql>>) {
        let mut conditions = vec!["m.user_id = ?"];
        let mut params_vec: Vec<Box<dyn ToSql>> = vec![Box::new(self.user_id.clone())];

        if let Some(predicate) = self.partition.sql_predicate() {
            conditions.push(predicate.clause);
            let now = format_datetime(&self.now);
            for _ in 0..predicate.now_bindings {
                params_vec.push(Box::new(now.clone()));
            }
        }

        if !self.search.is_empty() {
            // instr() is case-sensitive where LIKE is not.
            conditions.push("instr(m.name, ?) > 0");
            params_vec.push(Box::new(self.search.clone()));
        }

        (conditions.join(" AND "), params_vec)
    }
}

fn row_to_moment(row: &Row) -> Result<Moment> {
    let start: String = row.get("start_date_and_time")?;
    let end: String = row.get("end_date_and_time")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let duration: i64 = row.get("duration")?;

    Ok(Moment {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        destination_id: row.get("destination_id")?,
        destination_name: row.get("destination_name")?,
        activity: row.get("activity")?,
        name: row.get("name")?,
        is_indispensable: row.get("is_indispensable")?,
        description: row.get("description")?,
        start_date_and_time: parse_datetime(&start, "start_date_and_time")?,
        duration: to_u32(duration, "duration")?,
        end_date_and_time: parse_datetime(&end, "end_date_and_time")?,
        steps: Vec::new(),
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn query_moments(conn: &Connection, query: &str, params_vec: &[Box<dyn ToSql>]) -> Result<Vec<Moment>> {
    let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();

    let mut stmt = conn.prepare(query)?;
    let mut rows = stmt.query(params_refs.as_slice())?;
    let mut moments = Vec::new();
    while let Some(row) = rows.next()? {
        moments.push(row_to_moment(row)?);
    }

    let ids: Vec<String> = moments.iter().map(|m| m.id.clone()).collect();
    let mut steps = load_steps(conn, &ids)?;
    for moment in &mut moments {
        moment.steps = steps.remove(&moment.id).unwrap_or_default();
    }

    Ok(moments)
}

fn count_where(conn: &Connection, where_sql: &str, params_vec: &[Box<dyn ToSql>]) -> Result<u64> {
    let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();
    let query = format!("SELECT COUNT(*) FROM moments m WHERE {where_sql}");
    let count: i64 = conn.query_row(&query, params_refs.as_slice(), |row| row.get(0))?;
    to_u64(count, "count")
}

fn moment_params<'a>(record: &'a MomentRecord, destination_id: &'a str) -> [Box<dyn ToSql + 'a>; 9] {
    [
        Box::new(destination_id),
        Box::new(record.activity.as_str()),
        Box::new(record.name.as_str()),
        Box::new(record.is_indispensable),
        Box::new(record.description.as_str()),
        Box::new(format_datetime(&record.start_date_and_time)),
        Box::new(i64::from(record.duration)),
        Box::new(format_datetime(&record.end_date_and_time)),
        Box::new(record.user_id.as_str()),
    ]
}

impl Database {
    /// `findMany(where, orderBy, skip, take)` for one partition; the order is
    /// the partition's own.
    pub async fn find_moments(&self, filter: &MomentFilter, skip: u64, take: u32) -> Result<Vec<Moment>> {
        let filter = filter.clone();
        self.execute(move |conn| {
            let (where_sql, mut params_vec) = filter.where_clause();
            let query = format!(
                "{MOMENT_SELECT}
                 WHERE {where_sql}
                 ORDER BY {}
                 LIMIT ? OFFSET ?",
                filter.partition.sql_order_by()
            );
            params_vec.push(Box::new(i64::from(take)));
            params_vec.push(Box::new(to_i64(skip)?));

            query_moments(conn, &query, &params_vec)
        })
        .await
    }

    pub async fn count_moments(&self, filter: &MomentFilter) -> Result<u64> {
        let filter = filter.clone();
        self.execute(move |conn| {
            let (where_sql, params_vec) = filter.where_clause();
            count_where(conn, &where_sql, &params_vec)
        })
        .await
    }

    /// Number of filter matches that sort strictly before `(start, name)` in
    /// the filter partition's order.
    pub async fn count_sorted_before(
        &self,
        filter: &MomentFilter,
        start: DateTime<Utc>,
        name: &str,
    ) -> Result<u64> {
        let filter = filter.clone();
        let name = name.to_string();
        self.execute(move |conn| {
            let (where_sql, mut params_vec) = filter.where_clause();
            let where_sql = format!(
                "{where_sql} AND {}",
                sql_before_clause(filter.partition.direction())
            );
            let start = format_datetime(&start);
            params_vec.push(Box::new(start.clone()));
            params_vec.push(Box::new(start));
            params_vec.push(Box::new(name));

            count_where(conn, &where_sql, &params_vec)
        })
        .await
    }

    pub async fn get_moment(&self, user_id: &str, moment_id: &str) -> Result<Option<Moment>> {
        let user_id = user_id.to_string();
        let moment_id = moment_id.to_string();
        self.execute(move |conn| {
            let query = format!("{MOMENT_SELECT} WHERE m.id = ? AND m.user_id = ?");
            let params_vec: Vec<Box<dyn ToSql>> = vec![Box::new(moment_id), Box::new(user_id)];
            Ok(query_moments(conn, &query, &params_vec)?.into_iter().next())
        })
        .await
    }

    /// Every moment the user owns, in the `all` partition's order.
    pub async fn list_user_moments(&self, user_id: &str) -> Result<Vec<Moment>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let query = format!(
                "{MOMENT_SELECT} WHERE m.user_id = ? ORDER BY {}",
                Partition::All.sql_order_by()
            );
            let params_vec: Vec<Box<dyn ToSql>> = vec![Box::new(user_id)];
            query_moments(conn, &query, &params_vec)
        })
        .await
    }

    /// Whether another of the user's moments already uses `name`.
    pub async fn moment_name_taken(
        &self,
        user_id: &str,
        name: &str,
        excluding_id: Option<&str>,
    ) -> Result<bool> {
        let user_id = user_id.to_string();
        let name = name.to_string();
        let excluding_id = excluding_id.map(str::to_string);
        self.execute(move |conn| {
            let found: Option<String> = conn
                .query_row(
                    "SELECT id FROM moments WHERE user_id = ?1 AND name = ?2",
                    params![user_id, name],
                    |row| row.get(0),
                )
                .optional()?;

            Ok(match (found, excluding_id) {
                (Some(found), Some(excluding)) => found != excluding,
                (Some(_), None) => true,
                (None, _) => false,
            })
        })
        .await
    }

    /// Inserts the moment and its steps in one transaction, resolving the
    /// destination by name.
    pub async fn create_moment(&self, record: MomentRecord) -> Result<()> {
        self.execute(move |conn| {
            if record.steps.is_empty() {
                return Err(MomentsError::NoSteps {
                    moment_id: record.id.clone(),
                }
                .into());
            }

            let stamp = format_datetime(&Utc::now());
            let tx = conn.transaction()?;
            let destination_id =
                find_or_create_destination(&tx, &record.user_id, &record.destination_name, &stamp)?;

            let fields = moment_params(&record, &destination_id);
            let mut params_refs: Vec<&dyn ToSql> = vec![&record.id];
            params_refs.extend(fields.iter().map(|b| b.as_ref() as &dyn ToSql));
            params_refs.push(&stamp);
            params_refs.push(&stamp);

            tx.execute(
                "INSERT INTO moments (id, destination_id, activity, name, is_indispensable, description,
                                      start_date_and_time, duration, end_date_and_time, user_id,
                                      created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params_refs.as_slice(),
            )
            .with_context(|| format!("failed to insert moment {}", record.id))?;

            insert_steps(&tx, &record.id, &record.steps, &stamp)?;
            tx.commit().context("failed to commit moment creation")?;
            Ok(())
        })
        .await
    }

    /// Overwrites the moment's fields, then replaces its whole step list. Both
    /// happen in a single transaction, so a failed recreate leaves the old
    /// steps in place.
    pub async fn update_moment(&self, record: MomentRecord) -> Result<()> {
        self.execute(move |conn| {
            if record.steps.is_empty() {
                return Err(MomentsError::NoSteps {
                    moment_id: record.id.clone(),
                }
                .into());
            }

            let stamp = format_datetime(&Utc::now());
            let tx = conn.transaction()?;
            let destination_id =
                find_or_create_destination(&tx, &record.user_id, &record.destination_name, &stamp)?;

            let fields = moment_params(&record, &destination_id);
            let mut params_refs: Vec<&dyn ToSql> =
                fields.iter().map(|b| b.as_ref() as &dyn ToSql).collect();
            params_refs.push(&stamp);
            params_refs.push(&record.id);

            let rows_affected = tx
                .execute(
                    "UPDATE moments
                     SET destination_id = ?1,
                         activity = ?2,
                         name = ?3,
                         is_indispensable = ?4,
                         description = ?5,
                         start_date_and_time = ?6,
                         duration = ?7,
                         end_date_and_time = ?8,
                         updated_at = ?10
                     WHERE user_id = ?9 AND id = ?11",
                    params_refs.as_slice(),
                )
                .with_context(|| format!("failed to update moment {}", record.id))?;

            if rows_affected == 0 {
                return Err(MomentsError::moment_not_found(record.id.clone()).into());
            }

            delete_steps(&tx, &record.id)?;
            insert_steps(&tx, &record.id, &record.steps, &stamp)?;
            tx.commit().context("failed to commit moment update")?;
            Ok(())
        })
        .await
    }

    /// Deletes the moment; its steps go with it through `ON DELETE CASCADE`.
    pub async fn delete_moment(&self, user_id: &str, moment_id: &str) -> Result<()> {
        let user_id = user_id.to_string();
        let moment_id = moment_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn
                .execute(
                    "DELETE FROM moments WHERE id = ?1 AND user_id = ?2",
                    params![moment_id, user_id],
                )
                .with_context(|| format!("failed to delete moment {moment_id}"))?;

            if rows_affected == 0 {
                return Err(MomentsError::moment_not_found(moment_id).into());
            }
            Ok(())
        })
        .await
    }
}
