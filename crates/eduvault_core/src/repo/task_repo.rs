//! Task store contracts and the hosted (SQLite) implementation.
//!
//! # Responsibility
//! - Provide CRUD over the per-user `tasks` table.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Write paths call `Task::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Every statement is scoped to the repository's `user_id`.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::task::{
    parse_date, parse_time, Priority, Task, TaskId, TaskValidationError, DATE_FORMAT,
};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    id,
    title,
    date,
    time,
    duration,
    completed,
    priority
FROM tasks";

const REQUIRED_TASK_COLUMNS: &[&str] = &[
    "id",
    "user_id",
    "title",
    "date",
    "time",
    "duration",
    "completed",
    "priority",
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Error for task store operations, shared by every backend.
#[derive(Debug)]
pub enum RepoError {
    Validation(TaskValidationError),
    Db(DbError),
    Io(std::io::Error),
    Json(serde_json::Error),
    NotFound(TaskId),
    Duplicate(TaskId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "task store io error: {err}"),
            Self::Json(err) => write!(f, "task store json error: {err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::Duplicate(id) => write!(f, "task already exists: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "task repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "task repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "task repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted task data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TaskValidationError> for RepoError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<std::io::Error> for RepoError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Filter options for listing tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskListQuery {
    /// Only tasks scheduled on this date.
    pub date: Option<NaiveDate>,
    /// Only tasks with this completion flag.
    pub completed: Option<bool>,
    pub limit: Option<u32>,
}

impl TaskListQuery {
    /// Returns whether `task` passes the filter (ignores `limit`).
    pub fn matches(&self, task: &Task) -> bool {
        self.date.map_or(true, |date| task.date == date)
            && self.completed.map_or(true, |flag| task.completed == flag)
    }
}

/// Persistence boundary for study tasks.
///
/// Lists are ordered by `(date, time, id)` ascending.
pub trait TaskRepository {
    fn insert_task(&self, task: &Task) -> RepoResult<()>;
    fn update_task(&self, task: &Task) -> RepoResult<()>;
    /// Insert-or-replace; used when replaying queued writes.
    fn save_task(&self, task: &Task) -> RepoResult<()>;
    fn delete_task(&self, id: TaskId) -> RepoResult<()>;
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>>;
}

/// Hosted task store over the SQLite `tasks` table.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
    user_id: String,
}

impl<'conn> SqliteTaskRepository<'conn> {
    /// Constructs a repository for one user from a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when migrations have not been applied.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` for foreign schemas.
    /// - `InvalidData` when `user_id` is blank.
    pub fn try_new(conn: &'conn Connection, user_id: impl Into<String>) -> RepoResult<Self> {
        let user_id = user_id.into().trim().to_string();
        if user_id.is_empty() {
            return Err(RepoError::InvalidData("user_id cannot be empty".to_string()));
        }
        ensure_task_connection_ready(conn)?;
        Ok(Self { conn, user_id })
    }

    pub fn user_id(&self) -> &str {
        self.user_id.as_str()
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn insert_task(&self, task: &Task) -> RepoResult<()> {
        task.validate()?;

        let result = self.conn.execute(
            "INSERT INTO tasks (
                id,
                user_id,
                title,
                date,
                time,
                duration,
                completed,
                priority
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                task.id.to_string(),
                self.user_id.as_str(),
                task.title.as_str(),
                task.date_label(),
                task.time_label(),
                task.duration_minutes,
                bool_to_int(task.completed),
                task.priority.as_str(),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(RepoError::Duplicate(task.id))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn update_task(&self, task: &Task) -> RepoResult<()> {
        task.validate()?;

        let changed = self.conn.execute(
            "UPDATE tasks
             SET
                title = ?1,
                date = ?2,
                time = ?3,
                duration = ?4,
                completed = ?5,
                priority = ?6,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?7 AND user_id = ?8;",
            params![
                task.title.as_str(),
                task.date_label(),
                task.time_label(),
                task.duration_minutes,
                bool_to_int(task.completed),
                task.priority.as_str(),
                task.id.to_string(),
                self.user_id.as_str(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(task.id));
        }

        Ok(())
    }

    fn save_task(&self, task: &Task) -> RepoResult<()> {
        task.validate()?;

        let changed = self.conn.execute(
            "INSERT INTO tasks (
                id,
                user_id,
                title,
                date,
                time,
                duration,
                completed,
                priority
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                date = excluded.date,
                time = excluded.time,
                duration = excluded.duration,
                completed = excluded.completed,
                priority = excluded.priority,
                updated_at = (strftime('%s', 'now') * 1000)
            WHERE tasks.user_id = excluded.user_id;",
            params![
                task.id.to_string(),
                self.user_id.as_str(),
                task.title.as_str(),
                task.date_label(),
                task.time_label(),
                task.duration_minutes,
                bool_to_int(task.completed),
                task.priority.as_str(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::InvalidData(format!(
                "task {} belongs to another user",
                task.id
            )));
        }

        Ok(())
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2;",
            params![id.to_string(), self.user_id.as_str()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL}
             WHERE id = ?1 AND user_id = ?2;"
        ))?;

        let mut rows = stmt.query(params![id.to_string(), self.user_id.as_str()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(row)?));
        }

        Ok(None)
    }

    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>> {
        let mut sql = format!("{TASK_SELECT_SQL} WHERE user_id = ?");
        let mut bind_values: Vec<Value> = vec![Value::Text(self.user_id.clone())];

        if let Some(date) = query.date {
            sql.push_str(" AND date = ?");
            bind_values.push(Value::Text(date.format(DATE_FORMAT).to_string()));
        }

        if let Some(completed) = query.completed {
            sql.push_str(" AND completed = ?");
            bind_values.push(Value::Integer(bool_to_int(completed)));
        }

        sql.push_str(" ORDER BY date ASC, time ASC, id ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut tasks = Vec::new();

        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }

        Ok(tasks)
    }
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text)
        .map_err(|_| RepoError::InvalidData(format!("invalid task id `{id_text}` in tasks.id")))?;

    let date_text: String = row.get("date")?;
    let date = parse_date(&date_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid date `{date_text}` for task {id}"))
    })?;

    let time_text: String = row.get("time")?;
    let time = parse_time(&time_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid time `{time_text}` for task {id}"))
    })?;

    let duration_raw: i64 = row.get("duration")?;
    let duration_minutes = u32::try_from(duration_raw).map_err(|_| {
        RepoError::InvalidData(format!("invalid duration `{duration_raw}` for task {id}"))
    })?;

    let completed = match row.get::<_, i64>("completed")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid completed value `{other}` for task {id}"
            )));
        }
    };

    let priority_text: String = row.get("priority")?;
    let priority = Priority::parse(&priority_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid priority `{priority_text}` for task {id}"))
    })?;

    let task = Task {
        id,
        title: row.get("title")?,
        date,
        time,
        duration_minutes,
        completed,
        priority,
    };
    task.validate()?;
    Ok(task)
}

fn ensure_task_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "tasks")? {
        return Err(RepoError::MissingRequiredTable("tasks"));
    }

    for &column in REQUIRED_TASK_COLUMNS {
        if !table_has_column(conn, "tasks", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "tasks",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
