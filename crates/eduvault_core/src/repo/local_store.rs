//! Offline single-user task store backed by one JSON document.
//!
//! # Responsibility
//! - Persist the task list locally when no hosted backend is configured.
//!
//! # Invariants
//! - Writes replace the document atomically (temp file + rename).
//! - A missing file reads as an empty task list.
//! - Documents with an unknown `version` are rejected.

use crate::model::task::{Task, TaskId};
use crate::repo::task_repo::{RepoError, RepoResult, TaskListQuery, TaskRepository};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct TaskDocument {
    version: u32,
    #[serde(default)]
    tasks: Vec<Task>,
}

/// JSON-file task store.
#[derive(Debug, Clone)]
pub struct JsonTaskStore {
    path: PathBuf,
}

impl JsonTaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    fn load(&self) -> RepoResult<TaskDocument> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Ok(TaskDocument {
                    version: DOCUMENT_VERSION,
                    tasks: Vec::new(),
                });
            }
            Err(err) => return Err(err.into()),
        };

        let document: TaskDocument = serde_json::from_str(&raw)?;
        if document.version != DOCUMENT_VERSION {
            return Err(RepoError::InvalidData(format!(
                "unsupported task document version {}",
                document.version
            )));
        }
        for task in &document.tasks {
            task.validate().map_err(|err| {
                RepoError::InvalidData(format!("task {} failed validation: {err}", task.id))
            })?;
        }
        Ok(document)
    }

    fn store(&self, document: &TaskDocument) -> RepoResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp_path = self.path.with_extension("json.tmp");
        let payload = serde_json::to_vec_pretty(document)?;
        fs::write(&tmp_path, payload)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn modify(&self, apply: impl FnOnce(&mut Vec<Task>) -> RepoResult<()>) -> RepoResult<()> {
        let mut document = self.load()?;
        apply(&mut document.tasks)?;
        document.version = DOCUMENT_VERSION;
        self.store(&document)
    }
}

impl TaskRepository for JsonTaskStore {
    fn insert_task(&self, task: &Task) -> RepoResult<()> {
        task.validate()?;
        self.modify(|tasks| {
            if tasks.iter().any(|existing| existing.id == task.id) {
                return Err(RepoError::Duplicate(task.id));
            }
            tasks.push(task.clone());
            Ok(())
        })
    }

    fn update_task(&self, task: &Task) -> RepoResult<()> {
        task.validate()?;
        self.modify(|tasks| {
            let slot = tasks
                .iter_mut()
                .find(|existing| existing.id == task.id)
                .ok_or(RepoError::NotFound(task.id))?;
            *slot = task.clone();
            Ok(())
        })
    }

    fn save_task(&self, task: &Task) -> RepoResult<()> {
        task.validate()?;
        self.modify(|tasks| {
            match tasks.iter_mut().find(|existing| existing.id == task.id) {
                Some(slot) => *slot = task.clone(),
                None => tasks.push(task.clone()),
            }
            Ok(())
        })
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        self.modify(|tasks| {
            let before = tasks.len();
            tasks.retain(|task| task.id != id);
            if tasks.len() == before {
                return Err(RepoError::NotFound(id));
            }
            Ok(())
        })
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        Ok(self.load()?.tasks.into_iter().find(|task| task.id == id))
    }

    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .load()?
            .tasks
            .into_iter()
            .filter(|task| query.matches(task))
            .collect();
        tasks.sort_by(|a, b| (a.date, a.time, a.id).cmp(&(b.date, b.time, b.id)));
        if let Some(limit) = query.limit {
            tasks.truncate(limit as usize);
        }
        Ok(tasks)
    }
}
