use std::collections::BTreeMap;
use std::fmt;

use diesel::{AsChangeset, Identifiable, Insertable, Queryable};
use serde::{Deserialize, Serialize};

const TITLE_MAX_CHARS: usize = 100;
const DESCRIPTION_MAX_CHARS: usize = 500;

/// A stored task, exactly as it lives in the `tareas` table.
#[derive(Serialize, Deserialize, Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = crate::repository::schema::tareas)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub created_at: chrono::NaiveDateTime,
}

/// Fields the client controls on insert. The store assigns `id` and
/// `created_at`.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::repository::schema::tareas)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
}

/// The mutable subset of a task. `id` and `created_at` are never part of
/// an update. `description: None` clears the stored value.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = crate::repository::schema::tareas)]
#[diesel(treat_none_as_null = true)]
pub struct TaskChanges {
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
}

/// Incoming task body for create and update. Any `id` or `created_at` the
/// client sends is simply not deserialized.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskPayload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

impl TaskPayload {
    /// Checks every field constraint and reports all violations at once.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if self.title.trim().is_empty() {
            errors.add("title", "title must not be blank");
        } else if self.title.chars().count() > TITLE_MAX_CHARS {
            errors.add("title", "title must be between 1 and 100 characters");
        }
        if let Some(description) = &self.description {
            if description.chars().count() > DESCRIPTION_MAX_CHARS {
                errors.add("description", "description must not exceed 500 characters");
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Per-field validation messages, keyed by field name.
#[derive(Debug, Default, Serialize)]
pub struct ValidationErrors(BTreeMap<&'static str, String>);

impl ValidationErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", field, message)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}
