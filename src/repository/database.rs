use chrono::prelude::*;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use dotenv::dotenv;

use crate::errors::StoreError;
use crate::models::task::{NewTask, Task, TaskChanges};
use crate::repository::schema::tareas::dsl::*;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;
type DbConn = r2d2::PooledConnection<ConnectionManager<SqliteConnection>>;

/// The task store. Its inherent methods are the only way the rest of the
/// service touches persistence.
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub fn new() -> Self {
        dotenv().ok();
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "tareas.db".to_string());
        Self::new_with_url(&database_url)
    }

    pub fn new_with_url(database_url: &str) -> Self {
        let manager = ConnectionManager::<SqliteConnection>::new(database_url);
        let mut builder = r2d2::Pool::builder();
        // Every connection to a sqlite ":memory:" url opens a distinct
        // database, so keep the pool to a single connection there.
        if database_url == ":memory:" {
            builder = builder.max_size(1);
        }
        let pool: DbPool = builder.build(manager).expect("Failed to create pool.");
        pool.get()
            .expect("Failed to check out a connection for migrations.")
            .run_pending_migrations(MIGRATIONS)
            .expect("Failed to run database migrations.");
        Database { pool }
    }

    fn conn(&self) -> Result<DbConn, StoreError> {
        Ok(self.pool.get()?)
    }

    /// Inserts a new task. The database assigns the id and this method
    /// stamps `created_at`; whatever the caller put there is irrelevant.
    pub fn create(&self, new_task: NewTask) -> Result<Task, StoreError> {
        let task = diesel::insert_into(tareas)
            .values((&new_task, created_at.eq(Utc::now().naive_utc())))
            .get_result::<Task>(&mut self.conn()?)?;
        Ok(task)
    }

    pub fn find_by_id(&self, task_id: i64) -> Result<Task, StoreError> {
        let task = tareas.find(task_id).first::<Task>(&mut self.conn()?)?;
        Ok(task)
    }

    pub fn find_all(&self) -> Result<Vec<Task>, StoreError> {
        let tasks = tareas.load::<Task>(&mut self.conn()?)?;
        Ok(tasks)
    }

    pub fn find_by_completed(&self, flag: bool) -> Result<Vec<Task>, StoreError> {
        let tasks = tareas
            .filter(completed.eq(flag))
            .load::<Task>(&mut self.conn()?)?;
        Ok(tasks)
    }

    /// Substring match on the title. SQLite's LIKE compares ASCII
    /// case-insensitively, which is the contract here. Wildcard characters
    /// in the term are escaped so they match literally.
    pub fn find_by_title_contains(&self, term: &str) -> Result<Vec<Task>, StoreError> {
        let escaped = term
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{}%", escaped);
        let tasks = tareas
            .filter(title.like(pattern).escape('\\'))
            .load::<Task>(&mut self.conn()?)?;
        Ok(tasks)
    }

    /// Overwrites the mutable fields of an existing task. `id` and
    /// `created_at` are untouched by construction of [`TaskChanges`].
    pub fn update(&self, task_id: i64, changes: TaskChanges) -> Result<Task, StoreError> {
        let task = diesel::update(tareas.find(task_id))
            .set(&changes)
            .get_result::<Task>(&mut self.conn()?)?;
        Ok(task)
    }

    pub fn complete(&self, task_id: i64) -> Result<Task, StoreError> {
        let task = diesel::update(tareas.find(task_id))
            .set(completed.eq(true))
            .get_result::<Task>(&mut self.conn()?)?;
        Ok(task)
    }

    pub fn delete(&self, task_id: i64) -> Result<(), StoreError> {
        let deleted = diesel::delete(tareas.find(task_id)).execute(&mut self.conn()?)?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::new_with_url(":memory:")
    }

    fn new_task(task_title: &str) -> NewTask {
        NewTask {
            title: task_title.to_string(),
            description: None,
            completed: false,
        }
    }

    #[test]
    fn create_assigns_id_and_created_at() {
        let db = db();
        let task = db.create(new_task("Comprar pan")).unwrap();
        assert!(task.id > 0);
        assert!(!task.completed);
        let found = db.find_by_id(task.id).unwrap();
        assert_eq!(found.title, "Comprar pan");
        assert_eq!(found.created_at, task.created_at);
    }

    #[test]
    fn find_by_id_missing_is_not_found() {
        let db = db();
        assert!(matches!(db.find_by_id(42), Err(StoreError::NotFound)));
    }

    #[test]
    fn find_by_completed_matches_flag_exactly() {
        let db = db();
        let a = db.create(new_task("a")).unwrap();
        db.create(new_task("b")).unwrap();
        db.complete(a.id).unwrap();

        let done = db.find_by_completed(true).unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, a.id);
        assert_eq!(db.find_by_completed(false).unwrap().len(), 1);
        assert_eq!(db.find_all().unwrap().len(), 2);
    }

    #[test]
    fn title_search_ignores_case() {
        let db = db();
        db.create(new_task("Buy Milk")).unwrap();
        assert_eq!(db.find_by_title_contains("milk").unwrap().len(), 1);
        assert_eq!(db.find_by_title_contains("MILK").unwrap().len(), 1);
        assert!(db.find_by_title_contains("xyz").unwrap().is_empty());
    }

    #[test]
    fn title_search_treats_wildcards_as_literals() {
        let db = db();
        db.create(new_task("abc")).unwrap();
        db.create(new_task("a%c")).unwrap();
        db.create(new_task("a_c")).unwrap();

        let found = db.find_by_title_contains("a%c").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "a%c");

        let found = db.find_by_title_contains("a_c").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "a_c");
    }

    #[test]
    fn update_overwrites_mutable_fields_only() {
        let db = db();
        let task = db
            .create(NewTask {
                title: "before".to_string(),
                description: Some("old".to_string()),
                completed: false,
            })
            .unwrap();

        let updated = db
            .update(
                task.id,
                TaskChanges {
                    title: "after".to_string(),
                    description: None,
                    completed: true,
                },
            )
            .unwrap();

        assert_eq!(updated.id, task.id);
        assert_eq!(updated.created_at, task.created_at);
        assert_eq!(updated.title, "after");
        assert_eq!(updated.description, None);
        assert!(updated.completed);
    }

    #[test]
    fn update_missing_is_not_found() {
        let db = db();
        let result = db.update(
            7,
            TaskChanges {
                title: "t".to_string(),
                description: None,
                completed: false,
            },
        );
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[test]
    fn delete_removes_the_record() {
        let db = db();
        let task = db.create(new_task("gone")).unwrap();
        db.delete(task.id).unwrap();
        assert!(matches!(db.find_by_id(task.id), Err(StoreError::NotFound)));
        assert!(matches!(db.delete(task.id), Err(StoreError::NotFound)));
    }

    #[test]
    fn complete_is_idempotent() {
        let db = db();
        let task = db.create(new_task("twice")).unwrap();
        assert!(db.complete(task.id).unwrap().completed);
        assert!(db.complete(task.id).unwrap().completed);
    }
}
