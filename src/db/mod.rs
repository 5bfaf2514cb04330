mod goals;
mod schema;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};

pub use goals::GoalStore;

use crate::engine::ArticleCatalog;
use crate::error::{storage, BoxError, GoalError};
use crate::models::*;

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn default_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "journal-goals")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(dirs.data_dir().join("journal-goals.db"))
    }

    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.lock();
        schema::run_migrations(&conn)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database lock poisoned")
    }

    // ============================================================
    // Goal store access
    // ============================================================

    /// Run `f` inside a write transaction.
    ///
    /// The transaction commits only if `f` returns `Ok`. On any error, or if
    /// the closure unwinds, the transaction is dropped and rolled back, so no
    /// partial write is ever visible.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&GoalStore<'_>) -> Result<T, GoalError>,
    ) -> Result<T, GoalError> {
        let mut conn = self.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(storage("begin transaction"))?;

        let value = f(&GoalStore::new(&tx))?;

        tx.commit().map_err(storage("commit transaction"))?;
        Ok(value)
    }

    /// Run read-only statements against the goal store.
    pub fn read<T>(
        &self,
        f: impl FnOnce(&GoalStore<'_>) -> Result<T, GoalError>,
    ) -> Result<T, GoalError> {
        let conn = self.lock();
        f(&GoalStore::new(&conn))
    }

    // ============================================================
    // Article operations
    // ============================================================

    pub fn get_all_articles(&self) -> Result<Vec<Article>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT id, title, content, created_at FROM articles ORDER BY id")?;

        let articles = stmt
            .query_map([], article_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(articles)
    }

    pub fn get_article(&self, id: i64) -> Result<Option<Article>> {
        let conn = self.lock();
        let article = conn
            .query_row(
                "SELECT id, title, content, created_at FROM articles WHERE id = ?",
                [id],
                article_from_row,
            )
            .optional()?;
        Ok(article)
    }

    /// Store a new catalog article. A blank title is a validation error.
    pub fn create_article(&self, input: CreateArticleInput) -> Result<Article, GoalError> {
        if input.title.trim().is_empty() {
            return Err(GoalError::validation("article title must not be empty"));
        }

        let conn = self.lock();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO articles (title, content, created_at) VALUES (?, ?, ?)",
            (&input.title, &input.content, now.to_rfc3339()),
        )
        .map_err(storage("insert article"))?;

        Ok(Article {
            id: conn.last_insert_rowid(),
            title: input.title,
            content: input.content,
            created_at: now,
        })
    }

    /// Return the subset of `ids` that has no catalog entry, in input order
    /// and without duplicates.
    ///
    /// The IDs travel as one JSON array parameter, so request size is not
    /// bounded by SQLite's host parameter limit.
    pub fn find_missing_articles(&self, ids: &[i64]) -> Result<Vec<i64>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT requested.value
             FROM json_each(?) AS requested
             LEFT JOIN articles ON articles.id = requested.value
             WHERE articles.id IS NULL
             ORDER BY requested.key",
        )?;
        let unknown = stmt
            .query_map([serde_json::to_string(ids)?], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = HashSet::new();
        Ok(unknown.into_iter().filter(|id| seen.insert(*id)).collect())
    }
}

impl ArticleCatalog for Database {
    fn missing_article_ids(&self, ids: &[i64]) -> Result<Vec<i64>, BoxError> {
        self.find_missing_articles(ids).map_err(Into::into)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

fn article_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        created_at: parse_datetime(3, row.get::<_, String>(3)?)?,
    })
}

fn parse_datetime(column: usize, s: String) -> rusqlite::Result<chrono::DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, e.into())
        })
}

fn parse_json<T: serde::de::DeserializeOwned>(column: usize, s: String) -> rusqlite::Result<T> {
    serde_json::from_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, e.into())
    })
}
