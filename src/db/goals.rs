//! Goal and progress persistence.
//!
//! [`GoalStore`] executes raw reads and writes against an open connection or
//! transaction. It makes no decisions: which rows to insert, delete or flag
//! as completed is up to the engine. Every statement that touches a goal is
//! scoped by its owner.

use chrono::{DateTime, Utc};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Result};

use super::{parse_datetime, parse_json};
use crate::models::{Goal, Progress};

const GOAL_COLUMNS: &str = "id, user_id, title, task, articles_to_read, completed, created_at";

pub struct GoalStore<'a> {
    conn: &'a Connection,
}

impl<'a> GoalStore<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    // ============================================================
    // Goals
    // ============================================================

    /// Insert a goal row and return its generated ID.
    pub fn insert_goal(
        &self,
        user_id: i64,
        title: &str,
        task: &str,
        articles: &[i64],
        created_at: DateTime<Utc>,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO goals (user_id, title, task, articles_to_read, completed, created_at)
             VALUES (?, ?, ?, ?, 0, ?)",
            (
                user_id,
                title,
                task,
                encode_ids(articles),
                created_at.to_rfc3339(),
            ),
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_goal(&self, goal_id: i64, user_id: i64) -> Result<Option<Goal>> {
        self.conn
            .query_row(
                &format!("SELECT {GOAL_COLUMNS} FROM goals WHERE id = ? AND user_id = ?"),
                (goal_id, user_id),
                goal_from_row,
            )
            .optional()
    }

    pub fn list_goals(&self, user_id: i64) -> Result<Vec<Goal>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {GOAL_COLUMNS} FROM goals WHERE user_id = ? ORDER BY created_at, id"
        ))?;
        let goals = stmt
            .query_map([user_id], goal_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(goals)
    }

    pub fn update_goal_fields(
        &self,
        goal_id: i64,
        user_id: i64,
        title: &str,
        task: &str,
    ) -> Result<usize> {
        self.conn.execute(
            "UPDATE goals SET title = ?, task = ? WHERE id = ? AND user_id = ?",
            (title, task, goal_id, user_id),
        )
    }

    /// Overwrite the goal's article set.
    pub fn set_articles(&self, goal_id: i64, user_id: i64, articles: &[i64]) -> Result<usize> {
        self.conn.execute(
            "UPDATE goals SET articles_to_read = ? WHERE id = ? AND user_id = ?",
            (encode_ids(articles), goal_id, user_id),
        )
    }

    pub fn set_completed(&self, goal_id: i64, user_id: i64, completed: bool) -> Result<usize> {
        self.conn.execute(
            "UPDATE goals SET completed = ? WHERE id = ? AND user_id = ?",
            (completed, goal_id, user_id),
        )
    }

    pub fn delete_goal(&self, goal_id: i64, user_id: i64) -> Result<usize> {
        self.conn.execute(
            "DELETE FROM goals WHERE id = ? AND user_id = ?",
            (goal_id, user_id),
        )
    }

    // ============================================================
    // Progress
    // ============================================================

    /// Start tracking an article. Existing rows are left as they are.
    pub fn insert_progress(&self, goal_id: i64, article_id: i64) -> Result<usize> {
        self.conn.execute(
            "INSERT INTO goal_progress (goal_id, article_id, completed, date_completed)
             VALUES (?, ?, 0, NULL)
             ON CONFLICT (goal_id, article_id) DO NOTHING",
            (goal_id, article_id),
        )
    }

    /// Insert or overwrite the progress row for an article.
    pub fn upsert_progress(
        &self,
        goal_id: i64,
        article_id: i64,
        completed: bool,
        when: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO goal_progress (goal_id, article_id, completed, date_completed)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (goal_id, article_id)
             DO UPDATE SET completed = ?3, date_completed = ?4",
            (
                goal_id,
                article_id,
                completed,
                when.map(|t| t.to_rfc3339()),
            ),
        )?;
        Ok(())
    }

    /// Stop tracking the given articles.
    pub fn delete_progress(&self, goal_id: i64, article_ids: &[i64]) -> Result<usize> {
        if article_ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; article_ids.len()].join(", ");
        let sql = format!(
            "DELETE FROM goal_progress WHERE goal_id = ? AND article_id IN ({placeholders})"
        );
        let params = std::iter::once(&goal_id).chain(article_ids.iter());
        self.conn.execute(&sql, params_from_iter(params))
    }

    /// Delete every progress row of a goal, provided the goal belongs to
    /// `user_id`.
    pub fn delete_all_progress(&self, goal_id: i64, user_id: i64) -> Result<usize> {
        self.conn.execute(
            "DELETE FROM goal_progress
             WHERE goal_id IN (SELECT id FROM goals WHERE id = ? AND user_id = ?)",
            (goal_id, user_id),
        )
    }

    pub fn count_completed_progress(&self, goal_id: i64) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM goal_progress WHERE goal_id = ? AND completed = 1",
            [goal_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn tracked_article_ids(&self, goal_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT article_id FROM goal_progress WHERE goal_id = ? ORDER BY article_id",
        )?;
        let ids = stmt
            .query_map([goal_id], |row| row.get(0))?
            .collect::<Result<Vec<i64>>>()?;
        Ok(ids)
    }

    /// Progress rows of a goal owned by `user_id`, ordered by article ID.
    pub fn get_progress(&self, goal_id: i64, user_id: i64) -> Result<Vec<Progress>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.goal_id, p.article_id, p.completed, p.date_completed
             FROM goal_progress p
             JOIN goals g ON g.id = p.goal_id
             WHERE p.goal_id = ? AND g.user_id = ?
             ORDER BY p.article_id",
        )?;

        let progress = stmt
            .query_map((goal_id, user_id), |row| {
                Ok(Progress {
                    goal_id: row.get(0)?,
                    article_id: row.get(1)?,
                    completed: row.get(2)?,
                    date_completed: row
                        .get::<_, Option<String>>(3)?
                        .map(|s| parse_datetime(3, s))
                        .transpose()?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(progress)
    }
}

fn goal_from_row(row: &rusqlite::Row<'_>) -> Result<Goal> {
    Ok(Goal {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        task: row.get(3)?,
        articles_to_read: parse_json(4, row.get::<_, String>(4)?)?,
        completed: row.get(5)?,
        created_at: parse_datetime(6, row.get::<_, String>(6)?)?,
    })
}

fn encode_ids(ids: &[i64]) -> String {
    // Serializing a slice of integers cannot fail
    serde_json::to_string(ids).unwrap_or_else(|_| "[]".to_string())
}
