//! Goal progress engine.
//!
//! The engine owns the rules around reading goals: which articles a goal
//! tracks, how the tracked set is reconciled on update, and when the goal
//! counts as completed. Storage is reached only through
//! [`Database::transaction`] and [`Database::read`]; article existence is
//! checked through an injected [`ArticleCatalog`].
//!
//! Every mutating operation ends by re-deriving the goal's `completed` flag
//! with [`derive_completed`], so the flag always matches the progress rows
//! that were committed alongside it.

mod rules;

pub use rules::{derive_completed, normalize_article_ids, ReconcilePlan};

use chrono::Utc;

use crate::db::{Database, GoalStore};
use crate::error::{storage, BoxError, GoalError, Result};
use crate::models::*;
use rules::{ensure_positive, required};

/// Existence check against the article catalog.
pub trait ArticleCatalog: Send + Sync {
    /// Return the IDs from `ids` that do not exist in the catalog.
    fn missing_article_ids(&self, ids: &[i64]) -> std::result::Result<Vec<i64>, BoxError>;
}

#[derive(Clone)]
pub struct GoalEngine<C = Database> {
    db: Database,
    catalog: C,
}

impl GoalEngine<Database> {
    /// Engine that validates articles against the same database it stores
    /// goals in.
    pub fn new(db: Database) -> Self {
        Self {
            catalog: db.clone(),
            db,
        }
    }
}

impl<C: ArticleCatalog> GoalEngine<C> {
    pub fn with_catalog(db: Database, catalog: C) -> Self {
        Self { db, catalog }
    }

    // ============================================================
    // Reads
    // ============================================================

    pub fn get_user_goals(&self, user_id: i64) -> Result<Vec<Goal>> {
        ensure_positive("user_id", user_id)?;
        self.db
            .read(|store| store.list_goals(user_id).map_err(storage("list goals")))
    }

    pub fn get_goal_by_id(&self, user_id: i64, goal_id: i64) -> Result<Goal> {
        ensure_positive("user_id", user_id)?;
        ensure_positive("goal_id", goal_id)?;
        self.db.read(|store| find_goal(store, goal_id, user_id))
    }

    pub fn get_goal_progress(&self, user_id: i64, goal_id: i64) -> Result<GoalWithProgress> {
        ensure_positive("user_id", user_id)?;
        ensure_positive("goal_id", goal_id)?;
        self.db.read(|store| {
            let goal = find_goal(store, goal_id, user_id)?;
            let progress = store
                .get_progress(goal_id, user_id)
                .map_err(storage("load progress"))?;
            Ok(GoalWithProgress { goal, progress })
        })
    }

    // ============================================================
    // Mutations
    // ============================================================

    /// Create a goal with one incomplete progress row per article.
    ///
    /// Unknown articles reject the whole request before anything is written.
    pub fn create_goal(&self, user_id: i64, input: CreateGoalInput) -> Result<Goal> {
        ensure_positive("user_id", user_id)?;
        let title = required("title", input.title)?;
        let task = required("task", input.task)?;
        let articles = normalize_article_ids(&input.article_ids)?;
        self.ensure_articles_exist(&articles)?;

        let created_at = Utc::now();
        let goal = self.db.transaction(|store| {
            let id = store
                .insert_goal(user_id, &title, &task, &articles, created_at)
                .map_err(storage("insert goal"))?;

            for article_id in &articles {
                store
                    .insert_progress(id, *article_id)
                    .map_err(storage("insert progress"))?;
            }

            Ok(Goal {
                id,
                user_id,
                title,
                task,
                articles_to_read: articles,
                completed: false,
                created_at,
            })
        })?;

        tracing::info!(
            goal_id = goal.id,
            user_id,
            articles = goal.articles_to_read.len(),
            "Created goal"
        );
        Ok(goal)
    }

    /// Replace a goal's title and task, and its article set when one is
    /// supplied.
    ///
    /// With [`ArticleSelection::Replace`] the tracked progress rows are
    /// reconciled against the new set: new articles start incomplete,
    /// articles that stay keep their state, and dropped articles lose their
    /// rows. The caller's `completed` flag is ignored in every case.
    pub fn update_goal(
        &self,
        user_id: i64,
        goal_id: i64,
        input: UpdateGoalInput,
    ) -> Result<GoalWithProgress> {
        ensure_positive("user_id", user_id)?;
        ensure_positive("goal_id", goal_id)?;
        let title = required("title", input.title)?;
        let task = required("task", input.task)?;
        let requested = match &input.article_ids {
            ArticleSelection::Keep => None,
            ArticleSelection::Replace(ids) => Some(normalize_article_ids(ids)?),
        };

        // Ownership is checked before the catalog so foreign goals never
        // learn which articles exist
        self.db.read(|store| find_goal(store, goal_id, user_id))?;
        if let Some(ids) = &requested {
            self.ensure_articles_exist(ids)?;
        }

        let updated = self.db.transaction(|store| {
            let existing = find_goal(store, goal_id, user_id)?;

            if input.completed != existing.completed {
                tracing::debug!(
                    goal_id,
                    requested = input.completed,
                    "Ignoring caller-supplied completed flag"
                );
            }

            store
                .update_goal_fields(goal_id, user_id, &title, &task)
                .map_err(storage("update goal fields"))?;

            if let Some(requested) = &requested {
                let tracked = store
                    .tracked_article_ids(goal_id)
                    .map_err(storage("load tracked articles"))?;
                let plan = ReconcilePlan::between(&tracked, requested);
                tracing::debug!(goal_id, ?plan, "Reconciling goal articles");

                for article_id in &plan.insert {
                    store
                        .insert_progress(goal_id, *article_id)
                        .map_err(storage("insert progress"))?;
                }
                store
                    .set_articles(goal_id, user_id, requested)
                    .map_err(storage("replace article set"))?;
                store
                    .delete_progress(goal_id, &plan.delete)
                    .map_err(storage("delete stale progress"))?;
            }

            refresh_completion(store, goal_id, user_id)
        })?;

        tracing::info!(
            goal_id,
            user_id,
            completed = updated.goal.completed,
            "Updated goal"
        );
        Ok(updated)
    }

    /// Mark one article of a goal as read.
    ///
    /// Repeating the call keeps a single progress row and moves its
    /// completion date to the latest call.
    pub fn complete_article_progress(
        &self,
        goal_id: i64,
        article_id: i64,
        user_id: i64,
    ) -> Result<GoalWithProgress> {
        self.set_article_progress(goal_id, article_id, user_id, true)
    }

    /// Mark one article of a goal as unread again.
    pub fn reopen_article_progress(
        &self,
        goal_id: i64,
        article_id: i64,
        user_id: i64,
    ) -> Result<GoalWithProgress> {
        self.set_article_progress(goal_id, article_id, user_id, false)
    }

    /// Delete a goal together with all of its progress rows.
    pub fn delete_goal(&self, user_id: i64, goal_id: i64) -> Result<()> {
        ensure_positive("user_id", user_id)?;
        ensure_positive("goal_id", goal_id)?;

        let removed = self.db.transaction(|store| {
            find_goal(store, goal_id, user_id)?;

            let removed = store
                .delete_all_progress(goal_id, user_id)
                .map_err(storage("delete progress"))?;
            let rows = store
                .delete_goal(goal_id, user_id)
                .map_err(storage("delete goal"))?;
            if rows == 0 {
                return Err(GoalError::NotFound { goal_id });
            }
            Ok(removed)
        })?;

        tracing::info!(goal_id, user_id, progress_rows = removed, "Deleted goal");
        Ok(())
    }

    // ============================================================
    // Helpers
    // ============================================================

    fn set_article_progress(
        &self,
        goal_id: i64,
        article_id: i64,
        user_id: i64,
        completed: bool,
    ) -> Result<GoalWithProgress> {
        ensure_positive("user_id", user_id)?;
        ensure_positive("goal_id", goal_id)?;
        ensure_positive("article_id", article_id)?;

        let updated = self.db.transaction(|store| {
            let goal = find_goal(store, goal_id, user_id)?;
            if !goal.articles_to_read.contains(&article_id) {
                return Err(GoalError::NotTracked {
                    goal_id,
                    article_id,
                });
            }

            let when = completed.then(Utc::now);
            store
                .upsert_progress(goal_id, article_id, completed, when)
                .map_err(storage("upsert progress"))?;

            refresh_completion(store, goal_id, user_id)
        })?;

        tracing::info!(
            goal_id,
            article_id,
            user_id,
            article_completed = completed,
            goal_completed = updated.goal.completed,
            "Updated article progress"
        );
        Ok(updated)
    }

    fn ensure_articles_exist(&self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let missing = self
            .catalog
            .missing_article_ids(ids)
            .map_err(storage("validate article ids"))?;

        if !missing.is_empty() {
            tracing::warn!(?missing, "Rejected unknown article ids");
            return Err(GoalError::Rejected { ids: missing });
        }
        Ok(())
    }
}

fn find_goal(store: &GoalStore<'_>, goal_id: i64, user_id: i64) -> Result<Goal> {
    store
        .get_goal(goal_id, user_id)
        .map_err(storage("load goal"))?
        .ok_or(GoalError::NotFound { goal_id })
}

/// Re-derive and persist the goal's completion flag from its current
/// article set and progress rows.
fn refresh_completion(
    store: &GoalStore<'_>,
    goal_id: i64,
    user_id: i64,
) -> Result<GoalWithProgress> {
    let mut goal = find_goal(store, goal_id, user_id)?;
    let progress = store
        .get_progress(goal_id, user_id)
        .map_err(storage("load progress"))?;

    goal.completed = derive_completed(&progress, &goal.articles_to_read);
    store
        .set_completed(goal_id, user_id, goal.completed)
        .map_err(storage("update completion"))?;

    Ok(GoalWithProgress { goal, progress })
}
