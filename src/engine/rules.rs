//! Pure business rules shared by every goal operation.

use std::collections::HashSet;

use crate::error::{GoalError, Result};
use crate::models::Progress;

/// Whether a goal counts as completed.
///
/// True only when `articles` is non-empty and every article in it has a
/// completed progress row. Rows for articles outside the set are ignored.
pub fn derive_completed(progress: &[Progress], articles: &[i64]) -> bool {
    if articles.is_empty() {
        return false;
    }

    let done: HashSet<i64> = progress
        .iter()
        .filter(|p| p.completed)
        .map(|p| p.article_id)
        .collect();

    articles.iter().all(|id| done.contains(id))
}

/// Progress rows to add and remove when a goal's article set is replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Requested articles without a progress row, in request order.
    pub insert: Vec<i64>,
    /// Tracked articles that are no longer requested, in tracked order.
    pub delete: Vec<i64>,
}

impl ReconcilePlan {
    pub fn between(tracked: &[i64], requested: &[i64]) -> Self {
        let tracked_set: HashSet<i64> = tracked.iter().copied().collect();
        let requested_set: HashSet<i64> = requested.iter().copied().collect();

        let mut insert = Vec::new();
        for id in requested {
            if !tracked_set.contains(id) && !insert.contains(id) {
                insert.push(*id);
            }
        }

        let delete = tracked
            .iter()
            .copied()
            .filter(|id| !requested_set.contains(id))
            .collect();

        Self { insert, delete }
    }

    pub fn is_empty(&self) -> bool {
        self.insert.is_empty() && self.delete.is_empty()
    }
}

/// Drop duplicate article IDs, keeping first occurrences, and reject
/// non-positive ones.
pub fn normalize_article_ids(ids: &[i64]) -> Result<Vec<i64>> {
    if let Some(bad) = ids.iter().find(|id| **id <= 0) {
        return Err(GoalError::validation(format!(
            "article id must be positive, got {bad}"
        )));
    }

    let mut seen = HashSet::new();
    Ok(ids.iter().copied().filter(|id| seen.insert(*id)).collect())
}

pub(crate) fn ensure_positive(field: &str, id: i64) -> Result<()> {
    if id <= 0 {
        return Err(GoalError::validation(format!(
            "{field} must be positive, got {id}"
        )));
    }
    Ok(())
}

pub(crate) fn required(field: &str, value: String) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GoalError::validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(article_id: i64, completed: bool) -> Progress {
        Progress {
            goal_id: 1,
            article_id,
            completed,
            date_completed: None,
        }
    }

    #[test]
    fn empty_article_set_is_never_completed() {
        assert!(!derive_completed(&[], &[]));
        assert!(!derive_completed(&[row(1, true)], &[]));
    }

    #[test]
    fn completed_when_every_article_is_done() {
        let progress = [row(1, true), row(2, true)];
        assert!(derive_completed(&progress, &[1, 2]));
    }

    #[test]
    fn incomplete_when_any_article_is_pending() {
        let progress = [row(1, true), row(2, false)];
        assert!(!derive_completed(&progress, &[1, 2]));
    }

    #[test]
    fn incomplete_when_an_article_has_no_row() {
        let progress = [row(1, true)];
        assert!(!derive_completed(&progress, &[1, 2]));
    }

    #[test]
    fn rows_outside_the_set_do_not_count() {
        let progress = [row(1, true), row(9, true)];
        assert!(!derive_completed(&progress, &[1, 2]));
        assert!(derive_completed(&progress, &[1]));
    }

    #[test]
    fn plan_adds_new_and_drops_stale_articles() {
        let plan = ReconcilePlan::between(&[1, 2, 3], &[2, 4]);
        assert_eq!(plan.insert, vec![4]);
        assert_eq!(plan.delete, vec![1, 3]);
    }

    #[test]
    fn plan_for_identical_sets_is_empty() {
        let plan = ReconcilePlan::between(&[3, 1], &[1, 3]);
        assert!(plan.is_empty());
    }

    #[test]
    fn plan_for_empty_request_drops_everything() {
        let plan = ReconcilePlan::between(&[5, 6], &[]);
        assert!(plan.insert.is_empty());
        assert_eq!(plan.delete, vec![5, 6]);
    }

    #[test]
    fn plan_ignores_duplicates_in_request() {
        let plan = ReconcilePlan::between(&[], &[7, 7, 8]);
        assert_eq!(plan.insert, vec![7, 8]);
    }

    #[test]
    fn normalize_keeps_first_occurrence_order() {
        let ids = normalize_article_ids(&[3, 1, 3, 2, 1]).unwrap();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn normalize_rejects_non_positive_ids() {
        let err = normalize_article_ids(&[1, 0]).unwrap_err();
        assert!(matches!(err, GoalError::Validation(_)));
    }

    #[test]
    fn required_trims_and_rejects_blank() {
        assert_eq!(required("title", "  Read up ".to_string()).unwrap(), "Read up");
        assert!(required("title", "   ".to_string()).is_err());
    }
}
