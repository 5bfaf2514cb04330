use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A daily reading goal owned by a single user.
///
/// A goal names a set of articles to read. Each tracked article has a
/// [`Progress`] row, and `completed` is derived from those rows: it is true
/// only when the article set is non-empty and every article in it has been
/// marked complete. Clients never set it directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Goal {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub task: String,
    /// Article IDs in the order the user supplied them, without duplicates.
    pub articles_to_read: Vec<i64>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

/// Reading state of one article within a goal.
///
/// There is exactly one row per goal/article pair while the article belongs
/// to the goal's `articles_to_read`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Progress {
    pub goal_id: i64,
    pub article_id: i64,
    pub completed: bool,
    /// When the article was last marked complete. `None` while incomplete.
    pub date_completed: Option<DateTime<Utc>>,
}

/// A goal together with its per-article progress, ordered by article ID.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GoalWithProgress {
    #[serde(flatten)]
    pub goal: Goal,
    pub progress: Vec<Progress>,
}

/// Input for creating a new goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGoalInput {
    pub title: String,
    pub task: String,
    /// Initial articles to read. May be empty.
    #[serde(default)]
    pub article_ids: Vec<i64>,
}

/// Input for a full-replacement update of a goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateGoalInput {
    pub title: String,
    pub task: String,
    /// Accepted for compatibility with existing clients but never persisted:
    /// completion is always derived from progress.
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "ArticleSelection::is_keep")]
    pub article_ids: ArticleSelection,
}

/// Whether an update touches the goal's article set.
///
/// On the wire an absent or `null` `article_ids` field is [`Keep`], while any
/// array, including an empty one, is [`Replace`]. Replacing with an empty
/// list clears the set and forces the goal back to incomplete.
///
/// [`Keep`]: ArticleSelection::Keep
/// [`Replace`]: ArticleSelection::Replace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ArticleSelection {
    #[default]
    Keep,
    Replace(Vec<i64>),
}

impl ArticleSelection {
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }
}

impl From<Option<Vec<i64>>> for ArticleSelection {
    fn from(ids: Option<Vec<i64>>) -> Self {
        match ids {
            Some(ids) => Self::Replace(ids),
            None => Self::Keep,
        }
    }
}

impl Serialize for ArticleSelection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Keep => serializer.serialize_none(),
            Self::Replace(ids) => ids.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ArticleSelection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<Vec<i64>>::deserialize(deserializer).map(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_article_ids_keeps_the_current_set() {
        let input: UpdateGoalInput =
            serde_json::from_str(r#"{"title":"t","task":"k"}"#).unwrap();
        assert_eq!(input.article_ids, ArticleSelection::Keep);
        assert!(!input.completed);
    }

    #[test]
    fn null_article_ids_keeps_the_current_set() {
        let input: UpdateGoalInput =
            serde_json::from_str(r#"{"title":"t","task":"k","article_ids":null}"#).unwrap();
        assert_eq!(input.article_ids, ArticleSelection::Keep);
    }

    #[test]
    fn empty_article_ids_replaces_with_nothing() {
        let input: UpdateGoalInput =
            serde_json::from_str(r#"{"title":"t","task":"k","article_ids":[]}"#).unwrap();
        assert_eq!(input.article_ids, ArticleSelection::Replace(vec![]));
    }

    #[test]
    fn keep_is_omitted_when_serialized() {
        let input = UpdateGoalInput {
            title: "t".to_string(),
            task: "k".to_string(),
            completed: false,
            article_ids: ArticleSelection::Keep,
        };
        let value = serde_json::to_value(&input).unwrap();
        assert!(value.get("article_ids").is_none());
    }
}
