//! Error types for goal operations.
//!
//! Every [`GoalError`] carries an [`ErrorKind`] so the HTTP layer can pick a
//! status code without inspecting messages.

use thiserror::Error;

/// Boxed error from a storage backend or catalog implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, GoalError>;

/// Errors returned by the goal engine.
#[derive(Debug, Error)]
pub enum GoalError {
    /// Input has the wrong shape (empty title, non-positive ID, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The goal does not exist or belongs to another user.
    #[error("goal {goal_id} not found")]
    NotFound { goal_id: i64 },

    /// One or more referenced articles are not in the catalog.
    #[error("unknown article ids: {}", join_ids(.ids))]
    Rejected { ids: Vec<i64> },

    /// The article is not part of the goal's current reading set.
    #[error("article {article_id} is not tracked by goal {goal_id}")]
    NotTracked { goal_id: i64, article_id: i64 },

    /// A read or write against the backing store failed. The surrounding
    /// transaction has been rolled back.
    #[error("storage failure during {step}: {source}")]
    Storage {
        step: &'static str,
        #[source]
        source: BoxError,
    },
}

/// Coarse classification of a [`GoalError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Rejected,
    Conflict,
    Storage,
}

impl GoalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Rejected { .. } => ErrorKind::Rejected,
            Self::NotTracked { .. } => ErrorKind::Conflict,
            Self::Storage { .. } => ErrorKind::Storage,
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Wrap a backend error with the name of the step that produced it.
///
/// ```ignore
/// tx.insert_goal(..).map_err(storage("insert goal"))?;
/// ```
pub(crate) fn storage<E>(step: &'static str) -> impl FnOnce(E) -> GoalError
where
    E: Into<BoxError>,
{
    move |e| GoalError::Storage {
        step,
        source: e.into(),
    }
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
