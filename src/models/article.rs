use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An entry in the article catalog that goals point at.
///
/// Goals only ever read the catalog to check that referenced articles exist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for adding an article to the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateArticleInput {
    pub title: String,
    pub content: Option<String>,
}
