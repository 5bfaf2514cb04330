//! Domain models for journal goals.
//!
//! # Core Concepts
//!
//! - [`Goal`]: A user's reading goal with an ordered set of articles to read.
//!   Its `completed` flag is derived, never written by clients.
//! - [`Progress`]: Per-article reading state, one row per article currently
//!   in the goal's set. Rows are deleted when the article leaves the set.
//! - [`Article`]: Catalog entry referenced by goals. Read-only from the goal
//!   side.

mod article;
mod goal;

pub use article::*;
pub use goal::*;
