//! Daily reading goals for a journaling backend.
//!
//! A [`models::Goal`] names a set of catalog articles to read. The
//! [`engine::GoalEngine`] keeps per-article [`models::Progress`] rows in step
//! with that set and derives whether the goal is completed; [`db`] persists
//! both in SQLite, and [`api`] exposes them over HTTP.

pub mod api;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
