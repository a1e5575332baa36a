//! Gradestore Core Library
//!
//! Persistent per-student subsection grade snapshots: content-addressed
//! visible-block records, saved grade rows, and the factory that decides
//! between loading a saved grade and computing a fresh one.

pub mod blocks;
pub mod config;
pub mod course;
pub mod db;
pub mod error;
pub mod grades;
pub mod identity;
pub mod integrity;
pub mod keys;
pub mod logging;
pub mod scores;
pub mod store;
