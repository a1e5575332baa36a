//! CLI commands for gradestore

pub mod backfill;
pub mod blocks;
pub mod dispatch;
pub mod doctor;
pub mod format;
pub mod grade;
pub mod init;
pub mod list;
pub mod show;
