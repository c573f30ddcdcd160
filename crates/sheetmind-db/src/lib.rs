//! Sheetmind DB — a dialect-rewriting connection adapter over `sqlx::Any`.
//!
//! One [`Database`] type talks to either SQLite or Postgres. SQL is
//! always written once, in SQLite syntax; [`dialect::rewrite`] translates
//! `?` placeholders, `INSERT OR IGNORE` and `INSERT OR REPLACE` into
//! Postgres equivalents before the statement is sent. [`migrations`]
//! layers a small ordered-integer schema migrator on top.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod database;
pub mod dialect;
pub mod error;
pub mod migrations;
pub mod params;
pub mod row;

pub use database::Database;
pub use dialect::Dialect;
pub use error::{DbError, DbResult};
pub use migrations::{migrate, Migration, MIGRATIONS};
pub use params::Param;
pub use row::Row;
