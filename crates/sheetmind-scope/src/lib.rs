//! Sheetmind Scope — the per-request identity and database handle every
//! store is built from.
//!
//! [`UserContext`] is the immutable identity a request carries; a
//! [`ScopeFactory`] turns one into a [`UserScope`] that either owns a
//! dedicated per-user SQLite file or shares the instance-wide connection
//! (Postgres, or an anonymous SQLite caller).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod context;
pub mod error;
pub mod factory;

pub use context::UserContext;
pub use error::{ScopeError, ScopeResult};
pub use factory::{ScopeFactory, UserScope};
