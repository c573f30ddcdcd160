//! Sheetmind Core — shared identifiers, timestamps and content hashing.
//!
//! This crate has no dependency on any other `sheetmind-*` crate. It
//! provides the handful of primitives every layer above it needs:
//!
//! - [`SessionId`] / [`UserId`] — opaque string identifiers.
//! - [`Timestamp`] — a thin `DateTime<Utc>` wrapper with the RFC3339
//!   round-trip every store needs.
//! - [`content_hash`] — the normalised SHA-256 dedup hash used by the
//!   memory store and the vector index.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod hash;
pub mod ids;
pub mod time;

pub use hash::content_hash;
pub use ids::{SessionId, UserId};
pub use time::Timestamp;
