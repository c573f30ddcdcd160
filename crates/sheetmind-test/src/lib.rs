//! Shared test utilities for the sheetmind agent runtime.
//!
//! This crate provides mock implementations and test helpers that can be
//! used across multiple sheetmind crates as a dev-dependency.
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! sheetmind-test.workspace = true
//! ```
//!
//! Then use in your tests:
//!
//! ```rust,ignore
//! #[cfg(test)]
//! mod tests {
//!     use sheetmind_test::prelude::*;
//!
//!     #[tokio::test]
//!     async fn replies_with_the_queued_response() {
//!         let provider = MockLlmProvider::new().with_text_response("hi there");
//!         let response = provider.complete(&[], &[], "").await.unwrap();
//!         assert_eq!(response.message.text(), Some("hi there"));
//!     }
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod harness;
pub mod mocks;
pub mod prelude;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
