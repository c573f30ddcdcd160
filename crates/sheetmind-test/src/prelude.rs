//! Prelude module - commonly used types for convenient import.
//!
//! Use `use sheetmind_test::prelude::*;` to import all essential types.
//!
//! ```rust,ignore
//! use sheetmind_test::prelude::*;
//!
//! #[tokio::test]
//! async fn turn_loop_replies_without_tool_calls() {
//!     let provider = MockLlmProvider::new().with_text_response("done");
//!     let db = test_database().await;
//!     // ... build a SessionBridge + Engine around `provider` and `db`.
//! }
//! ```

pub use crate::fixtures::{
    test_anonymous_user_id, test_conversation, test_session_id, test_session_id_from,
    test_tool_call, test_user_id,
};
pub use crate::harness::{init_test_tracing, temp_workspace_with_files, test_database};
pub use crate::mocks::{FailingLlmProvider, MockLlmProvider};
