//! Per-request binding for the [`SharedMemory`] handle tools resolve
//! against.
//!
//! `PersistentMemory` is looked up by name from inside tool execution,
//! where there is no natural place to thread an extra function
//! argument through the `BuiltinTool` trait. Binding it to a task-local
//! slot — set on entry to a turn, restored on exit — means concurrent
//! turns across different sessions never see each other's memory
//! handle, without requiring every tool signature to carry it.

use std::sync::Arc;

use sheetmind_memory::{MemoryStorageBackend, PersistentMemory};

/// Type-erased, reference-counted handle to a session's persistent memory.
pub type SharedMemory = Arc<PersistentMemory<Box<dyn MemoryStorageBackend>>>;

tokio::task_local! {
    static CURRENT: SharedMemory;
}

/// Run `fut` with `memory` bound as the current task's memory handle.
///
/// This is the `guard` helper from the per-request context binding
/// design: the scoped value is set for the duration of `fut` and
/// dropped when it returns, regardless of whether it errors.
pub async fn guard<F, T>(memory: SharedMemory, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    CURRENT.scope(memory, fut).await
}

/// The memory handle bound by the innermost enclosing [`guard`] call, if any.
pub fn current() -> Option<SharedMemory> {
    CURRENT.try_with(Clone::clone).ok()
}
