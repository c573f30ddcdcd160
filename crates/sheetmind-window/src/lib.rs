//! Window perception: tracks the set of "windows" (explorer listings
//! and sheet viewports) a session has open, keeps their state current
//! as tools run, and renders a token-budgeted slice of that state back
//! into the system prompt and tool results.
//!
//! Bulk tool-result ingestion (sheet read/write/filter payloads) is
//! folded straight into a window's cache by [`ingest`]; every other
//! kind of mutation (lifecycle tiering, intent tracking, style and
//! metadata updates) goes through [`delta::apply_delta`]. The rest of
//! the crate classifies input, ranks windows for the budget allocator,
//! or renders already-applied state to text.

pub mod adaptive;
pub mod advisor;
pub mod budget;
pub mod confirmation;
pub mod delta;
pub mod domain;
pub mod error;
pub mod extractor;
pub mod focus;
pub mod geometry;
pub mod identity;
pub mod ingest;
pub mod locator;
pub mod manager;
pub mod models;
pub mod rangeref;
pub mod renderer;
pub mod repeat;
pub mod rules;
pub mod small_model;

pub use adaptive::AdaptiveModeSelector;
pub use advisor::{HybridAdvisor, LifecyclePlan, PlanSource, RuleBasedAdvisor, WindowAdvice, WindowLifecycleAdvisor, WindowLifecycleView, WindowTier};
pub use budget::{WindowBudgetAllocator, WindowRenderCandidate};
pub use confirmation::{build_confirmation_record, parse_confirmation, serialize_confirmation, ConfirmationMode, ConfirmationRecord};
pub use delta::{apply_delta, DeltaBody, WindowDelta};
pub use domain::{ExplorerWindow, SheetWindow, Window};
pub use error::{DeltaReject, LocatorReject, RejectCode, WindowError, WindowResult};
pub use extractor::{extract_directory, extract_explorer_entries, extract_file_path, extract_range_ref, extract_sheet_name, extract_sheet_tabs, extract_shape, is_excel_path, normalize_path, parse_json_payload};
pub use focus::{FocusAction, FocusOutcome, FocusService, RefillReader};
pub use geometry::{extract_column_widths, extract_conditional_effects, extract_merged_range_delta, extract_merged_ranges, extract_row_heights, extract_status_bar, extract_viewport_geometry, ScrollPosition, StatusBarSummary, ViewportGeometry};
pub use identity::WindowIdentity;
pub use locator::WindowLocator;
pub use manager::{ManagerConfig, WindowPerceptionManager};
pub use models::{ColumnDef, DetailLevel, IntentTag, PerceptionBudget, Viewport, WindowRenderAction, WindowSnapshot, WindowType};
pub use repeat::{repeat_threshold, RepeatDetector, RepeatThresholds};
pub use rules::{classify_tool, task_type_from_intent, IntentDecision, IntentResolver, ToolMeta};
pub use small_model::{SmallModelAdvisor, SmallModelClient, SmallModelTrigger};
