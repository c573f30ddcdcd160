//! Composes the system prompt's rules section from compiled global
//! rules (YAML-backed) and a session's own rules (DB-backed).

use sheetmind_core::SessionId;
use sheetmind_db::Database;
use sheetmind_stores::{GlobalRuleStore, SessionRuleStore};

use crate::error::EngineResult;

/// Render the rules block injected into the system prompt: enabled
/// global rules first, then the session's own rules, each as a
/// markdown bullet. Empty string if neither store has anything.
///
/// # Errors
///
/// Returns [`crate::error::EngineError::Rules`] if the global rules
/// file exists but fails to parse, or a store error if the session
/// rules query fails.
pub async fn compose_rules_block(
    global: &GlobalRuleStore,
    db: &Database,
    session_id: &SessionId,
) -> EngineResult<String> {
    let mut lines = Vec::new();

    let global_rules = global.list().map_err(|e| crate::error::EngineError::Rules(e.to_string()))?;
    for rule in global_rules.iter().filter(|r| r.enabled) {
        lines.push(format!("- {}", rule.content));
    }

    let session_rules = SessionRuleStore::new(db).list_enabled(session_id).await?;
    for rule in &session_rules {
        lines.push(format!("- {}", rule.content));
    }

    if lines.is_empty() {
        return Ok(String::new());
    }
    Ok(format!("## Rules\n\n{}", lines.join("\n")))
}
