//! Bidirectional map between stable window identities and window ids.

use std::collections::HashMap;

use crate::error::LocatorReject;
use crate::identity::WindowIdentity;

/// Maps stable identities to window ids and back. Registering the same
/// identity with a different id, or looking one up under the wrong
/// kind, is an explicit reject rather than a panic or silent overwrite.
#[derive(Debug, Default)]
pub struct WindowLocator {
    index: HashMap<WindowIdentity, String>,
    window_to_identity: HashMap<String, WindowIdentity>,
}

impl WindowLocator {
    /// Build an empty locator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `identity` as resolving to `window_id`.
    ///
    /// # Errors
    ///
    /// Returns [`LocatorReject::identity_conflict`] if `identity` is
    /// already registered to a different window id.
    pub fn register(&mut self, identity: WindowIdentity, window_id: &str) -> Result<(), LocatorReject> {
        if let Some(existing) = self.index.get(&identity) {
            if existing != window_id {
                return Err(LocatorReject::identity_conflict(format!(
                    "identity already bound to window {existing}, cannot rebind to {window_id}"
                )));
            }
            return Ok(());
        }
        self.index.insert(identity.clone(), window_id.to_string());
        self.window_to_identity.insert(window_id.to_string(), identity);
        Ok(())
    }

    /// Look up the window id bound to `identity`, or `None` if unknown.
    #[must_use]
    pub fn find(&self, identity: &WindowIdentity) -> Option<&str> {
        self.index.get(identity).map(String::as_str)
    }

    /// Look up the window id bound to `identity`, rejecting if a window
    /// of a different kind is found at the same identity slot.
    ///
    /// # Errors
    ///
    /// Returns [`LocatorReject::kind_conflict`] if a differently-kinded
    /// identity maps to an already-known window id under a colliding key.
    pub fn find_expect_kind(&self, identity: &WindowIdentity, expected_kind: &str) -> Result<Option<&str>, LocatorReject> {
        if identity.kind() != expected_kind {
            return Err(LocatorReject::kind_conflict(format!(
                "identity kind {} does not match expected kind {expected_kind}",
                identity.kind()
            )));
        }
        Ok(self.find(identity))
    }

    /// The identity a window id was registered under, if any.
    #[must_use]
    pub fn identity_of(&self, window_id: &str) -> Option<&WindowIdentity> {
        self.window_to_identity.get(window_id)
    }

    /// Remove a window id and its identity from the locator.
    pub fn remove(&mut self, window_id: &str) {
        if let Some(identity) = self.window_to_identity.remove(window_id) {
            self.index.remove(&identity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_find_round_trips() {
        let mut locator = WindowLocator::new();
        let id = WindowIdentity::sheet("/a.xlsx", "Sheet1");
        locator.register(id.clone(), "win-1").unwrap();
        assert_eq!(locator.find(&id), Some("win-1"));
    }

    #[test]
    fn re_registering_same_identity_same_window_is_ok() {
        let mut locator = WindowLocator::new();
        let id = WindowIdentity::sheet("/a.xlsx", "Sheet1");
        locator.register(id.clone(), "win-1").unwrap();
        assert!(locator.register(id, "win-1").is_ok());
    }

    #[test]
    fn registering_same_identity_different_window_conflicts() {
        let mut locator = WindowLocator::new();
        let id = WindowIdentity::sheet("/a.xlsx", "Sheet1");
        locator.register(id.clone(), "win-1").unwrap();
        let err = locator.register(id, "win-2").unwrap_err();
        assert_eq!(err.code.as_str(), "WINDOW_IDENTITY_CONFLICT");
    }

    #[test]
    fn find_expect_kind_mismatch_conflicts() {
        let locator = WindowLocator::new();
        let id = WindowIdentity::sheet("/a.xlsx", "Sheet1");
        let err = locator.find_expect_kind(&id, "explorer").unwrap_err();
        assert_eq!(err.code.as_str(), "WINDOW_KIND_CONFLICT");
    }

    #[test]
    fn remove_clears_both_directions() {
        let mut locator = WindowLocator::new();
        let id = WindowIdentity::sheet("/a.xlsx", "Sheet1");
        locator.register(id.clone(), "win-1").unwrap();
        locator.remove("win-1");
        assert_eq!(locator.find(&id), None);
        assert_eq!(locator.identity_of("win-1"), None);
    }
}
