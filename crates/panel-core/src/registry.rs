//! Used-name registry
//!
//! Tracks persona names handed out during one run so later prompts can ask the
//! service to avoid them. Registration is advisory: the generator keeps a
//! persona whose name collides and only records a warning.
//!
//! The registry is written only during the sequential persona phase and
//! carries no synchronization.

use std::collections::{BTreeSet, HashMap};

/// Scope key used when one scope covers the whole run
pub const GLOBAL_SCOPE: &str = "*";

/// Which names a new persona must not clash with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameScope {
    /// Names are unique within each stakeholder group
    PerGroup,
    /// Names are unique across the run
    #[default]
    Global,
}

impl NameScope {
    /// Select mode from the run-level flag
    #[inline]
    #[must_use]
    pub fn from_flag(global_name_uniqueness: bool) -> Self {
        if global_name_uniqueness {
            Self::Global
        } else {
            Self::PerGroup
        }
    }
}

/// Registry of used persona names
#[derive(Debug, Default)]
pub struct NameRegistry {
    mode: NameScope,
    /// scope key -> (normalized name -> name as first registered)
    scopes: HashMap<String, HashMap<String, String>>,
}

impl NameRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new(mode: NameScope) -> Self {
        Self {
            mode,
            scopes: HashMap::new(),
        }
    }

    /// Scope mode
    #[inline]
    #[must_use]
    pub fn mode(&self) -> NameScope {
        self.mode
    }

    /// Scope key for a stakeholder group under the current mode
    #[inline]
    #[must_use]
    pub fn scope_key<'a>(&self, group_id: &'a str) -> &'a str {
        match self.mode {
            NameScope::Global => GLOBAL_SCOPE,
            NameScope::PerGroup => group_id,
        }
    }

    /// Reserve a name
    ///
    /// Returns `true` iff the name was free in `scope_key` and is now taken.
    /// Comparison ignores case and surrounding whitespace.
    pub fn reserve(&mut self, scope_key: &str, name: &str) -> bool {
        let key = normalize(name);
        if key.is_empty() {
            return false;
        }
        let scope = self.scopes.entry(scope_key.to_string()).or_default();
        if scope.contains_key(&key) {
            return false;
        }
        scope.insert(key, name.trim().to_string());
        true
    }

    /// Names taken in `scope_key`, sorted
    #[must_use]
    pub fn snapshot(&self, scope_key: &str) -> BTreeSet<String> {
        self.scopes
            .get(scope_key)
            .map(|scope| scope.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of names taken in `scope_key`
    #[must_use]
    pub fn len(&self, scope_key: &str) -> usize {
        self.scopes.get(scope_key).map_or(0, HashMap::len)
    }

    /// Forget every reservation
    pub fn reset(&mut self) {
        self.scopes.clear();
    }
}

fn normalize(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn reserve_rejects_duplicates_in_scope() {
        let mut registry = NameRegistry::new(NameScope::PerGroup);
        assert!(registry.reserve("a", "Maria Silva"));
        assert!(!registry.reserve("a", "  maria   SILVA "));
        assert!(registry.reserve("b", "Maria Silva"));
        assert_eq!(registry.len("a"), 1);
    }

    #[test]
    fn global_mode_maps_every_group_to_one_scope() {
        let registry = NameRegistry::new(NameScope::Global);
        assert_eq!(registry.scope_key("buyers"), GLOBAL_SCOPE);
        assert_eq!(registry.scope_key("sellers"), GLOBAL_SCOPE);

        let registry = NameRegistry::new(NameScope::from_flag(false));
        assert_eq!(registry.scope_key("buyers"), "buyers");
    }

    #[test]
    fn snapshot_keeps_first_spelling() {
        let mut registry = NameRegistry::new(NameScope::Global);
        registry.reserve(GLOBAL_SCOPE, "Jo Kim");
        registry.reserve(GLOBAL_SCOPE, "JO KIM");
        let names = registry.snapshot(GLOBAL_SCOPE);
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["Jo Kim".to_string()]);
    }

    #[test]
    fn reset_clears_all_scopes() {
        let mut registry = NameRegistry::new(NameScope::PerGroup);
        registry.reserve("a", "X");
        registry.reserve("b", "Y");
        registry.reset();
        assert!(registry.snapshot("a").is_empty());
        assert!(registry.reserve("b", "Y"));
    }

    #[test]
    fn blank_names_are_never_reserved() {
        let mut registry = NameRegistry::default();
        assert!(!registry.reserve(GLOBAL_SCOPE, "   "));
    }

    proptest! {
        #[test]
        fn prop_second_reservation_always_fails(name in "[A-Za-z][A-Za-z ]{0,20}") {
            let mut registry = NameRegistry::new(NameScope::Global);
            prop_assert!(registry.reserve(GLOBAL_SCOPE, &name));
            prop_assert!(!registry.reserve(GLOBAL_SCOPE, &name.to_uppercase()));
            prop_assert_eq!(registry.len(GLOBAL_SCOPE), 1);
        }
    }
}
