//! Store configuration.

use serde::{Deserialize, Serialize};

/// What `add_archetype` does when the canonical component set is already
/// registered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateArchetypePolicy {
    /// Fail with [`StoreError::DuplicateArchetype`](crate::StoreError::DuplicateArchetype).
    #[default]
    Reject,
    /// Register a second table under the same id. Lookups by id resolve to
    /// the first registration, so the later one is unreachable.
    Allow,
}

/// Tunables for an [`ArchetypeStore`](crate::ArchetypeStore).
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Rows reserved by `add_archetype_default`.
    pub default_initial_capacity: usize,
    pub duplicate_archetypes: DuplicateArchetypePolicy,
    /// Hard cap on rows per archetype. Growth past it fails.
    pub max_entities_per_archetype: Option<usize>,
}

impl StoreConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_default_initial_capacity(mut self, capacity: usize) -> Self {
        self.default_initial_capacity = capacity;
        self
    }

    #[must_use]
    pub const fn with_duplicate_archetypes(mut self, policy: DuplicateArchetypePolicy) -> Self {
        self.duplicate_archetypes = policy;
        self
    }

    #[must_use]
    pub const fn with_max_entities_per_archetype(mut self, limit: usize) -> Self {
        self.max_entities_per_archetype = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.default_initial_capacity, 0);
        assert_eq!(config.duplicate_archetypes, DuplicateArchetypePolicy::Reject);
        assert_eq!(config.max_entities_per_archetype, None);
    }

    #[test]
    fn test_deserialize_partial() {
        let json = r#"{ "duplicate_archetypes": "allow", "default_initial_capacity": 64 }"#;
        let config: StoreConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.duplicate_archetypes, DuplicateArchetypePolicy::Allow);
        assert_eq!(config.default_initial_capacity, 64);
        assert_eq!(config.max_entities_per_archetype, None);
    }
}
