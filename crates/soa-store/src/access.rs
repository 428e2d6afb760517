//! Access rule table.
//!
//! Grants are opt-in and scoped per `(component, field)`: a column with no
//! rule is inaccessible even though its storage exists.

use bitflags::bitflags;

use crate::{
    archetype::ArchetypeId,
    component::{ComponentId, FieldId},
};

bitflags! {
    /// Capability bitmask granted by an access rule or requested by a write.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct AccessMode: u32 {
        const READ = 1;
        const WRITE = 2;
        const REDUCE = 4;
        const READWRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

/// A single grant for one column of one archetype.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessRule {
    pub archetype_id: ArchetypeId,
    pub component_id: ComponentId,
    pub field_id: FieldId,
    pub mode: AccessMode,
}

/// Flat per-archetype rule table with linear lookup.
#[derive(Debug, Default)]
pub struct AccessTable {
    rules: Vec<AccessRule>,
}

impl AccessTable {
    #[must_use]
    pub const fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Create or overwrite the rule for `(component, field)`.
    pub fn upsert(
        &mut self,
        archetype_id: ArchetypeId,
        component_id: ComponentId,
        field_id: FieldId,
        mode: AccessMode,
    ) {
        if let Some(rule) = self
            .rules
            .iter_mut()
            .find(|r| r.component_id == component_id && r.field_id == field_id)
        {
            rule.mode = mode;
            return;
        }

        self.rules.push(AccessRule {
            archetype_id,
            component_id,
            field_id,
            mode,
        });
    }

    #[must_use]
    pub fn find(&self, component_id: ComponentId, field_id: FieldId) -> Option<&AccessRule> {
        self.rules
            .iter()
            .find(|r| r.component_id == component_id && r.field_id == field_id)
    }

    /// Granted mode, or `None` when no rule exists.
    #[must_use]
    pub fn granted(&self, component_id: ComponentId, field_id: FieldId) -> Option<AccessMode> {
        self.find(component_id, field_id).map(|rule| rule.mode)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccessRule> {
        self.rules.iter()
    }
}
