//! Component views - validated, non-owning column descriptors.
//!
//! A view never borrows the store. It records the column's shape, the
//! granted access mode and a token identifying the column and the
//! archetype's structural version at the time of issue. Any insert, remove
//! or relocation bumps that version, after which reads through the old view
//! fail instead of observing moved rows.

use crate::{
    access::AccessMode,
    archetype::ArchetypeId,
    component::{ComponentId, ElementType, FieldId},
};

/// Whether a view was granted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ViewStatus {
    /// No column or no access rule; every other view field is zeroed.
    #[default]
    Denied,
    Granted,
}

/// Opaque backend-specific handle carried by a view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ViewToken {
    pub archetype_id: ArchetypeId,
    /// Backend-defined slot (column index for the columnar store).
    pub slot: usize,
    /// Structural version the view was issued at.
    pub version: u64,
}

/// Read-only descriptor of one column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentView {
    pub component_id: ComponentId,
    pub field_id: FieldId,
    pub element_type: ElementType,
    pub element_size: usize,
    pub stride: usize,
    /// Rows readable through this view.
    pub count: usize,
    /// Mode granted by the access rule, verbatim.
    pub access_mode: AccessMode,
    pub status: ViewStatus,
    pub token: ViewToken,
}

impl ComponentView {
    /// The invalid sentinel view.
    #[must_use]
    pub fn denied() -> Self {
        Self {
            component_id: ComponentId::default(),
            field_id: FieldId::default(),
            element_type: ElementType::U8,
            element_size: 0,
            stride: 0,
            count: 0,
            access_mode: AccessMode::empty(),
            status: ViewStatus::Denied,
            token: ViewToken::default(),
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.status == ViewStatus::Granted
    }

    /// Bounds check for a row read.
    #[must_use]
    pub fn in_bounds(&self, index: usize) -> bool {
        self.is_valid() && index < self.count
    }
}

impl Default for ComponentView {
    fn default() -> Self {
        Self::denied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denied_view_is_zeroed() {
        let view = ComponentView::denied();
        assert!(!view.is_valid());
        assert_eq!(view.count, 0);
        assert_eq!(view.element_size, 0);
        assert_eq!(view.stride, 0);
        assert_eq!(view.access_mode, AccessMode::empty());
        assert_eq!(view.element_type.as_raw(), 0);
        assert_eq!(view.token, ViewToken::default());
        assert!(!view.in_bounds(0));
    }
}
