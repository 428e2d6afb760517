//! Component and field definitions.
//!
//! A component is a named group of fields. Each field becomes one column
//! in every archetype that contains the component, so the definitions here
//! fully describe the byte layout of a column: element type, element size
//! and row stride.

use std::fmt;

use smallvec::SmallVec;

/// Unique identifier for a component.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ComponentId(u64);

impl ComponentId {
    /// Create a component ID from a raw value.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({})", self.0)
    }
}

/// Identifier of a field within a component.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FieldId(u64);

impl FieldId {
    /// Create a field ID from a raw value.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldId({})", self.0)
    }
}

/// Scalar type stored in a column.
///
/// The discriminants are part of the stable contract other subsystems
/// compile against; do not reorder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ElementType {
    U8 = 0,
    I8 = 1,
    U16 = 2,
    I16 = 3,
    U32 = 4,
    I32 = 5,
    U64 = 6,
    I64 = 7,
    /// Signed Q16.16 fixed point stored in 4 bytes.
    FixedQ16 = 8,
    /// Signed Q32.32 fixed point stored in 8 bytes.
    FixedQ32 = 9,
}

impl ElementType {
    /// Every element type, in discriminant order.
    pub const ALL: [Self; 10] = [
        Self::U8,
        Self::I8,
        Self::U16,
        Self::I16,
        Self::U32,
        Self::I32,
        Self::U64,
        Self::I64,
        Self::FixedQ16,
        Self::FixedQ32,
    ];

    /// Size of one element in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::FixedQ16 => 4,
            Self::U64 | Self::I64 | Self::FixedQ32 => 8,
        }
    }

    /// Whether reductions are defined for this type.
    ///
    /// Only the four 32/64-bit integer types qualify.
    #[must_use]
    pub const fn is_reducible(self) -> bool {
        matches!(self, Self::U32 | Self::I32 | Self::U64 | Self::I64)
    }

    /// Get the raw discriminant.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self as u32
    }

    /// Decode a raw discriminant.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Self::U8,
            1 => Self::I8,
            2 => Self::U16,
            3 => Self::I16,
            4 => Self::U32,
            5 => Self::I32,
            6 => Self::U64,
            7 => Self::I64,
            8 => Self::FixedQ16,
            9 => Self::FixedQ32,
            _ => return None,
        })
    }
}

/// Definition of a single field: its id and column byte layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDef {
    pub id: FieldId,
    pub element_type: ElementType,
    pub element_size: usize,
    /// Per-row byte pitch of the column; never less than `element_size`.
    pub stride: usize,
}

impl FieldDef {
    /// A tightly packed field of the given type.
    #[must_use]
    pub const fn new(id: FieldId, element_type: ElementType) -> Self {
        Self {
            id,
            element_type,
            element_size: element_type.size(),
            stride: element_type.size(),
        }
    }

    /// Override the row stride (for padded columns).
    #[must_use]
    pub const fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }
}

/// Definition of a component: an id and its (unordered) fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentDef {
    pub id: ComponentId,
    pub fields: SmallVec<[FieldDef; 4]>,
}

impl ComponentDef {
    #[must_use]
    pub fn new(id: ComponentId, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        Self {
            id,
            fields: fields.into_iter().collect(),
        }
    }

    /// Convenience for a component with a single packed field.
    #[must_use]
    pub fn scalar(id: ComponentId, field: FieldId, element_type: ElementType) -> Self {
        Self::new(id, [FieldDef::new(field, element_type)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_sizes() {
        assert_eq!(ElementType::U8.size(), 1);
        assert_eq!(ElementType::I16.size(), 2);
        assert_eq!(ElementType::FixedQ16.size(), 4);
        assert_eq!(ElementType::FixedQ32.size(), 8);
        assert_eq!(ElementType::I64.size(), 8);
    }

    #[test]
    fn test_element_type_raw_roundtrip() {
        for ty in ElementType::ALL {
            assert_eq!(ElementType::from_raw(ty.as_raw()), Some(ty));
        }
        assert_eq!(ElementType::from_raw(10), None);
    }

    #[test]
    fn test_reducible_types() {
        let reducible: Vec<_> = ElementType::ALL
            .into_iter()
            .filter(|ty| ty.is_reducible())
            .collect();
        assert_eq!(
            reducible,
            vec![
                ElementType::U32,
                ElementType::I32,
                ElementType::U64,
                ElementType::I64
            ]
        );
    }

    #[test]
    fn test_field_def_stride() {
        let field = FieldDef::new(FieldId::from_raw(1), ElementType::U16).with_stride(8);
        assert_eq!(field.element_size, 2);
        assert_eq!(field.stride, 8);
    }
}
