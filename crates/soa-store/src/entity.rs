//! Entity identifiers and contiguous entity ranges.
//!
//! There is no global entity table: an entity's identity and its archetype
//! membership live together in the archetype's entity index.

use std::fmt;

use crate::archetype::ArchetypeId;

/// Opaque 64-bit entity handle, unique within one archetype.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EntityId(u64);

impl EntityId {
    /// Create an entity ID from a raw value.
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

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Half-open row range `[begin, end)` inside one archetype.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntityRange {
    pub archetype_id: ArchetypeId,
    pub begin: usize,
    pub end: usize,
}

impl EntityRange {
    #[must_use]
    pub const fn new(archetype_id: ArchetypeId, begin: usize, end: usize) -> Self {
        Self {
            archetype_id,
            begin,
            end,
        }
    }

    /// A single-row range. `usize::MAX` saturates to an empty range.
    #[must_use]
    pub const fn single(archetype_id: ArchetypeId, row: usize) -> Self {
        Self::new(archetype_id, row, row.saturating_add(1))
    }

    /// A range is well-formed iff `end >= begin`.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.end >= self.begin
    }

    /// Number of rows covered; zero for a malformed range.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.end.saturating_sub(self.begin)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Check whether the range fits inside an archetype holding `len` rows.
    #[must_use]
    pub const fn fits_within(&self, len: usize) -> bool {
        self.is_valid() && self.end <= len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_count() {
        let arch = ArchetypeId::from_raw(7);
        let range = EntityRange::new(arch, 2, 5);
        assert!(range.is_valid());
        assert_eq!(range.count(), 3);
        assert!(range.fits_within(5));
        assert!(!range.fits_within(4));
    }

    #[test]
    fn test_malformed_range() {
        let range = EntityRange::new(ArchetypeId::from_raw(1), 4, 2);
        assert!(!range.is_valid());
        assert_eq!(range.count(), 0);
        assert!(!range.fits_within(10));
    }

    #[test]
    fn test_empty_range_is_valid() {
        let range = EntityRange::new(ArchetypeId::from_raw(1), 3, 3);
        assert!(range.is_valid());
        assert!(range.is_empty());
        assert!(range.fits_within(3));
    }

    #[test]
    fn test_single_range() {
        let arch = ArchetypeId::from_raw(1);
        assert_eq!(EntityRange::single(arch, 4), EntityRange::new(arch, 4, 5));

        let last = EntityRange::single(arch, usize::MAX);
        assert!(last.is_valid());
        assert!(last.is_empty());
    }
}
