//! Archetype layout canonicalization.
//!
//! Turns an unordered list of component definitions into the canonical form
//! used everywhere else: components ascending by id, fields ascending by id
//! within each component, and a content-addressed [`ArchetypeId`] derived
//! from the sorted component set.
//!
//! The id is a running FNV-1a 64 over the little-endian bytes of each
//! component id, so two permutations of the same set always hash equal once
//! sorted.

use smallvec::SmallVec;

use crate::{
    archetype::ArchetypeId,
    component::{ComponentDef, ComponentId, FieldDef},
    error::{StoreError, StoreResult},
};

pub const FNV1A_OFFSET_BASIS_64: u64 = 1_469_598_103_934_665_603;
pub const FNV1A_PRIME_64: u64 = 1_099_511_628_211;

/// Stable ascending insertion sort of component ids.
pub fn sort_component_ids(ids: &mut [ComponentId]) {
    insertion_sort_by_key(ids, |id| *id);
}

/// Stable ascending insertion sort of field definitions by field id.
pub fn sort_field_defs(fields: &mut [FieldDef]) {
    insertion_sort_by_key(fields, |field| field.id);
}

/// Whether `ids` is already in ascending order.
#[must_use]
pub fn component_set_is_sorted(ids: &[ComponentId]) -> bool {
    ids.windows(2).all(|pair| pair[0] <= pair[1])
}

/// Derive the archetype id of a component set.
///
/// The ids must already be sorted ascending; this function does not sort.
/// Returns [`ArchetypeId::EMPTY`] for an empty set.
#[must_use]
pub fn archetype_id_from_components(ids: &[ComponentId]) -> ArchetypeId {
    if ids.is_empty() {
        return ArchetypeId::EMPTY;
    }

    let mut hash = FNV1A_OFFSET_BASIS_64;
    for id in ids {
        for byte in id.as_raw().to_le_bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(FNV1A_PRIME_64);
        }
    }
    ArchetypeId::from_raw(hash)
}

// Small-N: archetypes rarely carry more than a handful of components.
fn insertion_sort_by_key<T, K: Ord>(items: &mut [T], key: impl Fn(&T) -> K) {
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 && key(&items[j - 1]) > key(&items[j]) {
            items.swap(j - 1, j);
            j -= 1;
        }
    }
}

/// Position of a single column in the canonical column order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnLayout {
    pub component_id: ComponentId,
    pub field: FieldDef,
}

/// Canonical, validated form of an archetype's component definitions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchetypeLayout {
    id: ArchetypeId,
    components: SmallVec<[ComponentId; 8]>,
    columns: Vec<ColumnLayout>,
}

impl ArchetypeLayout {
    /// Canonicalize `defs` without mutating the caller's slice.
    ///
    /// Repeated component ids, and repeated field ids within a component,
    /// collapse to their first definition.
    pub fn new(defs: &[ComponentDef]) -> StoreResult<Self> {
        if defs.is_empty() {
            return Err(StoreError::InvalidLayout("empty component set"));
        }

        let mut sorted: Vec<ComponentDef> = defs.to_vec();
        insertion_sort_by_key(&mut sorted, |def| def.id);

        let mut components: SmallVec<[ComponentId; 8]> = SmallVec::with_capacity(sorted.len());
        let mut columns = Vec::new();

        // Both sorts are stable, so the first definition of a repeated id
        // is the one kept.
        sorted.dedup_by_key(|def| def.id);

        for def in &mut sorted {
            components.push(def.id);

            sort_field_defs(&mut def.fields);
            def.fields.dedup_by_key(|field| field.id);

            for field in &def.fields {
                validate_field(field)?;
                columns.push(ColumnLayout {
                    component_id: def.id,
                    field: *field,
                });
            }
        }

        debug_assert!(component_set_is_sorted(&components));

        Ok(Self {
            id: archetype_id_from_components(&components),
            components,
            columns,
        })
    }

    #[must_use]
    pub const fn id(&self) -> ArchetypeId {
        self.id
    }

    /// Component ids, ascending.
    #[must_use]
    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }

    /// Columns ordered by component id, then field id.
    #[must_use]
    pub fn columns(&self) -> &[ColumnLayout] {
        &self.columns
    }
}

fn validate_field(field: &FieldDef) -> StoreResult<()> {
    if field.element_size == 0 {
        return Err(StoreError::InvalidLayout("zero element size"));
    }
    if field.element_size != field.element_type.size() {
        return Err(StoreError::InvalidLayout(
            "element size does not match element type",
        ));
    }
    if field.stride < field.element_size {
        return Err(StoreError::InvalidLayout("stride smaller than element size"));
    }
    Ok(())
}
