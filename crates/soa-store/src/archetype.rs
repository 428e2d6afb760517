//! Archetype storage - tables of entities with identical component layouts.
//!
//! An archetype owns its entity index, one [`Column`] per (component, field)
//! pair and its access rule table. The entity index and every column share
//! one logical length and one capacity schedule.

use std::fmt;

use smallvec::SmallVec;

use crate::{
    access::{AccessMode, AccessTable},
    column::{Column, next_capacity},
    component::{ComponentId, FieldId},
    entity::{EntityId, EntityRange},
    error::{StoreError, StoreResult},
    layout::ArchetypeLayout,
};

/// Content-addressed archetype identifier.
///
/// Derived from the sorted component set by
/// [`archetype_id_from_components`](crate::archetype_id_from_components).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ArchetypeId(u64);

impl ArchetypeId {
    /// The empty archetype (no components).
    pub const EMPTY: Self = Self(0);

    /// Create an archetype ID from a raw value.
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

impl fmt::Debug for ArchetypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArchetypeId({:#018x})", self.0)
    }
}

/// An archetype - a table storing entities with the same component layout.
pub struct Archetype {
    id: ArchetypeId,
    /// Sorted list of component IDs in this archetype.
    components: SmallVec<[ComponentId; 8]>,
    /// Columns ordered by component id, then field id.
    columns: Vec<Column>,
    entities: Vec<EntityId>,
    /// Rows allocated in the entity index and every column.
    capacity: usize,
    /// Upper bound on rows, if configured.
    limit: Option<usize>,
    access: AccessTable,
    /// Bumped on every structural change; stale views compare against it.
    version: u64,
}

impl Archetype {
    /// Allocate an archetype for a canonical layout.
    pub fn new(
        layout: &ArchetypeLayout,
        initial_capacity: usize,
        limit: Option<usize>,
    ) -> StoreResult<Self> {
        let columns = layout
            .columns()
            .iter()
            .map(|c| Column::new(c.component_id, c.field))
            .collect();

        let mut archetype = Self {
            id: layout.id(),
            components: layout.components().iter().copied().collect(),
            columns,
            entities: Vec::new(),
            capacity: 0,
            limit,
            access: AccessTable::new(),
            version: 0,
        };
        archetype.reserve(initial_capacity)?;
        Ok(archetype)
    }

    /// Get the archetype ID.
    #[must_use]
    pub const fn id(&self) -> ArchetypeId {
        self.id
    }

    /// Get the component IDs in this archetype (sorted).
    #[must_use]
    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }

    /// Check if this archetype contains a component.
    #[must_use]
    pub fn contains_component(&self, component_id: ComponentId) -> bool {
        self.components.binary_search(&component_id).is_ok()
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Index of the column storing `(component, field)`.
    #[must_use]
    pub fn column_index(&self, component_id: ComponentId, field_id: FieldId) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.matches(component_id, field_id))
    }

    #[must_use]
    pub fn column(&self, component_id: ComponentId, field_id: FieldId) -> Option<&Column> {
        self.column_index(component_id, field_id)
            .map(|idx| &self.columns[idx])
    }

    #[must_use]
    pub fn column_by_index(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    #[must_use]
    pub fn column_by_index_mut(&mut self, index: usize) -> Option<&mut Column> {
        self.columns.get_mut(index)
    }

    /// Number of entities stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entities in row order.
    #[must_use]
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    /// Row currently holding `entity`.
    #[must_use]
    pub fn row_of(&self, entity: EntityId) -> Option<usize> {
        self.entities.iter().position(|&e| e == entity)
    }

    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.row_of(entity).is_some()
    }

    /// Range covering every row.
    #[must_use]
    pub fn full_range(&self) -> EntityRange {
        EntityRange::new(self.id, 0, self.len())
    }

    #[must_use]
    pub const fn access(&self) -> &AccessTable {
        &self.access
    }

    /// Create or overwrite the grant for `(component, field)`.
    ///
    /// Rules are independent of column existence.
    pub fn set_access_rule(
        &mut self,
        component_id: ComponentId,
        field_id: FieldId,
        mode: AccessMode,
    ) {
        tracing::trace!(
            "Access rule {:?}/{:?}/{:?} = {:?}",
            self.id,
            component_id,
            field_id,
            mode
        );
        self.access.upsert(self.id, component_id, field_id, mode);
    }

    /// Structural version; changes on insert, remove and relocation.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Offset the structural version so tokens issued by a torn-down
    /// archetype with the same id never validate against this one.
    pub(crate) fn rebase_version(&mut self, base: u64) {
        self.version += base;
    }

    /// Grow entity and column storage to hold at least `capacity` rows.
    pub fn reserve(&mut self, capacity: usize) -> StoreResult<()> {
        if capacity <= self.capacity {
            return Ok(());
        }
        if self.limit.is_some_and(|limit| capacity > limit) {
            return Err(StoreError::CapacityOverflow {
                requested: capacity,
            });
        }

        let mut new_capacity = next_capacity(self.capacity, capacity)?;
        if let Some(limit) = self.limit {
            new_capacity = new_capacity.min(limit);
        }

        self.entities
            .try_reserve_exact(new_capacity - self.entities.len())
            .map_err(|_| StoreError::CapacityOverflow {
                requested: new_capacity,
            })?;
        // Columns that grew before a failure keep their larger buffers;
        // `capacity` only advances once every column has succeeded.
        for column in &mut self.columns {
            column.set_capacity(new_capacity)?;
        }

        tracing::trace!(
            "Grew {:?} from {} to {} rows",
            self.id,
            self.capacity,
            new_capacity
        );
        self.capacity = new_capacity;
        self.version += 1;
        Ok(())
    }

    /// Append an entity with zero-initialized columns and return its row.
    pub fn insert(&mut self, entity: EntityId) -> StoreResult<usize> {
        if self.contains(entity) {
            return Err(StoreError::DuplicateEntity {
                archetype: self.id,
                entity,
            });
        }

        let row = self.entities.len();
        if row == self.capacity {
            self.reserve(row + 1)?;
        }

        self.entities.push(entity);
        for column in &mut self.columns {
            column.push_zeroed();
        }
        self.version += 1;

        tracing::trace!("Inserted {entity} into {:?} at row {row}", self.id);
        Ok(row)
    }

    /// Remove an entity, shifting later rows down to close the gap.
    ///
    /// Returns the row the entity occupied.
    pub fn remove(&mut self, entity: EntityId) -> StoreResult<usize> {
        let row = self.row_of(entity).ok_or(StoreError::EntityNotFound {
            archetype: self.id,
            entity,
        })?;

        self.entities.remove(row);
        for column in &mut self.columns {
            column.remove_row(row);
        }
        self.version += 1;

        tracing::trace!("Removed {entity} from {:?} at row {row}", self.id);
        Ok(row)
    }
}

impl fmt::Debug for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archetype")
            .field("id", &self.id)
            .field("components", &self.components)
            .field("column_count", &self.columns.len())
            .field("entity_count", &self.entities.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
