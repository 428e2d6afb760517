//! Archetype store - the concrete columnar storage engine.
//!
//! Holds every archetype in registration order and implements
//! [`StorageBackend`] on top of them. Lookups are linear scans in
//! registration order, so the first registration of an id wins.

use crate::{
    access::AccessMode,
    archetype::{Archetype, ArchetypeId},
    backend::StorageBackend,
    commit::{
        ColumnShape, CommitContext, CommitReport, CommitTarget, OpTarget, WriteBuffer, WriteOp,
        apply_cell, run_commit,
    },
    component::{ComponentDef, ComponentId, FieldId},
    config::{DuplicateArchetypePolicy, StoreConfig},
    entity::{EntityId, EntityRange},
    error::{StoreError, StoreResult},
    layout::ArchetypeLayout,
    view::{ComponentView, ViewStatus, ViewToken},
};

/// Columnar (structure-of-arrays) archetype store.
#[derive(Debug, Default)]
pub struct ArchetypeStore {
    archetypes: Vec<Archetype>,
    config: StoreConfig,
    /// Lower bound for the structural version of newly created archetypes.
    version_floor: u64,
}

impl ArchetypeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ==================== Archetype Operations ====================

    /// Register an archetype for a set of component definitions.
    ///
    /// The definitions are copied and canonicalized; the caller's slice is
    /// left as is.
    pub fn add_archetype(
        &mut self,
        defs: &[ComponentDef],
        initial_capacity: usize,
    ) -> StoreResult<ArchetypeId> {
        let layout = ArchetypeLayout::new(defs)?;
        let id = layout.id();

        if self.index_of(id).is_some() {
            match self.config.duplicate_archetypes {
                DuplicateArchetypePolicy::Reject => {
                    return Err(StoreError::DuplicateArchetype(id));
                }
                DuplicateArchetypePolicy::Allow => {
                    tracing::debug!("Registering {id:?} again; lookups keep the first table");
                }
            }
        }

        let mut archetype = Archetype::new(
            &layout,
            initial_capacity,
            self.config.max_entities_per_archetype,
        )?;
        archetype.rebase_version(self.version_floor);

        tracing::debug!(
            "Created {id:?} with {} components, {} columns, capacity {}",
            layout.components().len(),
            layout.columns().len(),
            archetype.capacity()
        );
        self.archetypes.push(archetype);
        Ok(id)
    }

    /// Register an archetype with the configured default capacity.
    pub fn add_archetype_default(&mut self, defs: &[ComponentDef]) -> StoreResult<ArchetypeId> {
        self.add_archetype(defs, self.config.default_initial_capacity)
    }

    /// Tear down an archetype and release its storage.
    pub fn remove_archetype(&mut self, archetype_id: ArchetypeId) -> StoreResult<()> {
        let idx = self
            .index_of(archetype_id)
            .ok_or(StoreError::UnknownArchetype(archetype_id))?;
        let archetype = self.archetypes.remove(idx);
        self.version_floor = self.version_floor.max(archetype.version() + 1);

        // A shadowed registration of the same id becomes reachable now; move
        // it past every version the removed table ever issued.
        for other in self.archetypes.iter_mut().filter(|a| a.id() == archetype_id) {
            other.rebase_version(self.version_floor);
        }

        tracing::debug!(
            "Removed {archetype_id:?} holding {} entities",
            archetype.len()
        );
        Ok(())
    }

    fn index_of(&self, archetype_id: ArchetypeId) -> Option<usize> {
        self.archetypes.iter().position(|a| a.id() == archetype_id)
    }

    /// Get an archetype by ID.
    #[must_use]
    pub fn archetype(&self, archetype_id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.iter().find(|a| a.id() == archetype_id)
    }

    fn archetype_mut(&mut self, archetype_id: ArchetypeId) -> StoreResult<&mut Archetype> {
        self.archetypes
            .iter_mut()
            .find(|a| a.id() == archetype_id)
            .ok_or(StoreError::UnknownArchetype(archetype_id))
    }

    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Iterate over all archetypes in registration order.
    pub fn archetypes(&self) -> impl Iterator<Item = &Archetype> {
        self.archetypes.iter()
    }

    // ==================== Entity Operations ====================

    /// Grow an archetype's storage to hold at least `capacity` entities.
    pub fn reserve_entities(
        &mut self,
        archetype_id: ArchetypeId,
        capacity: usize,
    ) -> StoreResult<()> {
        self.archetype_mut(archetype_id)?.reserve(capacity)
    }

    /// Append an entity with zeroed fields; returns its row.
    pub fn insert_entity(
        &mut self,
        archetype_id: ArchetypeId,
        entity: EntityId,
    ) -> StoreResult<usize> {
        self.archetype_mut(archetype_id)?.insert(entity)
    }

    /// Remove an entity, compacting later rows down; returns its old row.
    pub fn remove_entity(
        &mut self,
        archetype_id: ArchetypeId,
        entity: EntityId,
    ) -> StoreResult<usize> {
        self.archetype_mut(archetype_id)?.remove(entity)
    }

    #[must_use]
    pub fn entity_count(&self, archetype_id: ArchetypeId) -> Option<usize> {
        self.archetype(archetype_id).map(Archetype::len)
    }

    #[must_use]
    pub fn capacity(&self, archetype_id: ArchetypeId) -> Option<usize> {
        self.archetype(archetype_id).map(Archetype::capacity)
    }

    #[must_use]
    pub fn entities(&self, archetype_id: ArchetypeId) -> Option<&[EntityId]> {
        self.archetype(archetype_id).map(Archetype::entities)
    }

    #[must_use]
    pub fn contains_entity(&self, archetype_id: ArchetypeId, entity: EntityId) -> bool {
        self.archetype(archetype_id)
            .is_some_and(|a| a.contains(entity))
    }

    // ==================== Access Rules ====================

    /// Create or overwrite the access grant for a column.
    pub fn set_access_rule(
        &mut self,
        archetype_id: ArchetypeId,
        component_id: ComponentId,
        field_id: FieldId,
        mode: AccessMode,
    ) -> StoreResult<()> {
        self.archetype_mut(archetype_id)?
            .set_access_rule(component_id, field_id, mode);
        Ok(())
    }

    /// Granted mode for a column, `None` when no rule exists.
    #[must_use]
    pub fn access_rule(
        &self,
        archetype_id: ArchetypeId,
        component_id: ComponentId,
        field_id: FieldId,
    ) -> Option<AccessMode> {
        self.archetype(archetype_id)?
            .access()
            .granted(component_id, field_id)
    }
}

impl StorageBackend for ArchetypeStore {
    fn get_archetype(&self, entity: EntityId) -> Option<ArchetypeId> {
        self.archetypes
            .iter()
            .find(|a| a.contains(entity))
            .map(Archetype::id)
    }

    fn query_archetype(&self, archetype_id: ArchetypeId) -> Option<EntityRange> {
        self.archetype(archetype_id).map(Archetype::full_range)
    }

    fn get_view(
        &self,
        archetype_id: ArchetypeId,
        component_id: ComponentId,
        field_id: FieldId,
    ) -> ComponentView {
        let Some(archetype) = self.archetype(archetype_id) else {
            return ComponentView::denied();
        };
        let Some(slot) = archetype.column_index(component_id, field_id) else {
            return ComponentView::denied();
        };
        let Some(mode) = archetype.access().granted(component_id, field_id) else {
            return ComponentView::denied();
        };

        let column = &archetype.columns()[slot];
        ComponentView {
            component_id,
            field_id,
            element_type: column.element_type(),
            element_size: column.element_size(),
            stride: column.stride(),
            count: archetype.len(),
            access_mode: mode,
            status: ViewStatus::Granted,
            token: ViewToken {
                archetype_id,
                slot,
                version: archetype.version(),
            },
        }
    }

    fn read(&self, view: &ComponentView, index: usize) -> Option<&[u8]> {
        if !view.in_bounds(index) {
            return None;
        }
        let archetype = self.archetype(view.token.archetype_id)?;
        if archetype.version() != view.token.version {
            return None;
        }
        let column = archetype.column_by_index(view.token.slot)?;
        if !column.matches(view.component_id, view.field_id) {
            return None;
        }
        column.element(index)
    }

    fn apply_writes(
        &mut self,
        buffer: &WriteBuffer<'_>,
        context: &mut CommitContext,
    ) -> StoreResult<CommitReport> {
        run_commit(self, buffer, context)
    }
}

impl CommitTarget for ArchetypeStore {
    fn resolve(&self, op: &WriteOp<'_>) -> Option<OpTarget> {
        let archetype = self.archetype(op.archetype_id())?;
        Some(OpTarget {
            entity_count: archetype.len(),
            column: archetype
                .column(op.component_id, op.field_id)
                .map(|column| ColumnShape {
                    element_type: column.element_type(),
                    element_size: column.element_size(),
                }),
            granted: archetype.access().granted(op.component_id, op.field_id),
        })
    }

    fn apply_op(&mut self, op: &WriteOp<'_>) {
        let Ok(archetype) = self.archetype_mut(op.archetype_id()) else {
            return;
        };
        let Some(slot) = archetype.column_index(op.component_id, op.field_id) else {
            return;
        };
        let Some(column) = archetype.column_by_index_mut(slot) else {
            return;
        };

        for (i, row) in (op.range.begin..op.range.end).enumerate() {
            if let Some(cell) = column.element_mut(row) {
                apply_cell(op, i, cell);
            }
        }
    }
}
