//! Row-major storage backend.
//!
//! Stores each entity as one packed record holding every field, the
//! array-of-structures counterpart to [`ArchetypeStore`](crate::ArchetypeStore).
//! It shares nothing with the columnar engine beyond layout canonicalization
//! and the commit driver, which makes it a useful oracle: both backends must
//! agree on every view and read.

use std::collections::BTreeMap;

use crate::{
    access::AccessMode,
    archetype::ArchetypeId,
    backend::StorageBackend,
    commit::{
        ColumnShape, CommitContext, CommitReport, CommitTarget, OpTarget, WriteBuffer, WriteOp,
        apply_cell, run_commit,
    },
    component::{ComponentDef, ComponentId, FieldDef, FieldId},
    entity::{EntityId, EntityRange},
    error::{StoreError, StoreResult},
    layout::ArchetypeLayout,
    view::{ComponentView, ViewStatus, ViewToken},
};

#[derive(Debug, Clone, Copy)]
struct RecordField {
    component_id: ComponentId,
    field: FieldDef,
    /// Byte offset inside a record.
    offset: usize,
}

#[derive(Debug)]
struct RowTable {
    id: ArchetypeId,
    fields: Vec<RecordField>,
    record_size: usize,
    entities: Vec<EntityId>,
    records: Vec<u8>,
    grants: BTreeMap<(ComponentId, FieldId), AccessMode>,
    version: u64,
}

impl RowTable {
    fn field_slot(&self, component_id: ComponentId, field_id: FieldId) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.component_id == component_id && f.field.id == field_id)
    }

    fn cell_mut(&mut self, row: usize, field: RecordField) -> Option<&mut [u8]> {
        if row >= self.entities.len() {
            return None;
        }
        let start = row * self.record_size + field.offset;
        self.records.get_mut(start..start + field.field.element_size)
    }
}

/// Array-of-structures backend.
#[derive(Debug, Default)]
pub struct RowStore {
    tables: Vec<RowTable>,
}

impl RowStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an archetype. Re-registering a component set fails.
    pub fn add_archetype(&mut self, defs: &[ComponentDef]) -> StoreResult<ArchetypeId> {
        let layout = ArchetypeLayout::new(defs)?;
        if self.table(layout.id()).is_some() {
            return Err(StoreError::DuplicateArchetype(layout.id()));
        }

        let mut offset = 0;
        let fields = layout
            .columns()
            .iter()
            .map(|c| {
                let field = RecordField {
                    component_id: c.component_id,
                    field: c.field,
                    offset,
                };
                offset += c.field.element_size;
                field
            })
            .collect();

        self.tables.push(RowTable {
            id: layout.id(),
            fields,
            record_size: offset,
            entities: Vec::new(),
            records: Vec::new(),
            grants: BTreeMap::new(),
            version: 0,
        });
        Ok(layout.id())
    }

    fn table(&self, archetype_id: ArchetypeId) -> Option<&RowTable> {
        self.tables.iter().find(|t| t.id == archetype_id)
    }

    fn table_mut(&mut self, archetype_id: ArchetypeId) -> StoreResult<&mut RowTable> {
        self.tables
            .iter_mut()
            .find(|t| t.id == archetype_id)
            .ok_or(StoreError::UnknownArchetype(archetype_id))
    }

    /// Append a zeroed record; returns its row.
    pub fn insert_entity(
        &mut self,
        archetype_id: ArchetypeId,
        entity: EntityId,
    ) -> StoreResult<usize> {
        let table = self.table_mut(archetype_id)?;
        if table.entities.contains(&entity) {
            return Err(StoreError::DuplicateEntity {
                archetype: archetype_id,
                entity,
            });
        }

        let row = table.entities.len();
        table
            .records
            .try_reserve(table.record_size)
            .map_err(|_| StoreError::CapacityOverflow { requested: row + 1 })?;
        table.entities.push(entity);
        table
            .records
            .resize(table.records.len() + table.record_size, 0);
        table.version += 1;
        Ok(row)
    }

    /// Remove a record, keeping the order of the others.
    pub fn remove_entity(
        &mut self,
        archetype_id: ArchetypeId,
        entity: EntityId,
    ) -> StoreResult<usize> {
        let table = self.table_mut(archetype_id)?;
        let row = table
            .entities
            .iter()
            .position(|&e| e == entity)
            .ok_or(StoreError::EntityNotFound {
                archetype: archetype_id,
                entity,
            })?;

        table.entities.remove(row);
        let start = row * table.record_size;
        table.records.drain(start..start + table.record_size);
        table.version += 1;
        Ok(row)
    }

    pub fn set_access_rule(
        &mut self,
        archetype_id: ArchetypeId,
        component_id: ComponentId,
        field_id: FieldId,
        mode: AccessMode,
    ) -> StoreResult<()> {
        self.table_mut(archetype_id)?
            .grants
            .insert((component_id, field_id), mode);
        Ok(())
    }
}

impl StorageBackend for RowStore {
    fn get_archetype(&self, entity: EntityId) -> Option<ArchetypeId> {
        self.tables
            .iter()
            .find(|t| t.entities.contains(&entity))
            .map(|t| t.id)
    }

    fn query_archetype(&self, archetype_id: ArchetypeId) -> Option<EntityRange> {
        self.table(archetype_id)
            .map(|t| EntityRange::new(t.id, 0, t.entities.len()))
    }

    fn get_view(
        &self,
        archetype_id: ArchetypeId,
        component_id: ComponentId,
        field_id: FieldId,
    ) -> ComponentView {
        let Some(table) = self.table(archetype_id) else {
            return ComponentView::denied();
        };
        let (Some(slot), Some(&mode)) = (
            table.field_slot(component_id, field_id),
            table.grants.get(&(component_id, field_id)),
        ) else {
            return ComponentView::denied();
        };

        let field = table.fields[slot].field;
        ComponentView {
            component_id,
            field_id,
            element_type: field.element_type,
            element_size: field.element_size,
            stride: table.record_size,
            count: table.entities.len(),
            access_mode: mode,
            status: ViewStatus::Granted,
            token: ViewToken {
                archetype_id,
                slot,
                version: table.version,
            },
        }
    }

    fn read(&self, view: &ComponentView, index: usize) -> Option<&[u8]> {
        if !view.in_bounds(index) {
            return None;
        }
        let table = self.table(view.token.archetype_id)?;
        if table.version != view.token.version {
            return None;
        }
        let field = table.fields.get(view.token.slot)?;
        let start = index * table.record_size + field.offset;
        table.records.get(start..start + field.field.element_size)
    }

    fn apply_writes(
        &mut self,
        buffer: &WriteBuffer<'_>,
        context: &mut CommitContext,
    ) -> StoreResult<CommitReport> {
        run_commit(self, buffer, context)
    }
}

impl CommitTarget for RowStore {
    fn resolve(&self, op: &WriteOp<'_>) -> Option<OpTarget> {
        let table = self.table(op.archetype_id())?;
        let column = table
            .field_slot(op.component_id, op.field_id)
            .map(|slot| ColumnShape {
                element_type: table.fields[slot].field.element_type,
                element_size: table.fields[slot].field.element_size,
            });
        Some(OpTarget {
            entity_count: table.entities.len(),
            column,
            granted: table.grants.get(&(op.component_id, op.field_id)).copied(),
        })
    }

    fn apply_op(&mut self, op: &WriteOp<'_>) {
        let Ok(table) = self.table_mut(op.archetype_id()) else {
            return;
        };
        let Some(slot) = table.field_slot(op.component_id, op.field_id) else {
            return;
        };
        let field = table.fields[slot];

        for (i, row) in (op.range.begin..op.range.end).enumerate() {
            if let Some(cell) = table.cell_mut(row, field) {
                apply_cell(op, i, cell);
            }
        }
    }
}
