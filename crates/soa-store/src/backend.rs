//! Storage backend interface.
//!
//! Callers hold a `&dyn StorageBackend` (or `&mut dyn` to commit) and never
//! the concrete store, so any conforming backend can be swapped in without
//! changing them. Two backends that receive the same inserts, grants and
//! write buffers must produce identical views and reads.

use bytemuck::Pod;

use crate::{
    archetype::ArchetypeId,
    commit::{CommitContext, CommitReport, WriteBuffer},
    component::{ComponentId, FieldId},
    entity::{EntityId, EntityRange},
    error::StoreResult,
    view::ComponentView,
};

pub trait StorageBackend {
    /// Archetype holding `entity`. Entity ids are only unique per archetype;
    /// the first archetype in registration order wins.
    fn get_archetype(&self, entity: EntityId) -> Option<ArchetypeId>;

    /// Range covering every row of an archetype.
    fn query_archetype(&self, archetype_id: ArchetypeId) -> Option<EntityRange>;

    /// Access-checked descriptor of one column; the denied sentinel unless
    /// both the column and an access rule exist.
    fn get_view(
        &self,
        archetype_id: ArchetypeId,
        component_id: ComponentId,
        field_id: FieldId,
    ) -> ComponentView;

    /// Element bytes at `index`; `None` when the view is denied, stale or
    /// `index >= view.count`.
    fn read(&self, view: &ComponentView, index: usize) -> Option<&[u8]>;

    /// Validate the whole buffer, then apply it in commit-key order.
    fn apply_writes(
        &mut self,
        buffer: &WriteBuffer<'_>,
        context: &mut CommitContext,
    ) -> StoreResult<CommitReport>;
}

/// Typed read through a view. `T` must match the view's element size.
#[must_use]
pub fn read_value<T: Pod>(
    backend: &(impl StorageBackend + ?Sized),
    view: &ComponentView,
    index: usize,
) -> Option<T> {
    if std::mem::size_of::<T>() != view.element_size {
        return None;
    }
    backend
        .read(view, index)
        .map(bytemuck::pod_read_unaligned::<T>)
}

/// Read every row of a view into a vector.
#[must_use]
pub fn read_all<T: Pod>(backend: &(impl StorageBackend + ?Sized), view: &ComponentView) -> Vec<T> {
    (0..view.count)
        .filter_map(|index| read_value(backend, view, index))
        .collect()
}
