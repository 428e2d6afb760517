//! Cloneable handle around a backend for multi-threaded readers.
//!
//! Readers take the shared lock for views and reads; a commit takes the
//! exclusive lock for its whole validate-then-apply pass, so no reader ever
//! observes a half-applied buffer.

use std::sync::Arc;

use bytemuck::Pod;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{
    archetype::ArchetypeId,
    backend::{StorageBackend, read_all, read_value},
    commit::{CommitContext, CommitReport, WriteBuffer},
    component::{ComponentId, FieldId},
    error::StoreResult,
    view::ComponentView,
};

/// Shared backend handle. Clones refer to the same storage.
#[derive(Debug, Default)]
pub struct SharedStore<B> {
    inner: Arc<RwLock<B>>,
}

impl<B> Clone for SharedStore<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: StorageBackend> SharedStore<B> {
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self {
            inner: Arc::new(RwLock::new(backend)),
        }
    }

    /// Shared access. Views stay readable across guards until an insert or
    /// removal changes the archetype's shape.
    pub fn read(&self) -> RwLockReadGuard<'_, B> {
        self.inner.read()
    }

    /// Exclusive access for structural changes (inserts, grants).
    pub fn write(&self) -> RwLockWriteGuard<'_, B> {
        self.inner.write()
    }

    #[must_use]
    pub fn get_view(
        &self,
        archetype_id: ArchetypeId,
        component_id: ComponentId,
        field_id: FieldId,
    ) -> ComponentView {
        self.inner
            .read()
            .get_view(archetype_id, component_id, field_id)
    }

    #[must_use]
    pub fn read_value<T: Pod>(&self, view: &ComponentView, index: usize) -> Option<T> {
        read_value(&*self.inner.read(), view, index)
    }

    #[must_use]
    pub fn read_all<T: Pod>(&self, view: &ComponentView) -> Vec<T> {
        read_all(&*self.inner.read(), view)
    }

    pub fn apply_writes(
        &self,
        buffer: &WriteBuffer<'_>,
        context: &mut CommitContext,
    ) -> StoreResult<CommitReport> {
        self.inner.write().apply_writes(buffer, context)
    }

    /// Unwrap the backend if this is the last handle.
    pub fn try_into_inner(self) -> Result<B, Self> {
        Arc::try_unwrap(self.inner)
            .map(RwLock::into_inner)
            .map_err(|inner| Self { inner })
    }
}
