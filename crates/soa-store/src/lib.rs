#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_fields_in_debug)]

//! SoA Store - deterministic archetype-based columnar entity storage
//!
//! Entities sharing a component set live in one archetype table, with one
//! densely packed column per (component, field). Systems read through
//! access-checked views and mutate only through batched, ordered commits.
//!
//! # Key Concepts
//!
//! - **Archetype**: A table for one canonical component set, identified by
//!   an FNV-1a hash of its sorted component ids
//! - **Column**: Packed bytes for one field of one component
//! - **Access rule**: Per (archetype, component, field) grant of
//!   read/write/reduce rights; no rule means no access
//! - **View**: Snapshot descriptor of one column, checked against the rules
//! - **Commit**: A write buffer validated as a whole, then applied in
//!   commit-key order with SUM/MIN/MAX reductions
//!
//! # Determinism
//!
//! The final state after a commit depends only on the contents of the
//! buffer, never on the order ops were pushed:
//! ```ignore
//! let late = CommitKey::new(0, 2, 0);
//! let early = CommitKey::new(0, 1, 0);
//! let mut buffer = WriteBuffer::new();
//! buffer.push(WriteOp::write_slice(late, range, HP, VALUE, ElementType::U32, &[9u32]));
//! buffer.push(WriteOp::write_slice(early, range, HP, VALUE, ElementType::U32, &[7u32]));
//! store.apply_writes(&buffer, &mut CommitContext::default())?; // HP == 9
//! ```

mod access;
mod archetype;
mod backend;
mod column;
mod commit;
mod component;
mod config;
mod entity;
mod error;
mod layout;
mod row_store;
mod shared;
mod store;
mod view;

pub use access::{AccessMode, AccessRule, AccessTable};
pub use archetype::{Archetype, ArchetypeId};
pub use backend::{StorageBackend, read_all, read_value};
pub use column::{Column, next_capacity};
pub use commit::{
    ColumnShape, CommitContext, CommitKey, CommitReport, OpTarget, ReductionOp, WriteBuffer,
    WriteOp, validate_op,
};
pub use component::{ComponentDef, ComponentId, ElementType, FieldDef, FieldId};
pub use config::{DuplicateArchetypePolicy, StoreConfig};
pub use entity::{EntityId, EntityRange};
pub use error::{StoreError, StoreResult, WriteRejection};
pub use layout::{
    ArchetypeLayout, ColumnLayout, FNV1A_OFFSET_BASIS_64, FNV1A_PRIME_64,
    archetype_id_from_components, component_set_is_sorted, sort_component_ids, sort_field_defs,
};
pub use row_store::RowStore;
pub use shared::SharedStore;
pub use store::ArchetypeStore;
pub use view::{ComponentView, ViewStatus, ViewToken};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        AccessMode, ArchetypeId, ArchetypeStore, CommitContext, CommitKey, ComponentDef,
        ComponentId, ComponentView, ElementType, EntityId, EntityRange, FieldDef, FieldId,
        ReductionOp, StorageBackend, StoreError, StoreResult, WriteBuffer, WriteOp, read_all,
        read_value,
    };
}
