//! Store error types.
//!
//! Every variant maps onto the integer status code callers on the other side
//! of the storage boundary compile against; see [`StoreError::status`].

use thiserror::Error;

use crate::{
    archetype::ArchetypeId,
    component::{ComponentId, ElementType, FieldId},
    entity::EntityId,
};

/// Store error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No archetype is registered under this id.
    #[error("unknown archetype: {0:?}")]
    UnknownArchetype(ArchetypeId),

    /// The entity is already present in the archetype.
    #[error("entity {entity} already present in {archetype:?}")]
    DuplicateEntity {
        archetype: ArchetypeId,
        entity: EntityId,
    },

    /// The entity is not present in the archetype.
    #[error("entity {entity} not found in {archetype:?}")]
    EntityNotFound {
        archetype: ArchetypeId,
        entity: EntityId,
    },

    /// Growing entity or column storage failed.
    #[error("capacity overflow: requested {requested} rows")]
    CapacityOverflow { requested: usize },

    /// The component definitions do not describe a usable layout.
    #[error("invalid layout: {0}")]
    InvalidLayout(&'static str),

    /// An archetype with the same canonical component set already exists.
    #[error("archetype already registered: {0:?}")]
    DuplicateArchetype(ArchetypeId),

    /// A write buffer failed validation; nothing was applied.
    #[error("commit rejected at op {op_index}: {reason}")]
    CommitRejected {
        op_index: usize,
        reason: WriteRejection,
    },
}

impl StoreError {
    /// Integer status code for this error. Success is `0`.
    #[must_use]
    pub const fn status(&self) -> i32 {
        match self {
            Self::UnknownArchetype(_) | Self::InvalidLayout(_) => -1,
            Self::DuplicateEntity { .. } | Self::EntityNotFound { .. } => -2,
            Self::CapacityOverflow { .. } => -3,
            Self::DuplicateArchetype(_) => -4,
            Self::CommitRejected { .. } => -5,
        }
    }
}

/// Reason a single write op failed commit validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WriteRejection {
    #[error("unknown archetype {0:?}")]
    UnknownArchetype(ArchetypeId),

    #[error("no column for {component:?}/{field:?}")]
    MissingColumn {
        component: ComponentId,
        field: FieldId,
    },

    #[error("no access rule for {component:?}/{field:?}")]
    MissingAccessRule {
        component: ComponentId,
        field: FieldId,
    },

    #[error("requested access {requested:#x} exceeds granted {granted:#x}")]
    AccessNotGranted { requested: u32, granted: u32 },

    #[error("malformed range {begin}..{end}")]
    MalformedRange { begin: usize, end: usize },

    #[error("range end {end} exceeds entity count {len}")]
    RangeOutOfBounds { end: usize, len: usize },

    #[error("element type {op:?} does not match column type {column:?}")]
    ElementTypeMismatch {
        op: ElementType,
        column: ElementType,
    },

    #[error("element size {op} does not match column size {column}")]
    ElementSizeMismatch { op: usize, column: usize },

    #[error("stride {stride} smaller than element size {element_size}")]
    StrideTooSmall { stride: usize, element_size: usize },

    #[error("missing write payload")]
    MissingPayload,

    #[error("payload of {len} bytes too short, need {needed}")]
    PayloadTooShort { len: usize, needed: usize },

    #[error("plain write without WRITE access")]
    WriteNotRequested,

    #[error("reduction without REDUCE access")]
    ReduceNotRequested,

    #[error("reduction on non-integer column type {0:?}")]
    NonReducibleType(ElementType),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
