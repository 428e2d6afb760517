//! Write buffers and the deterministic commit protocol.
//!
//! A commit runs in two strictly separate passes:
//!
//! ```text
//! Received ──► Validating ──┬──► Aborted    (status != 0, nothing applied)
//!                           └──► Applying ──► Committed
//! ```
//!
//! Validation walks the ops in submission order and touches nothing. Only
//! when every op passes are they stable-sorted by [`CommitKey`] and applied
//! in that order. Plain writes overwrite (last by key wins); reductions
//! combine with whatever the cell holds at that point in the sorted order.

use bytemuck::Pod;

use crate::{
    access::AccessMode,
    archetype::ArchetypeId,
    component::{ComponentId, ElementType, FieldId},
    entity::EntityRange,
    error::{StoreError, StoreResult, WriteRejection},
};

/// Ordering key for writes: lexicographic on phase, task, sub-index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct CommitKey {
    pub phase_id: u64,
    pub task_id: u64,
    pub sub_index: u32,
}

impl CommitKey {
    #[must_use]
    pub const fn new(phase_id: u64, task_id: u64, sub_index: u32) -> Self {
        Self {
            phase_id,
            task_id,
            sub_index,
        }
    }
}

/// Combine operator for reduction writes. `None` marks a plain write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum ReductionOp {
    #[default]
    None = 0,
    Sum = 1,
    Min = 2,
    Max = 3,
}

impl ReductionOp {
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self as u32
    }

    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Self::None,
            1 => Self::Sum,
            2 => Self::Min,
            3 => Self::Max,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn is_reduction(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// One proposed mutation over a contiguous entity range.
///
/// `data` holds one element every `stride` bytes, one per row of `range`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteOp<'a> {
    pub commit_key: CommitKey,
    pub range: EntityRange,
    pub component_id: ComponentId,
    pub field_id: FieldId,
    pub element_type: ElementType,
    pub element_size: usize,
    pub access_mode: AccessMode,
    pub reduction_op: ReductionOp,
    pub data: &'a [u8],
    pub stride: usize,
}

impl<'a> WriteOp<'a> {
    /// A plain overwrite of packed elements.
    #[must_use]
    pub const fn write(
        commit_key: CommitKey,
        range: EntityRange,
        component_id: ComponentId,
        field_id: FieldId,
        element_type: ElementType,
        data: &'a [u8],
    ) -> Self {
        Self {
            commit_key,
            range,
            component_id,
            field_id,
            element_type,
            element_size: element_type.size(),
            access_mode: AccessMode::WRITE,
            reduction_op: ReductionOp::None,
            data,
            stride: element_type.size(),
        }
    }

    /// A reduction of packed elements into the column.
    #[must_use]
    pub const fn reduce(
        commit_key: CommitKey,
        range: EntityRange,
        component_id: ComponentId,
        field_id: FieldId,
        element_type: ElementType,
        reduction_op: ReductionOp,
        data: &'a [u8],
    ) -> Self {
        let mut op = Self::write(commit_key, range, component_id, field_id, element_type, data);
        op.access_mode = AccessMode::REDUCE;
        op.reduction_op = reduction_op;
        op
    }

    /// A plain overwrite from typed values.
    #[must_use]
    pub fn write_slice<T: Pod>(
        commit_key: CommitKey,
        range: EntityRange,
        component_id: ComponentId,
        field_id: FieldId,
        element_type: ElementType,
        values: &'a [T],
    ) -> Self {
        let mut op = Self::write(
            commit_key,
            range,
            component_id,
            field_id,
            element_type,
            bytemuck::cast_slice(values),
        );
        op.element_size = std::mem::size_of::<T>();
        op.stride = std::mem::size_of::<T>();
        op
    }

    /// A reduction from typed values.
    #[must_use]
    pub fn reduce_slice<T: Pod>(
        commit_key: CommitKey,
        range: EntityRange,
        component_id: ComponentId,
        field_id: FieldId,
        element_type: ElementType,
        reduction_op: ReductionOp,
        values: &'a [T],
    ) -> Self {
        let mut op = Self::write_slice(
            commit_key,
            range,
            component_id,
            field_id,
            element_type,
            values,
        );
        op.access_mode = AccessMode::REDUCE;
        op.reduction_op = reduction_op;
        op
    }

    #[must_use]
    pub const fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    #[must_use]
    pub const fn with_access(mut self, access_mode: AccessMode) -> Self {
        self.access_mode = access_mode;
        self
    }

    #[must_use]
    pub const fn archetype_id(&self) -> ArchetypeId {
        self.range.archetype_id
    }

    /// Payload bytes needed to cover the range, `None` on overflow.
    #[must_use]
    pub fn required_payload(&self) -> Option<usize> {
        match self.range.count() {
            0 => Some(0),
            n => (n - 1)
                .checked_mul(self.stride)?
                .checked_add(self.element_size),
        }
    }

    /// Incoming element bytes for the `i`-th row of the range.
    fn element(&self, i: usize) -> &'a [u8] {
        let start = i * self.stride;
        &self.data[start..start + self.element_size]
    }
}

/// A batch of write ops submitted together.
#[derive(Clone, Debug, Default)]
pub struct WriteBuffer<'a> {
    ops: Vec<WriteOp<'a>>,
}

impl<'a> WriteBuffer<'a> {
    #[must_use]
    pub const fn new() -> Self {
        Self { ops: Vec::new() }
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ops: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, op: WriteOp<'a>) {
        self.ops.push(op);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Ops in submission order.
    #[must_use]
    pub fn ops(&self) -> &[WriteOp<'a>] {
        &self.ops
    }

    pub fn iter(&self) -> impl Iterator<Item = &WriteOp<'a>> {
        self.ops.iter()
    }

    /// Submission indices in application order.
    ///
    /// Stable: ops with equal keys keep their submission order.
    #[must_use]
    pub fn sorted_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.ops.len()).collect();
        order.sort_by_key(|&i| self.ops[i].commit_key);
        order
    }
}

impl<'a> Extend<WriteOp<'a>> for WriteBuffer<'a> {
    fn extend<I: IntoIterator<Item = WriteOp<'a>>>(&mut self, iter: I) {
        self.ops.extend(iter);
    }
}

impl<'a> FromIterator<WriteOp<'a>> for WriteBuffer<'a> {
    fn from_iter<I: IntoIterator<Item = WriteOp<'a>>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}

/// Metadata accompanying a commit. `status` is written back by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct CommitContext {
    pub epoch_id: u64,
    pub graph_id: u64,
    /// Advisory only; the store never rolls back on its own.
    pub allow_rollback: bool,
    /// `0` on success, the error's status code otherwise.
    pub status: i32,
}

impl CommitContext {
    #[must_use]
    pub const fn new(epoch_id: u64, graph_id: u64) -> Self {
        Self {
            epoch_id,
            graph_id,
            allow_rollback: false,
            status: 0,
        }
    }
}

/// Summary of a successful commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct CommitReport {
    pub applied_ops: usize,
    pub cells_written: usize,
    pub cells_reduced: usize,
}

/// Shape of the column an op targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnShape {
    pub element_type: ElementType,
    pub element_size: usize,
}

/// What a backend knows about an op's destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpTarget {
    pub entity_count: usize,
    pub column: Option<ColumnShape>,
    pub granted: Option<AccessMode>,
}

/// Backend hooks the shared commit driver needs.
pub(crate) trait CommitTarget {
    /// Describe the destination of `op`; `None` if its archetype is unknown.
    fn resolve(&self, op: &WriteOp<'_>) -> Option<OpTarget>;

    /// Apply a validated op to every row of its range.
    fn apply_op(&mut self, op: &WriteOp<'_>);
}

/// Check one op against its destination. Pure.
pub fn validate_op(op: &WriteOp<'_>, target: Option<OpTarget>) -> Result<(), WriteRejection> {
    let target = target.ok_or(WriteRejection::UnknownArchetype(op.archetype_id()))?;

    let column = target.column.ok_or(WriteRejection::MissingColumn {
        component: op.component_id,
        field: op.field_id,
    })?;

    let granted = target.granted.ok_or(WriteRejection::MissingAccessRule {
        component: op.component_id,
        field: op.field_id,
    })?;

    if !granted.contains(op.access_mode) {
        return Err(WriteRejection::AccessNotGranted {
            requested: op.access_mode.bits(),
            granted: granted.bits(),
        });
    }

    let EntityRange { begin, end, .. } = op.range;
    if !op.range.is_valid() {
        return Err(WriteRejection::MalformedRange { begin, end });
    }
    if !op.range.fits_within(target.entity_count) {
        return Err(WriteRejection::RangeOutOfBounds {
            end,
            len: target.entity_count,
        });
    }

    if op.element_type != column.element_type {
        return Err(WriteRejection::ElementTypeMismatch {
            op: op.element_type,
            column: column.element_type,
        });
    }
    if op.element_size != column.element_size {
        return Err(WriteRejection::ElementSizeMismatch {
            op: op.element_size,
            column: column.element_size,
        });
    }
    if op.stride < op.element_size {
        return Err(WriteRejection::StrideTooSmall {
            stride: op.stride,
            element_size: op.element_size,
        });
    }

    if op.data.is_empty() {
        return Err(WriteRejection::MissingPayload);
    }
    let needed = op.required_payload().unwrap_or(usize::MAX);
    if op.data.len() < needed {
        return Err(WriteRejection::PayloadTooShort {
            len: op.data.len(),
            needed,
        });
    }

    if op.reduction_op.is_reduction() {
        if !op.access_mode.contains(AccessMode::REDUCE) {
            return Err(WriteRejection::ReduceNotRequested);
        }
        if !column.element_type.is_reducible() {
            return Err(WriteRejection::NonReducibleType(column.element_type));
        }
    } else if !op.access_mode.contains(AccessMode::WRITE) {
        return Err(WriteRejection::WriteNotRequested);
    }

    Ok(())
}

/// Validate the whole buffer, then apply it in commit-key order.
pub(crate) fn run_commit<T: CommitTarget>(
    target: &mut T,
    buffer: &WriteBuffer<'_>,
    context: &mut CommitContext,
) -> StoreResult<CommitReport> {
    for (op_index, op) in buffer.iter().enumerate() {
        if let Err(reason) = validate_op(op, target.resolve(op)) {
            let err = StoreError::CommitRejected { op_index, reason };
            tracing::debug!(
                "Commit rejected (epoch {}, graph {}): {err}",
                context.epoch_id,
                context.graph_id
            );
            context.status = err.status();
            return Err(err);
        }
    }

    let mut report = CommitReport::default();
    for idx in buffer.sorted_order() {
        let op = &buffer.ops[idx];
        target.apply_op(op);
        report.applied_ops += 1;
        if op.reduction_op.is_reduction() {
            report.cells_reduced += op.range.count();
        } else {
            report.cells_written += op.range.count();
        }
    }

    tracing::debug!(
        "Committed {} ops (epoch {}, graph {})",
        report.applied_ops,
        context.epoch_id,
        context.graph_id
    );
    context.status = 0;
    Ok(report)
}

/// Apply the `i`-th element of a validated op to one cell.
pub(crate) fn apply_cell(op: &WriteOp<'_>, i: usize, cell: &mut [u8]) {
    let incoming = op.element(i);
    match op.reduction_op {
        ReductionOp::None => cell.copy_from_slice(incoming),
        reduction => reduce_cell(op.element_type, reduction, cell, incoming),
    }
}

trait ReduceScalar: Pod + Ord {
    fn wrapping_sum(self, other: Self) -> Self;
}

macro_rules! impl_reduce_scalar {
    ($($ty:ty),*) => {
        $(impl ReduceScalar for $ty {
            fn wrapping_sum(self, other: Self) -> Self {
                self.wrapping_add(other)
            }
        })*
    };
}

impl_reduce_scalar!(u32, i32, u64, i64);

fn reduce_cell(element_type: ElementType, op: ReductionOp, cell: &mut [u8], incoming: &[u8]) {
    match element_type {
        ElementType::U32 => reduce_typed::<u32>(op, cell, incoming),
        ElementType::I32 => reduce_typed::<i32>(op, cell, incoming),
        ElementType::U64 => reduce_typed::<u64>(op, cell, incoming),
        ElementType::I64 => reduce_typed::<i64>(op, cell, incoming),
        // Non-integer columns never pass validation.
        _ => {}
    }
}

fn reduce_typed<T: ReduceScalar>(op: ReductionOp, cell: &mut [u8], incoming: &[u8]) {
    let current: T = bytemuck::pod_read_unaligned(cell);
    let value: T = bytemuck::pod_read_unaligned(incoming);
    let combined = match op {
        ReductionOp::None => value,
        ReductionOp::Sum => current.wrapping_sum(value),
        ReductionOp::Min => current.min(value),
        ReductionOp::Max => current.max(value),
    };
    cell.copy_from_slice(bytemuck::bytes_of(&combined));
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARCH: ArchetypeId = ArchetypeId::from_raw(5);
    const COMP: ComponentId = ComponentId::from_raw(1);
    const FIELD: FieldId = FieldId::from_raw(1);

    fn target(len: usize, ty: ElementType, granted: AccessMode) -> Option<OpTarget> {
        Some(OpTarget {
            entity_count: len,
            column: Some(ColumnShape {
                element_type: ty,
                element_size: ty.size(),
            }),
            granted: Some(granted),
        })
    }

    fn key(task: u64) -> CommitKey {
        CommitKey::new(0, task, 0)
    }

    #[test]
    fn test_commit_key_ordering() {
        assert!(CommitKey::new(0, 9, 9) < CommitKey::new(1, 0, 0));
        assert!(CommitKey::new(1, 1, 9) < CommitKey::new(1, 2, 0));
        assert!(CommitKey::new(1, 2, 0) < CommitKey::new(1, 2, 1));
    }

    #[test]
    fn test_sorted_order_is_stable() {
        let data = [0u8; 4];
        let range = EntityRange::single(ARCH, 0);
        let buffer: WriteBuffer<'_> = [2, 1, 2, 1]
            .into_iter()
            .map(|task| {
                WriteOp::write(key(task), range, COMP, FIELD, ElementType::U32, &data)
            })
            .collect();

        assert_eq!(buffer.sorted_order(), vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_validate_accepts_plain_write() {
        let data = 7u32.to_ne_bytes();
        let op = WriteOp::write(
            key(0),
            EntityRange::single(ARCH, 1),
            COMP,
            FIELD,
            ElementType::U32,
            &data,
        );
        assert_eq!(
            validate_op(&op, target(2, ElementType::U32, AccessMode::READWRITE)),
            Ok(())
        );
    }

    #[test]
    fn test_validate_rejections() {
        let data = [0u8; 16];
        let range = EntityRange::new(ARCH, 0, 2);
        let op = WriteOp::write(key(0), range, COMP, FIELD, ElementType::U32, &data);

        assert_eq!(
            validate_op(&op, None),
            Err(WriteRejection::UnknownArchetype(ARCH))
        );

        let no_column = Some(OpTarget {
            entity_count: 2,
            column: None,
            granted: Some(AccessMode::WRITE),
        });
        assert!(matches!(
            validate_op(&op, no_column),
            Err(WriteRejection::MissingColumn { .. })
        ));

        let no_rule = Some(OpTarget {
            entity_count: 2,
            column: Some(ColumnShape {
                element_type: ElementType::U32,
                element_size: 4,
            }),
            granted: None,
        });
        assert!(matches!(
            validate_op(&op, no_rule),
            Err(WriteRejection::MissingAccessRule { .. })
        ));

        assert!(matches!(
            validate_op(&op, target(2, ElementType::U32, AccessMode::READ)),
            Err(WriteRejection::AccessNotGranted { .. })
        ));
        assert!(matches!(
            validate_op(&op, target(1, ElementType::U32, AccessMode::WRITE)),
            Err(WriteRejection::RangeOutOfBounds { end: 2, len: 1 })
        ));
        assert!(matches!(
            validate_op(&op, target(2, ElementType::I32, AccessMode::WRITE)),
            Err(WriteRejection::ElementTypeMismatch { .. })
        ));

        let backwards = WriteOp::write(
            key(0),
            EntityRange::new(ARCH, 2, 1),
            COMP,
            FIELD,
            ElementType::U32,
            &data,
        );
        assert_eq!(
            validate_op(&backwards, target(4, ElementType::U32, AccessMode::WRITE)),
            Err(WriteRejection::MalformedRange { begin: 2, end: 1 })
        );

        let narrow = op.with_stride(2);
        assert!(matches!(
            validate_op(&narrow, target(2, ElementType::U32, AccessMode::WRITE)),
            Err(WriteRejection::StrideTooSmall { .. })
        ));

        let empty = WriteOp::write(key(0), range, COMP, FIELD, ElementType::U32, &[]);
        assert_eq!(
            validate_op(&empty, target(2, ElementType::U32, AccessMode::WRITE)),
            Err(WriteRejection::MissingPayload)
        );

        let short = WriteOp::write(key(0), range, COMP, FIELD, ElementType::U32, &data[..6]);
        assert_eq!(
            validate_op(&short, target(2, ElementType::U32, AccessMode::WRITE)),
            Err(WriteRejection::PayloadTooShort { len: 6, needed: 8 })
        );
    }

    #[test]
    fn test_validate_write_kind_modes() {
        let data = [0u8; 8];
        let range = EntityRange::single(ARCH, 0);

        let plain_without_write =
            WriteOp::write(key(0), range, COMP, FIELD, ElementType::U32, &data)
                .with_access(AccessMode::READ);
        assert_eq!(
            validate_op(
                &plain_without_write,
                target(1, ElementType::U32, AccessMode::READWRITE)
            ),
            Err(WriteRejection::WriteNotRequested)
        );

        let reduce_without_reduce = WriteOp::reduce(
            key(0),
            range,
            COMP,
            FIELD,
            ElementType::U32,
            ReductionOp::Sum,
            &data,
        )
        .with_access(AccessMode::WRITE);
        assert_eq!(
            validate_op(
                &reduce_without_reduce,
                target(1, ElementType::U32, AccessMode::WRITE)
            ),
            Err(WriteRejection::ReduceNotRequested)
        );

        let fixed = WriteOp::reduce(
            key(0),
            range,
            COMP,
            FIELD,
            ElementType::FixedQ16,
            ReductionOp::Max,
            &data,
        );
        assert_eq!(
            validate_op(&fixed, target(1, ElementType::FixedQ16, AccessMode::REDUCE)),
            Err(WriteRejection::NonReducibleType(ElementType::FixedQ16))
        );

        let small = WriteOp::reduce(
            key(0),
            range,
            COMP,
            FIELD,
            ElementType::U16,
            ReductionOp::Sum,
            &data,
        );
        assert_eq!(
            validate_op(&small, target(1, ElementType::U16, AccessMode::REDUCE)),
            Err(WriteRejection::NonReducibleType(ElementType::U16))
        );
    }

    #[test]
    fn test_reduce_cell_ops() {
        let mut cell = 5i64.to_ne_bytes();
        reduce_cell(
            ElementType::I64,
            ReductionOp::Sum,
            &mut cell,
            &(-8i64).to_ne_bytes(),
        );
        assert_eq!(i64::from_ne_bytes(cell), -3);
        reduce_cell(
            ElementType::I64,
            ReductionOp::Min,
            &mut cell,
            &(-10i64).to_ne_bytes(),
        );
        assert_eq!(i64::from_ne_bytes(cell), -10);
        reduce_cell(
            ElementType::I64,
            ReductionOp::Max,
            &mut cell,
            &4i64.to_ne_bytes(),
        );
        assert_eq!(i64::from_ne_bytes(cell), 4);
    }

    #[test]
    fn test_sum_wraps() {
        let mut cell = u32::MAX.to_ne_bytes();
        reduce_cell(
            ElementType::U32,
            ReductionOp::Sum,
            &mut cell,
            &2u32.to_ne_bytes(),
        );
        assert_eq!(u32::from_ne_bytes(cell), 1);
    }

    #[test]
    fn test_reduce_cell_ignores_non_integer_columns() {
        let mut cell = 0x0001_8000u32.to_ne_bytes();
        reduce_cell(
            ElementType::FixedQ16,
            ReductionOp::Sum,
            &mut cell,
            &1u32.to_ne_bytes(),
        );
        assert_eq!(u32::from_ne_bytes(cell), 0x0001_8000);
    }

    #[test]
    fn test_apply_cell_honors_stride() {
        let payload: [u32; 4] = [1, 99, 2, 99];
        let op = WriteOp::write_slice(
            key(0),
            EntityRange::new(ARCH, 0, 2),
            COMP,
            FIELD,
            ElementType::U32,
            &payload,
        )
        .with_stride(8);

        let mut cell = [0u8; 4];
        apply_cell(&op, 1, &mut cell);
        assert_eq!(u32::from_ne_bytes(cell), 2);
    }

    #[test]
    fn test_reduction_op_raw() {
        for op in [ReductionOp::None, ReductionOp::Sum, ReductionOp::Min, ReductionOp::Max] {
            assert_eq!(ReductionOp::from_raw(op.as_raw()), Some(op));
        }
        assert_eq!(ReductionOp::from_raw(4), None);
    }
}
