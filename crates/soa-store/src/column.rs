//! Column storage - one contiguous byte buffer per (component, field).
//!
//! Each column stores a single field for every entity of an archetype,
//! `stride` bytes per row, so a whole field can be walked linearly.
//! Capacity is explicit and kept in lockstep with the archetype's entity
//! index; growth is grow-and-copy through a fallible reservation so a
//! failed allocation leaves the existing rows untouched.

use crate::{
    component::{ComponentId, ElementType, FieldDef, FieldId},
    error::{StoreError, StoreResult},
};

/// Compute the capacity to grow to: double the current capacity, but never
/// less than `requested`. Starting from zero this snaps straight to
/// `requested`.
pub fn next_capacity(current: usize, requested: usize) -> StoreResult<usize> {
    if requested <= current {
        return Ok(current);
    }
    let doubled = current
        .checked_mul(2)
        .ok_or(StoreError::CapacityOverflow { requested })?;
    Ok(doubled.max(requested))
}

/// A column of one field's values.
#[derive(Debug)]
pub struct Column {
    component_id: ComponentId,
    field: FieldDef,
    /// Number of valid rows.
    len: usize,
    /// Allocated rows; `data.len() == capacity * stride`.
    capacity: usize,
    data: Vec<u8>,
}

impl Column {
    /// Create an empty column with no allocation.
    #[must_use]
    pub const fn new(component_id: ComponentId, field: FieldDef) -> Self {
        Self {
            component_id,
            field,
            len: 0,
            capacity: 0,
            data: Vec::new(),
        }
    }

    #[must_use]
    pub const fn component_id(&self) -> ComponentId {
        self.component_id
    }

    #[must_use]
    pub const fn field_id(&self) -> FieldId {
        self.field.id
    }

    #[must_use]
    pub const fn element_type(&self) -> ElementType {
        self.field.element_type
    }

    #[must_use]
    pub const fn element_size(&self) -> usize {
        self.field.element_size
    }

    #[must_use]
    pub const fn stride(&self) -> usize {
        self.field.stride
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether this column stores `(component, field)`.
    #[must_use]
    pub fn matches(&self, component_id: ComponentId, field_id: FieldId) -> bool {
        self.component_id == component_id && self.field.id == field_id
    }

    /// Grow the buffer to exactly `capacity` rows. Never shrinks.
    pub fn set_capacity(&mut self, capacity: usize) -> StoreResult<()> {
        if capacity <= self.capacity {
            return Ok(());
        }

        let overflow = StoreError::CapacityOverflow {
            requested: capacity,
        };
        let bytes = capacity
            .checked_mul(self.field.stride)
            .ok_or_else(|| overflow.clone())?;
        self.data
            .try_reserve_exact(bytes - self.data.len())
            .map_err(|_| overflow)?;
        self.data.resize(bytes, 0);
        self.capacity = capacity;
        Ok(())
    }

    /// Append a zero-filled row. Capacity must already be available.
    pub fn push_zeroed(&mut self) {
        debug_assert!(self.len < self.capacity, "push without reserved capacity");
        let start = self.len * self.field.stride;
        self.data[start..start + self.field.stride].fill(0);
        self.len += 1;
    }

    /// Remove a row, shifting every later row down by one.
    ///
    /// Relative order of the remaining rows is preserved.
    pub fn remove_row(&mut self, row: usize) {
        debug_assert!(row < self.len, "Index out of bounds in remove_row");
        let stride = self.field.stride;
        self.data
            .copy_within((row + 1) * stride..self.len * stride, row * stride);
        self.len -= 1;
    }

    /// Element bytes of a row, or `None` past `len`.
    #[must_use]
    pub fn element(&self, row: usize) -> Option<&[u8]> {
        if row >= self.len {
            return None;
        }
        let start = row * self.field.stride;
        Some(&self.data[start..start + self.field.element_size])
    }

    /// Mutable element bytes of a row, or `None` past `len`.
    #[must_use]
    pub fn element_mut(&mut self, row: usize) -> Option<&mut [u8]> {
        if row >= self.len {
            return None;
        }
        let start = row * self.field.stride;
        Some(&mut self.data[start..start + self.field.element_size])
    }

    /// Raw bytes of all valid rows, including stride padding.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len * self.field.stride]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_column() -> Column {
        Column::new(
            ComponentId::from_raw(1),
            FieldDef::new(FieldId::from_raw(1), ElementType::U32),
        )
    }

    fn write_u32(col: &mut Column, row: usize, value: u32) {
        col.element_mut(row)
            .unwrap()
            .copy_from_slice(&value.to_ne_bytes());
    }

    fn read_u32(col: &Column, row: usize) -> u32 {
        bytemuck::pod_read_unaligned(col.element(row).unwrap())
    }

    #[test]
    fn test_next_capacity() {
        assert_eq!(next_capacity(0, 3).unwrap(), 3);
        assert_eq!(next_capacity(3, 4).unwrap(), 6);
        assert_eq!(next_capacity(4, 20).unwrap(), 20);
        assert_eq!(next_capacity(8, 8).unwrap(), 8);
        assert!(next_capacity(usize::MAX, usize::MAX - 1).is_ok());
        assert!(next_capacity(usize::MAX / 2 + 1, usize::MAX).is_err());
    }

    #[test]
    fn test_column_push_read() {
        let mut col = u32_column();
        col.set_capacity(2).unwrap();
        col.push_zeroed();
        col.push_zeroed();
        write_u32(&mut col, 1, 77);

        assert_eq!(col.len(), 2);
        assert_eq!(read_u32(&col, 0), 0);
        assert_eq!(read_u32(&col, 1), 77);
        assert!(col.element(2).is_none());
    }

    #[test]
    fn test_column_remove_shifts() {
        let mut col = u32_column();
        col.set_capacity(3).unwrap();
        for (row, value) in [10, 20, 30].into_iter().enumerate() {
            col.push_zeroed();
            write_u32(&mut col, row, value);
        }

        col.remove_row(0);

        assert_eq!(col.len(), 2);
        assert_eq!(read_u32(&col, 0), 20);
        assert_eq!(read_u32(&col, 1), 30);
    }

    #[test]
    fn test_push_rezeroes_stale_row() {
        let mut col = u32_column();
        col.set_capacity(2).unwrap();
        col.push_zeroed();
        col.push_zeroed();
        write_u32(&mut col, 1, 5);
        col.remove_row(1);
        col.push_zeroed();

        assert_eq!(read_u32(&col, 1), 0);
    }

    #[test]
    fn test_padded_stride() {
        let mut col = Column::new(
            ComponentId::from_raw(1),
            FieldDef::new(FieldId::from_raw(1), ElementType::U16).with_stride(6),
        );
        col.set_capacity(2).unwrap();
        col.push_zeroed();
        col.push_zeroed();

        assert_eq!(col.element(1).unwrap().len(), 2);
        assert_eq!(col.as_bytes().len(), 12);
    }

    #[test]
    fn test_set_capacity_never_shrinks() {
        let mut col = u32_column();
        col.set_capacity(8).unwrap();
        col.set_capacity(2).unwrap();
        assert_eq!(col.capacity(), 8);
    }
}
