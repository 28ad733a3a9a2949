//! The packed, typed, resizable `array.array`.
//!
//! A [`TypedArray`] is a [`TypeCode`] plus a packed byte buffer. Elements are
//! packed on every write and unpacked on every read; nothing is boxed. All
//! length changes go through one resize path that enforces the export guard
//! and CPython's over-allocation policy.

mod buffer;
mod export;
mod format;
mod pack;
mod reduce;
mod slice;

use std::{
    cmp::Ordering,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering as AtomicOrdering},
    },
};

use buffer::PackedBuffer;
pub use export::{ArrayRef, BufferView, NativeExport};
pub use format::{ElementKind, MachineFormat, TYPECODES, TypeCode};
use pack::decode_code_point;
pub use pack::{ElementBytes, check_element, pack_element, unpack_element};
pub use reduce::{ReduceState, array_reconstructor};
pub use slice::{SliceIndices, SliceSpec};

use crate::{
    exception::{ExcType, RunError, RunResult},
    identity::{numeric_cmp, numeric_eq, py_eq},
    interp::Interp,
    io::FileLike,
    object::for_each_item,
    resource::LARGE_RESULT_THRESHOLD,
    types::Range,
    value::{Value, string_repr_fmt},
};

/// Block size used by `tofile`.
const FILE_BLOCK_SIZE: usize = 64 * 1024;

/// Rich comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Whether an ordering between the operands satisfies this operator.
    #[must_use]
    pub fn matches(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering.is_eq(),
            Self::Ne => ordering.is_ne(),
            Self::Lt => ordering.is_lt(),
            Self::Le => ordering.is_le(),
            Self::Gt => ordering.is_gt(),
            Self::Ge => ordering.is_ge(),
        }
    }

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// A homogeneous, packed sequence of machine values.
///
/// The export counter is shared with every outstanding [`BufferView`] and
/// [`NativeExport`]; while it is non-zero the array refuses any operation
/// that would change its length or move its storage.
#[derive(Debug)]
pub struct TypedArray {
    typecode: TypeCode,
    buffer: PackedBuffer,
    exports: Arc<AtomicUsize>,
}

impl TypedArray {
    /// Creates an empty array.
    #[must_use]
    pub fn new(typecode: TypeCode) -> Self {
        Self {
            typecode,
            buffer: PackedBuffer::new(),
            exports: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wraps bytes already packed for `typecode`; the caller checked the length.
    fn from_packed(typecode: TypeCode, bytes: Vec<u8>) -> Self {
        Self {
            typecode,
            buffer: PackedBuffer::from_vec(bytes),
            exports: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// `array(typecode[, initializer])`.
    ///
    /// The initializer may be a `str` (only for `'u'`), `bytes`, a `range`,
    /// another array (copied element by element so every value is range
    /// checked), or any iterable. The first bad element aborts construction.
    pub fn construct(typecode: &str, initializer: Option<&Value>, interp: &mut Interp) -> RunResult<Self> {
        Self::with_initializer(TypeCode::for_array(typecode)?, initializer, interp)
    }

    /// [`construct`](Self::construct) with an already parsed typecode.
    pub fn with_initializer(typecode: TypeCode, initializer: Option<&Value>, interp: &mut Interp) -> RunResult<Self> {
        let mut array = Self::new(typecode);
        let Some(initializer) = initializer else {
            return Ok(array);
        };
        match initializer {
            Value::Str(text) => {
                if typecode != TypeCode::Unicode {
                    return Err(ExcType::type_error(format!(
                        "cannot use a str to initialize an array with typecode '{}'",
                        typecode.as_char()
                    )));
                }
                array.fromunicode(text, interp)?;
            }
            Value::Bytes(bytes) => array.frombytes(bytes, interp)?,
            Value::Range(range) => array.fill_from_range(*range, interp)?,
            Value::Array(other) => {
                let items = {
                    let other = other
                        .try_borrow()
                        .map_err(|_| RunError::internal("array initializer is mutably borrowed"))?;
                    if other.typecode == TypeCode::Unicode && typecode != TypeCode::Unicode {
                        return Err(ExcType::type_error(format!(
                            "cannot use a unicode array to initialize an array with typecode '{}'",
                            typecode.as_char()
                        )));
                    }
                    other.tolist()?
                };
                for item in &items {
                    array.append(item, interp)?;
                }
            }
            other => for_each_item(other, interp, |item, interp| array.append(&item, interp))?,
        }
        Ok(array)
    }

    /// Preallocates exactly `range.len()` elements and packs them in order.
    fn fill_from_range(&mut self, range: Range, interp: &mut Interp) -> RunResult<()> {
        let count = usize::try_from(range.len()).map_err(|_| ExcType::memory_error())?;
        let nbytes = self.byte_len(count)?;
        if nbytes > LARGE_RESULT_THRESHOLD {
            interp.tracker_mut().check_large_result(nbytes)?;
        }
        self.buffer.reallocate(nbytes, interp)?;
        let isz = self.itemsize();
        for (i, value) in range.iter().enumerate() {
            let packed = pack_element(self.typecode, &Value::from(value), interp)?;
            self.buffer.set_len((i + 1) * isz);
            self.buffer.write(i * isz, &packed);
        }
        interp.tracer_mut().on_resize(0, count);
        Ok(())
    }

    /// Allocates a zero-filled array of exactly `nbytes` for the caller to overwrite.
    fn allocate_packed(typecode: TypeCode, nbytes: usize, interp: &mut Interp) -> RunResult<Self> {
        if nbytes > LARGE_RESULT_THRESHOLD {
            interp.tracker_mut().check_large_result(nbytes)?;
        }
        let mut array = Self::new(typecode);
        array.buffer.reallocate(nbytes, interp)?;
        array.buffer.set_len(nbytes);
        Ok(array)
    }

    #[must_use]
    pub fn typecode(&self) -> TypeCode {
        self.typecode
    }

    #[must_use]
    pub fn itemsize(&self) -> usize {
        self.typecode.itemsize()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len_bytes() / self.itemsize()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.len_bytes() == 0
    }

    /// Number of live buffer views and native exports.
    #[must_use]
    pub fn export_count(&self) -> usize {
        self.exports.load(AtomicOrdering::Acquire)
    }

    fn exported(&self) -> bool {
        self.export_count() > 0
    }

    fn signed_len(&self) -> i64 {
        i64::try_from(self.len()).unwrap_or(i64::MAX)
    }

    /// Bytes needed for `count` elements; `MemoryError` if that isn't addressable.
    fn byte_len(&self, count: usize) -> RunResult<usize> {
        count
            .checked_mul(self.itemsize())
            .filter(|&nbytes| nbytes <= isize::MAX.unsigned_abs())
            .ok_or_else(ExcType::memory_error)
    }

    /// Normalizes a possibly negative index into `[0, len)`.
    fn normalize_index(&self, index: i64) -> Option<usize> {
        let index = if index < 0 { index.checked_add(self.signed_len())? } else { index };
        usize::try_from(index).ok().filter(|&i| i < self.len())
    }

    // --- length management ---

    /// Sets the length to `new_len`, reallocating per the growth policy.
    ///
    /// The only path that changes the length of a live array; refuses any
    /// change while exports are outstanding.
    fn resize(&mut self, new_len: usize, interp: &mut Interp) -> RunResult<()> {
        let len = self.len();
        if new_len != len && self.exported() {
            return Err(ExcType::buffer_error_exported());
        }
        self.reserve_for(len, new_len, interp)?;
        self.buffer.set_len(new_len * self.itemsize());
        if new_len != len {
            interp.tracer_mut().on_resize(len, new_len);
        }
        Ok(())
    }

    /// CPython's `array_resize` allocation policy.
    ///
    /// Keeps the current allocation when it fits and the array isn't
    /// shrinking by 16 or more; otherwise reallocates to
    /// `new_len + new_len / 16 + (3 or 7)` elements.
    fn reserve_for(&mut self, old_len: usize, new_len: usize, interp: &mut Interp) -> RunResult<()> {
        let isz = self.itemsize();
        let allocated = self.buffer.capacity_bytes() / isz;
        if allocated >= new_len && old_len < new_len.saturating_add(16) {
            return Ok(());
        }
        if self.exported() {
            return Err(ExcType::buffer_error_exported());
        }
        if new_len == 0 {
            return self.buffer.reallocate(0, interp);
        }
        let extra = (new_len >> 4) + if old_len < 8 { 3 } else { 7 };
        let new_alloc = new_len.checked_add(extra).ok_or_else(ExcType::memory_error)?;
        let nbytes = self.byte_len(new_alloc)?;
        self.buffer.reallocate(nbytes, interp)
    }

    /// Grows capacity to hold at least `new_len` elements without changing the length.
    pub fn ensure_capacity(&mut self, new_len: usize, interp: &mut Interp) -> RunResult<()> {
        if self.buffer.capacity_bytes() / self.itemsize() >= new_len {
            return Ok(());
        }
        let len = self.len();
        self.reserve_for(len, new_len, interp)
    }

    /// Sets the length within the current capacity.
    ///
    /// Slots exposed by growing hold whatever bytes the allocation held and
    /// must be written before the array is observed again.
    pub fn set_length(&mut self, new_len: usize, interp: &mut Interp) -> RunResult<()> {
        let len = self.len();
        if new_len == len {
            return Ok(());
        }
        if self.exported() {
            return Err(ExcType::buffer_error_exported());
        }
        let nbytes = self.byte_len(new_len)?;
        if nbytes > self.buffer.capacity_bytes() {
            return Err(RunError::internal("set_length beyond capacity"));
        }
        self.buffer.set_len(nbytes);
        interp.tracer_mut().on_resize(len, new_len);
        Ok(())
    }

    /// Opens a hole of `count` elements at `from`, moving the tail up.
    pub fn shift(&mut self, from: usize, count: usize, interp: &mut Interp) -> RunResult<()> {
        let len = self.len();
        if from > len {
            return Err(ExcType::index_error("array index out of range"));
        }
        if count == 0 {
            return Ok(());
        }
        if self.exported() {
            return Err(ExcType::buffer_error_exported());
        }
        let new_len = len.checked_add(count).ok_or_else(ExcType::memory_error)?;
        self.byte_len(new_len)?;
        self.reserve_for(len, new_len, interp)?;
        let isz = self.itemsize();
        self.buffer.shift(from * isz, count * isz);
        interp.tracer_mut().on_resize(len, new_len);
        Ok(())
    }

    /// Removes `count` elements starting at `from`, closing the hole.
    pub fn delete_range(&mut self, from: usize, count: usize, interp: &mut Interp) -> RunResult<()> {
        let len = self.len();
        if from.checked_add(count).is_none_or(|end| end > len) {
            return Err(ExcType::index_error("array index out of range"));
        }
        if count == 0 {
            return Ok(());
        }
        if self.exported() {
            return Err(ExcType::buffer_error_exported());
        }
        let isz = self.itemsize();
        self.buffer.delete_range(from * isz, count * isz);
        let new_len = len - count;
        self.reserve_for(len, new_len, interp)?;
        interp.tracer_mut().on_resize(len, new_len);
        Ok(())
    }

    // --- elements ---

    fn item_bytes(&self, index: usize) -> &[u8] {
        let isz = self.itemsize();
        &self.buffer.as_bytes()[index * isz..(index + 1) * isz]
    }

    fn item(&self, index: usize) -> RunResult<Value> {
        unpack_element(self.typecode, self.item_bytes(index))
    }

    /// Element at a non-negative index.
    pub fn get(&self, index: usize) -> RunResult<Value> {
        if index >= self.len() {
            return Err(ExcType::index_error("array index out of range"));
        }
        self.item(index)
    }

    /// `a[i]`, negative indices counting from the end.
    pub fn getitem(&self, index: i64) -> RunResult<Value> {
        let index = self
            .normalize_index(index)
            .ok_or_else(|| ExcType::index_error("array index out of range"))?;
        self.item(index)
    }

    /// Overwrites the element at a non-negative index.
    ///
    /// The value is fully checked before any byte is written.
    pub fn set(&mut self, index: usize, value: &Value, interp: &mut Interp) -> RunResult<()> {
        if index >= self.len() {
            return Err(ExcType::index_error("array assignment index out of range"));
        }
        let packed = pack_element(self.typecode, value, interp)?;
        self.buffer.write(index * self.itemsize(), &packed);
        Ok(())
    }

    /// `a[i] = value`.
    pub fn setitem(&mut self, index: i64, value: &Value, interp: &mut Interp) -> RunResult<()> {
        let index = self
            .normalize_index(index)
            .ok_or_else(|| ExcType::index_error("array assignment index out of range"))?;
        self.set(index, value, interp)
    }

    /// `del a[i]`.
    pub fn delete(&mut self, index: i64, interp: &mut Interp) -> RunResult<()> {
        let index = self
            .normalize_index(index)
            .ok_or_else(|| ExcType::index_error("array assignment index out of range"))?;
        self.delete_range(index, 1, interp)
    }

    pub fn append(&mut self, value: &Value, interp: &mut Interp) -> RunResult<()> {
        let packed = pack_element(self.typecode, value, interp)?;
        let len = self.len();
        self.resize(len + 1, interp)?;
        self.buffer.write(len * self.itemsize(), &packed);
        Ok(())
    }

    /// Inserts before `index`, clamped into `[0, len]`.
    ///
    /// The value is checked before any memory moves.
    pub fn insert(&mut self, index: i64, value: &Value, interp: &mut Interp) -> RunResult<()> {
        let packed = pack_element(self.typecode, value, interp)?;
        let len = self.len();
        let position = if index < 0 {
            index.saturating_add(self.signed_len()).max(0)
        } else {
            index
        };
        let position = usize::try_from(position).map_or(len, |p| p.min(len));
        self.shift(position, 1, interp)?;
        self.buffer.write(position * self.itemsize(), &packed);
        Ok(())
    }

    /// Appends every item of `other`.
    ///
    /// An array of the same typecode is copied in bulk (a snapshot is taken
    /// when it is this array). Any other iterable is appended item by item,
    /// and a failure part way leaves the earlier items appended.
    pub fn extend(&mut self, other: &Value, interp: &mut Interp) -> RunResult<()> {
        if let Value::Array(other) = other {
            let bytes = self.same_kind_bytes(other, || ExcType::type_error("can only extend with array of same kind"))?;
            return self.extend_bytes(&bytes, interp);
        }
        for_each_item(other, interp, |item, interp| self.append(&item, interp))
    }

    /// Copies another array's packed bytes, or this array's own when `other` aliases it.
    fn same_kind_bytes(&self, other: &ArrayRef, mismatch: impl FnOnce() -> RunError) -> RunResult<Vec<u8>> {
        if other.is(self) {
            return Ok(self.buffer.as_bytes().to_vec());
        }
        let other = other
            .try_borrow()
            .map_err(|_| RunError::internal("array operand is mutably borrowed"))?;
        if other.typecode != self.typecode {
            return Err(mismatch());
        }
        Ok(other.buffer.as_bytes().to_vec())
    }

    /// Appends whole packed elements.
    fn extend_bytes(&mut self, bytes: &[u8], interp: &mut Interp) -> RunResult<()> {
        let count = bytes.len() / self.itemsize();
        if count == 0 {
            return Ok(());
        }
        let len = self.len();
        let new_len = len.checked_add(count).ok_or_else(ExcType::memory_error)?;
        self.byte_len(new_len)?;
        self.resize(new_len, interp)?;
        self.buffer.write(len * self.itemsize(), bytes);
        Ok(())
    }

    /// Removes the first element equal to `value`.
    pub fn remove(&mut self, value: &Value, interp: &mut Interp) -> RunResult<()> {
        for i in 0..self.len() {
            if py_eq(&self.item(i)?, value, interp)? {
                return self.delete_range(i, 1, interp);
            }
        }
        Err(ExcType::value_error("array.remove(x): x not in array"))
    }

    /// Removes and returns the element at `index` (`-1` for the last).
    pub fn pop(&mut self, index: i64, interp: &mut Interp) -> RunResult<Value> {
        if self.is_empty() {
            return Err(ExcType::index_error("pop from empty array"));
        }
        let index = self
            .normalize_index(index)
            .ok_or_else(|| ExcType::index_error("pop index out of range"))?;
        let value = self.item(index)?;
        self.delete_range(index, 1, interp)?;
        Ok(value)
    }

    /// Position of the first element equal to `value` within `[start, stop)`.
    ///
    /// Bounds are clamped like slice bounds.
    pub fn index(&self, value: &Value, start: Option<i64>, stop: Option<i64>, interp: &mut Interp) -> RunResult<usize> {
        let len = self.len();
        let clamp = |bound: i64| {
            let bound = if bound < 0 { bound.saturating_add(self.signed_len()).max(0) } else { bound };
            usize::try_from(bound).map_or(len, |b| b.min(len))
        };
        let start = start.map_or(0, clamp);
        let stop = stop.map_or(len, clamp);
        for i in start..stop {
            if py_eq(&self.item(i)?, value, interp)? {
                return Ok(i);
            }
        }
        Err(ExcType::value_error("array.index(x): x not in array"))
    }

    /// Number of elements equal to `value`.
    pub fn count(&self, value: &Value, interp: &mut Interp) -> RunResult<usize> {
        let mut count = 0;
        for i in 0..self.len() {
            if py_eq(&self.item(i)?, value, interp)? {
                count += 1;
            }
        }
        Ok(count)
    }

    /// `value in a`.
    pub fn contains(&self, value: &Value, interp: &mut Interp) -> RunResult<bool> {
        for i in 0..self.len() {
            if py_eq(&self.item(i)?, value, interp)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Reverses the elements in place.
    pub fn reverse(&mut self) {
        let (len, isz) = (self.len(), self.itemsize());
        let bytes = self.buffer.as_bytes_mut();
        for i in 0..len / 2 {
            let j = len - 1 - i;
            for k in 0..isz {
                bytes.swap(i * isz + k, j * isz + k);
            }
        }
    }

    /// Reverses the bytes of every element; a no-op for 1-byte formats.
    pub fn byteswap(&mut self) {
        let isz = self.itemsize();
        if isz == 1 {
            return;
        }
        for element in self.buffer.as_bytes_mut().chunks_exact_mut(isz) {
            element.reverse();
        }
    }

    // --- slices ---

    /// `a[slice]` as a new array.
    pub fn get_slice(&self, spec: &SliceSpec, interp: &mut Interp) -> RunResult<Self> {
        let indices = spec.indices(self.len())?;
        let isz = self.itemsize();
        let mut out = Self::allocate_packed(self.typecode, indices.len * isz, interp)?;
        if indices.step == 1 {
            let start = usize::try_from(indices.start).unwrap_or(0) * isz;
            out.buffer.write(0, &self.buffer.as_bytes()[start..start + indices.len * isz]);
        } else {
            for (i, position) in indices.positions().enumerate() {
                out.buffer.write(i * isz, self.item_bytes(position));
            }
        }
        Ok(out)
    }

    /// `a[slice] = replacement`, or `del a[slice]` when `replacement` is `None`.
    ///
    /// The replacement must be an array of the same typecode. Contiguous
    /// slices may change length; extended slices must match it exactly,
    /// except that an empty replacement deletes the selected elements.
    pub fn set_slice(&mut self, spec: &SliceSpec, replacement: Option<&Value>, interp: &mut Interp) -> RunResult<()> {
        let source = match replacement {
            None => Vec::new(),
            Some(Value::Array(other)) => self.same_kind_bytes(other, ExcType::bad_argument_type)?,
            Some(other) => return Err(ExcType::slice_assign_not_array(other.type_name())),
        };
        let isz = self.itemsize();
        let needed = source.len() / isz;
        let len = self.len();
        let indices = spec.indices(len)?;
        let slice_len = indices.len;

        // Fail before moving anything if the length would change.
        if slice_len != needed && self.exported() {
            return Err(ExcType::buffer_error_exported());
        }

        if indices.step == 1 {
            let start = usize::try_from(indices.start).unwrap_or(0);
            let stop = start + slice_len;
            let tail = len - stop;
            if slice_len > needed {
                self.buffer.move_within(stop * isz, tail * isz, (start + needed) * isz);
                self.resize(len - slice_len + needed, interp)?;
            } else if slice_len < needed {
                let new_len = (len - slice_len).checked_add(needed).ok_or_else(ExcType::memory_error)?;
                self.byte_len(new_len)?;
                self.resize(new_len, interp)?;
                self.buffer.move_within(stop * isz, tail * isz, (start + needed) * isz);
            }
            self.buffer.write(start * isz, &source);
            return Ok(());
        }

        if needed == 0 {
            return self.delete_extended(indices, interp);
        }
        if needed != slice_len {
            return Err(ExcType::extended_slice_size_mismatch(needed, slice_len));
        }
        for (i, position) in indices.positions().enumerate() {
            self.buffer.write(position * isz, &source[i * isz..(i + 1) * isz]);
        }
        Ok(())
    }

    /// `del a[slice]`.
    pub fn delete_slice(&mut self, spec: &SliceSpec, interp: &mut Interp) -> RunResult<()> {
        self.set_slice(spec, None, interp)
    }

    /// Deletes an extended slice in one upward pass, compacting the gaps.
    fn delete_extended(&mut self, indices: SliceIndices, interp: &mut Interp) -> RunResult<()> {
        let count = indices.len;
        if count == 0 {
            return Ok(());
        }
        let (len, isz) = (self.len(), self.itemsize());
        let step = usize::try_from(indices.step.unsigned_abs()).unwrap_or(usize::MAX);
        let lowest = if indices.step < 0 {
            indices.positions().last().unwrap_or(0)
        } else {
            usize::try_from(indices.start).unwrap_or(0)
        };
        for i in 0..count {
            let cur = lowest + i * step;
            // Elements strictly between this deleted slot and the next one.
            let keep = if cur.saturating_add(step) >= len { len - cur - 1 } else { step - 1 };
            self.buffer.move_within((cur + 1) * isz, keep * isz, (cur - i) * isz);
        }
        let cur = lowest.saturating_add(count.saturating_mul(step));
        if cur < len {
            self.buffer.move_within(cur * isz, (len - cur) * isz, (cur - count) * isz);
        }
        self.resize(len - count, interp)
    }

    // --- sequence arithmetic ---

    /// `a + b` for two arrays of the same typecode.
    pub fn concat(&self, other: &Self, interp: &mut Interp) -> RunResult<Self> {
        if other.typecode != self.typecode {
            return Err(ExcType::bad_argument_type());
        }
        let (left, right) = (self.buffer.as_bytes(), other.buffer.as_bytes());
        let total = left
            .len()
            .checked_add(right.len())
            .filter(|&n| n <= isize::MAX.unsigned_abs())
            .ok_or_else(ExcType::memory_error)?;
        let mut out = Self::allocate_packed(self.typecode, total, interp)?;
        out.buffer.write(0, left);
        out.buffer.write(left.len(), right);
        Ok(out)
    }

    /// `a + other`, where `other` may be any value.
    pub fn add(&self, other: &Value, interp: &mut Interp) -> RunResult<Self> {
        let Value::Array(other) = other else {
            return Err(ExcType::type_error(format!(
                "can only append array (not \"{}\") to array",
                other.type_name()
            )));
        };
        if other.is(self) {
            return self.concat(self, interp);
        }
        let other = other
            .try_borrow()
            .map_err(|_| RunError::internal("array operand is mutably borrowed"))?;
        self.concat(&other, interp)
    }

    /// `a * n`; non-positive `n` yields an empty array.
    pub fn repeat(&self, n: i64, interp: &mut Interp) -> RunResult<Self> {
        let times = usize::try_from(n).unwrap_or(0);
        let source = self.buffer.as_bytes();
        let total = source
            .len()
            .checked_mul(times)
            .filter(|&nbytes| nbytes <= isize::MAX.unsigned_abs())
            .ok_or_else(ExcType::memory_error)?;
        let mut out = Self::allocate_packed(self.typecode, total, interp)?;
        if !source.is_empty() {
            for chunk in out.buffer.as_bytes_mut().chunks_exact_mut(source.len()) {
                chunk.copy_from_slice(source);
            }
        }
        Ok(out)
    }

    /// `a += other`; `other` must be an array of the same typecode.
    pub fn concat_in_place(&mut self, other: &Value, interp: &mut Interp) -> RunResult<()> {
        let Value::Array(other) = other else {
            return Err(ExcType::type_error(format!(
                "can only extend array with array (not \"{}\")",
                other.type_name()
            )));
        };
        let bytes = self.same_kind_bytes(other, || ExcType::type_error("can only extend with array of same kind"))?;
        self.extend_bytes(&bytes, interp)
    }

    /// `a *= n`, repeating the contents in place.
    ///
    /// Guarded only when the length actually changes, so `a *= 1` succeeds
    /// while exported.
    pub fn repeat_in_place(&mut self, n: i64, interp: &mut Interp) -> RunResult<()> {
        let len = self.len();
        if len == 0 {
            return Ok(());
        }
        let times = usize::try_from(n).unwrap_or(0);
        let new_len = len.checked_mul(times).ok_or_else(ExcType::memory_error)?;
        let total = self.byte_len(new_len)?;
        let chunk = len * self.itemsize();
        self.resize(new_len, interp)?;
        let mut filled = chunk.min(total);
        while filled < total {
            let count = filled.min(total - filled);
            self.buffer.move_within(0, count, filled);
            filled += count;
        }
        Ok(())
    }

    // --- comparison ---

    /// Rich comparison with another array, element by element.
    ///
    /// Arrays of different lengths are unequal without looking at elements.
    /// Elements compare by value with IEEE semantics, so an array holding a
    /// NaN is never equal to itself.
    pub fn compare(&self, other: &Self, op: CompareOp) -> RunResult<bool> {
        let (len, other_len) = (self.len(), other.len());
        if len != other_len && matches!(op, CompareOp::Eq | CompareOp::Ne) {
            return Ok(op == CompareOp::Ne);
        }
        for i in 0..len.min(other_len) {
            let (left, right) = (self.item(i)?, other.item(i)?);
            if !elements_equal(&left, &right) {
                return match op {
                    CompareOp::Eq => Ok(false),
                    CompareOp::Ne => Ok(true),
                    _ => elements_order(&left, &right, op),
                };
            }
        }
        Ok(op.matches(len.cmp(&other_len)))
    }

    // --- conversions ---

    #[must_use]
    pub fn tobytes(&self) -> Vec<u8> {
        self.buffer.as_bytes().to_vec()
    }

    /// Appends packed machine values; the length must be a multiple of the item size.
    pub fn frombytes(&mut self, data: &[u8], interp: &mut Interp) -> RunResult<()> {
        if data.len() % self.itemsize() != 0 {
            return Err(ExcType::value_error("bytes length not a multiple of item size"));
        }
        self.extend_bytes(data, interp)
    }

    pub fn tolist(&self) -> RunResult<Vec<Value>> {
        (0..self.len()).map(|i| self.item(i)).collect()
    }

    /// Appends the items of a list; nothing is appended unless every item is valid.
    pub fn fromlist(&mut self, list: &Value, interp: &mut Interp) -> RunResult<()> {
        let Value::List(items) = list else {
            return Err(ExcType::type_error("arg must be list"));
        };
        let mut packed = Vec::with_capacity(items.len().saturating_mul(self.itemsize()));
        for item in items {
            packed.extend_from_slice(&pack_element(self.typecode, item, interp)?);
        }
        self.extend_bytes(&packed, interp)
    }

    /// The contents of a `'u'` array as a string.
    pub fn tounicode(&self) -> RunResult<String> {
        if self.typecode != TypeCode::Unicode {
            return Err(ExcType::value_error(
                "tounicode() may only be called on unicode type arrays",
            ));
        }
        self.buffer
            .as_bytes()
            .chunks_exact(4)
            .map(|c| decode_code_point(u32::from_ne_bytes([c[0], c[1], c[2], c[3]])))
            .collect()
    }

    /// Appends the code points of `text` to a `'u'` array.
    pub fn fromunicode(&mut self, text: &str, interp: &mut Interp) -> RunResult<()> {
        if self.typecode != TypeCode::Unicode {
            return Err(ExcType::value_error(
                "fromunicode() may only be called on unicode type arrays",
            ));
        }
        let packed: Vec<u8> = text.chars().flat_map(|c| u32::from(c).to_ne_bytes()).collect();
        self.extend_bytes(&packed, interp)
    }

    /// Writes the packed contents to `file` in 64 KiB blocks.
    pub fn tofile(&self, file: &mut dyn FileLike, interp: &mut Interp) -> RunResult<()> {
        for block in self.buffer.as_bytes().chunks(FILE_BLOCK_SIZE) {
            file.write(block, interp)?;
        }
        Ok(())
    }

    /// Reads `n` elements from `file` and appends them.
    ///
    /// On a short read the complete elements that did arrive are appended
    /// and then `EOFError` is raised; a trailing partial element is dropped.
    pub fn fromfile(&mut self, file: &mut dyn FileLike, n: i64, interp: &mut Interp) -> RunResult<()> {
        if n < 0 {
            return Err(ExcType::value_error("negative count"));
        }
        let count = usize::try_from(n).map_err(|_| ExcType::memory_error())?;
        let nbytes = self.byte_len(count)?;
        let mut data = file.read(nbytes, interp)?;
        data.truncate(nbytes);
        let whole = data.len() - data.len() % self.itemsize();
        self.extend_bytes(&data[..whole], interp)?;
        if data.len() < nbytes {
            return Err(ExcType::short_read());
        }
        Ok(())
    }

    /// `(address, length)` of the storage; the address is 0 before anything is allocated.
    #[must_use]
    pub fn buffer_info(&self) -> (usize, usize) {
        let address = if self.buffer.capacity_bytes() == 0 {
            0
        } else {
            self.buffer.address()
        };
        (address, self.len())
    }

    /// Iterates over a snapshot of the current elements.
    #[must_use]
    pub fn iter(&self) -> ArrayIter {
        ArrayIter {
            typecode: self.typecode,
            bytes: self.tobytes(),
            front: 0,
            back: self.len(),
        }
    }

    /// Iterates over a snapshot of the current elements, last first.
    #[must_use]
    pub fn reversed(&self) -> std::iter::Rev<ArrayIter> {
        self.iter().rev()
    }

    /// `repr(a)`: `array('i', [1, 2])`, `array('u', 'ab')` or `array('d')`.
    pub fn py_repr(&self) -> RunResult<String> {
        let code = self.typecode.as_char();
        if self.is_empty() {
            return Ok(format!("array('{code}')"));
        }
        let mut out = format!("array('{code}', ");
        if self.typecode == TypeCode::Unicode {
            string_repr_fmt(&self.tounicode()?, &mut out);
        } else {
            Value::List(self.tolist()?).py_repr_fmt(&mut out)?;
        }
        out.push(')');
        Ok(out)
    }

    /// `copy.copy(a)`: a new array with the same contents and no exports.
    pub fn clone_array(&self, interp: &mut Interp) -> RunResult<Self> {
        let mut out = Self::allocate_packed(self.typecode, self.buffer.len_bytes(), interp)?;
        out.buffer.write(0, self.buffer.as_bytes());
        Ok(out)
    }
}

fn elements_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => a == b,
        _ => numeric_eq(left, right) == Some(true),
    }
}

fn elements_order(left: &Value, right: &Value, op: CompareOp) -> RunResult<bool> {
    if let Some(ordering) = numeric_cmp(left, right) {
        return Ok(ordering.is_some_and(|o| op.matches(o)));
    }
    if let (Value::Str(a), Value::Str(b)) = (left, right) {
        return Ok(op.matches(a.cmp(b)));
    }
    Err(ExcType::compare_not_supported(op.symbol(), left.type_name(), right.type_name()))
}

/// Element iterator over a snapshot of an array's bytes.
///
/// Yields `Err` only for `'u'` slots that don't hold a Unicode scalar.
#[derive(Debug, Clone)]
pub struct ArrayIter {
    typecode: TypeCode,
    bytes: Vec<u8>,
    front: usize,
    back: usize,
}

impl ArrayIter {
    fn element(&self, index: usize) -> RunResult<Value> {
        let isz = self.typecode.itemsize();
        unpack_element(self.typecode, &self.bytes[index * isz..(index + 1) * isz])
    }
}

impl Iterator for ArrayIter {
    type Item = RunResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            return None;
        }
        self.front += 1;
        Some(self.element(self.front - 1))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl DoubleEndedIterator for ArrayIter {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        Some(self.element(self.back))
    }
}

impl ExactSizeIterator for ArrayIter {}
