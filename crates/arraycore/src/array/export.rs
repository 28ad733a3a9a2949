//! Shared array handles and buffer exports.

use std::{
    cell::{BorrowError, BorrowMutError, Ref, RefCell, RefMut},
    rc::Rc,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use super::{TypedArray, buffer::NativeBlock};
use crate::{
    exception::{ExcType, RunError, RunResult},
    interp::Interp,
};

/// Shared, mutable handle to an array, as held by [`Value::Array`](crate::Value::Array).
#[derive(Debug, Clone)]
pub struct ArrayRef(Rc<RefCell<TypedArray>>);

impl ArrayRef {
    #[must_use]
    pub fn new(array: TypedArray) -> Self {
        Self(Rc::new(RefCell::new(array)))
    }

    /// Panics if the array is mutably borrowed.
    #[must_use]
    pub fn borrow(&self) -> Ref<'_, TypedArray> {
        self.0.borrow()
    }

    /// Panics if the array is borrowed.
    #[must_use]
    pub fn borrow_mut(&self) -> RefMut<'_, TypedArray> {
        self.0.borrow_mut()
    }

    pub fn try_borrow(&self) -> Result<Ref<'_, TypedArray>, BorrowError> {
        self.0.try_borrow()
    }

    pub fn try_borrow_mut(&self) -> Result<RefMut<'_, TypedArray>, BorrowMutError> {
        self.0.try_borrow_mut()
    }

    /// Whether both handles refer to the same array.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Whether this handle refers to `array`, which may currently be borrowed through it.
    pub(crate) fn is(&self, array: &TypedArray) -> bool {
        std::ptr::eq(self.0.as_ptr().cast_const(), array)
    }

    /// Exports the live buffer as a byte-addressable view.
    ///
    /// Reads and writes through the view hit the array's storage directly.
    /// Until the view is released (or dropped) the array cannot change length.
    pub fn acquire_buffer_view(&self, interp: &mut Interp) -> RunResult<BufferView> {
        let array = self
            .try_borrow()
            .map_err(|_| RunError::internal("buffer export from a mutably borrowed array"))?;
        let exports = Arc::clone(&array.exports);
        let count = exports.fetch_add(1, Ordering::AcqRel) + 1;
        interp.tracer_mut().on_export(count);
        Ok(BufferView {
            array: self.clone(),
            itemsize: array.itemsize(),
            exports,
            released: false,
        })
    }
}

/// Decrements an export counter once, returning the remaining count.
fn release_once(exports: &AtomicUsize, released: &mut bool) -> usize {
    if *released {
        return exports.load(Ordering::Acquire);
    }
    *released = true;
    exports.fetch_sub(1, Ordering::AcqRel) - 1
}

/// A live export of an array's bytes.
///
/// Dropping the view releases it; [`release`](Self::release) does the same
/// and reports the release to the tracer.
#[derive(Debug)]
pub struct BufferView {
    array: ArrayRef,
    itemsize: usize,
    exports: Arc<AtomicUsize>,
    released: bool,
}

impl BufferView {
    #[must_use]
    pub fn itemsize(&self) -> usize {
        self.itemsize
    }

    fn array(&self) -> RunResult<Ref<'_, TypedArray>> {
        self.array
            .try_borrow()
            .map_err(|_| RunError::internal("buffer view read while the array is mutably borrowed"))
    }

    pub fn len_bytes(&self) -> RunResult<usize> {
        Ok(self.array()?.buffer.len_bytes())
    }

    /// Copies `len` bytes starting at `offset`.
    pub fn read_bytes(&self, offset: usize, len: usize) -> RunResult<Vec<u8>> {
        let array = self.array()?;
        let bytes = array.buffer.as_bytes();
        let end = checked_end(offset, len, bytes.len())?;
        Ok(bytes[offset..end].to_vec())
    }

    /// Overwrites bytes starting at `offset`; the array sees the change immediately.
    pub fn write_bytes(&self, offset: usize, data: &[u8]) -> RunResult<()> {
        let mut array = self
            .array
            .try_borrow_mut()
            .map_err(|_| RunError::internal("buffer view write while the array is borrowed"))?;
        checked_end(offset, data.len(), array.buffer.len_bytes())?;
        array.buffer.write(offset, data);
        Ok(())
    }

    /// Runs `f` over the contiguous live bytes without copying.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> RunResult<R> {
        Ok(f(self.array()?.buffer.as_bytes()))
    }

    pub fn release(mut self, interp: &mut Interp) {
        let remaining = release_once(&self.exports, &mut self.released);
        interp.tracer_mut().on_release(remaining);
    }
}

impl Drop for BufferView {
    fn drop(&mut self) {
        release_once(&self.exports, &mut self.released);
    }
}

fn checked_end(offset: usize, len: usize, available: usize) -> RunResult<usize> {
    offset
        .checked_add(len)
        .filter(|&end| end <= available)
        .ok_or_else(|| ExcType::index_error("buffer view access out of range"))
}

/// A raw pointer export of pinned storage.
///
/// The address stays valid until the export is released: the array refuses
/// every operation that would move or resize its storage while any export is
/// live, and the export shares ownership of the pinned allocation, so it
/// survives the array being dropped. The handle is `Send` so native code on
/// another thread can hold it and release it from there.
#[derive(Debug)]
pub struct NativeExport {
    address: usize,
    len: usize,
    pin: Option<Arc<NativeBlock>>,
    exports: Arc<AtomicUsize>,
    released: bool,
}

impl NativeExport {
    #[must_use]
    pub fn address(&self) -> usize {
        self.address
    }

    #[must_use]
    pub fn len_bytes(&self) -> usize {
        self.len
    }

    /// Whether the export still holds the pinned storage.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.pin.is_some()
    }

    pub fn release(mut self, interp: &mut Interp) {
        let remaining = self.unpin();
        interp.tracer_mut().on_release(remaining);
    }

    /// Gives up the storage before the counter drops, so an array that sees
    /// zero exports also owns its allocation alone again.
    fn unpin(&mut self) -> usize {
        self.pin = None;
        release_once(&self.exports, &mut self.released)
    }
}

impl Drop for NativeExport {
    fn drop(&mut self) {
        self.unpin();
    }
}

impl TypedArray {
    /// Pins the storage at a fixed address and exports it.
    ///
    /// Pinning happens once; later calls hand out the same address.
    pub fn get_native_pointer(&mut self, interp: &mut Interp) -> NativeExport {
        if !self.buffer.is_native() {
            interp.tracer_mut().on_native_pin(self.buffer.capacity_bytes());
        }
        let pin = self.buffer.pin();
        let count = self.exports.fetch_add(1, Ordering::AcqRel) + 1;
        interp.tracer_mut().on_export(count);
        NativeExport {
            address: pin.address(),
            len: self.buffer.len_bytes(),
            pin: Some(pin),
            exports: Arc::clone(&self.exports),
            released: false,
        }
    }
}
