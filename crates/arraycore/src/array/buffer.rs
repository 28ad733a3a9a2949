//! Byte storage behind a typed array.

use std::{mem::ManuallyDrop, ptr::NonNull, sync::Arc};

use crate::{
    exception::{ExcType, RunResult},
    interp::Interp,
    resource::FreedBytes,
};

/// A pinned allocation shared by an array and its native exports.
///
/// Only the owning array forms references into the bytes; exports hold the
/// block purely to keep the address valid. Whichever handle goes last frees
/// the allocation and credits it to the ledger the array was charged against.
#[derive(Debug)]
pub(crate) struct NativeBlock {
    ptr: NonNull<[u8]>,
    ledger: Option<FreedBytes>,
}

// SAFETY: the block owns its allocation outright. Handles other than the
// owning buffer never dereference `ptr`, so sharing or sending them cannot
// race with the buffer's reads and writes.
unsafe impl Send for NativeBlock {}
// SAFETY: see `Send`; `&NativeBlock` exposes no access to the bytes outside this module.
unsafe impl Sync for NativeBlock {}

impl NativeBlock {
    fn new(bytes: Box<[u8]>, ledger: Option<FreedBytes>) -> Self {
        Self {
            ptr: NonNull::from(Box::leak(bytes)),
            ledger,
        }
    }

    pub(crate) fn address(&self) -> usize {
        self.ptr.cast::<u8>().as_ptr() as usize
    }

    fn len(&self) -> usize {
        self.ptr.len()
    }

    /// Takes the allocation back as a `Vec` without crediting the ledger.
    fn into_vec(self) -> Vec<u8> {
        let mut this = ManuallyDrop::new(self);
        drop(this.ledger.take());
        // SAFETY: `ptr` came from `Box::leak` in `new` and `this` is never
        // dropped, so the allocation is reclaimed exactly once.
        unsafe { Box::from_raw(this.ptr.as_ptr()) }.into_vec()
    }
}

impl Drop for NativeBlock {
    fn drop(&mut self) {
        if let Some(ledger) = &self.ledger {
            ledger.credit(self.len());
        }
        // SAFETY: `ptr` came from `Box::leak` in `new`; this is the last handle.
        drop(unsafe { Box::from_raw(self.ptr.as_ptr()) });
    }
}

/// Where the bytes live.
///
/// `Heap` is the ordinary growable region. `Native` is a fixed allocation
/// whose address was handed out through a native pointer export; it is only
/// ever turned back into `Heap` by a reallocation, which the owning array
/// refuses while exports are outstanding.
#[derive(Debug)]
enum Storage {
    Heap(Vec<u8>),
    Native(Arc<NativeBlock>),
}

impl Storage {
    fn bytes(&self) -> &[u8] {
        match self {
            Self::Heap(v) => v,
            // SAFETY: the allocation lives as long as the block, and writes
            // only happen through `bytes_mut`, which needs `&mut self`.
            Self::Native(block) => unsafe { block.ptr.as_ref() },
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            Self::Heap(v) => v,
            // SAFETY: `&mut self` makes this the only reference into the
            // bytes; exports sharing the block never dereference it.
            Self::Native(block) => unsafe { &mut *block.ptr.as_ptr() },
        }
    }

    fn into_vec(self) -> Vec<u8> {
        match self {
            Self::Heap(v) => v,
            Self::Native(block) => match Arc::try_unwrap(block) {
                Ok(block) => block.into_vec(),
                // Exports drop their handle before releasing, so this only
                // happens if the owner reallocates under a live export.
                Err(shared) => {
                    // SAFETY: as in `bytes`.
                    unsafe { shared.ptr.as_ref() }.to_vec()
                }
            },
        }
    }
}

/// A contiguous byte region with a logical length and a capacity.
///
/// The whole capacity is always initialized (zero-filled when grown), so
/// `len_bytes <= capacity_bytes` is the only invariant the owner must keep.
/// Element width is the owner's concern; every offset here is in bytes.
#[derive(Debug)]
pub(crate) struct PackedBuffer {
    storage: Storage,
    len: usize,
    /// Set once capacity has been charged to a tracker that keeps a ledger.
    ledger: Option<FreedBytes>,
}

impl PackedBuffer {
    pub(crate) fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Wraps already-packed bytes without consulting a tracker.
    pub(crate) fn from_vec(bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        Self {
            storage: Storage::Heap(bytes),
            len,
            ledger: None,
        }
    }

    #[inline]
    pub(crate) fn len_bytes(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn capacity_bytes(&self) -> usize {
        self.storage.bytes().len()
    }

    #[inline]
    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.storage.bytes()[..self.len]
    }

    #[inline]
    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        let len = self.len;
        &mut self.storage.bytes_mut()[..len]
    }

    /// Start address of the storage, as reported by `buffer_info()`.
    pub(crate) fn address(&self) -> usize {
        self.storage.bytes().as_ptr() as usize
    }

    pub(crate) fn is_native(&self) -> bool {
        matches!(self.storage, Storage::Native(_))
    }

    /// Reallocates to exactly `new_capacity` bytes, keeping the common prefix.
    ///
    /// The tracker is consulted before the allocator; a refused or failed
    /// allocation leaves the buffer untouched apart from unpinning.
    pub(crate) fn reallocate(&mut self, new_capacity: usize, interp: &mut Interp) -> RunResult<()> {
        let old_capacity = self.capacity_bytes();
        if new_capacity == old_capacity && !self.is_native() {
            return Ok(());
        }
        if new_capacity > old_capacity {
            let tracker = interp.tracker_mut();
            tracker.check_array_size(new_capacity)?;
            tracker.on_allocate(new_capacity - old_capacity)?;
            if self.ledger.is_none() {
                self.ledger = tracker.freed_bytes();
            }
        }

        let mut bytes = std::mem::replace(&mut self.storage, Storage::Heap(Vec::new())).into_vec();
        if new_capacity > bytes.len() {
            if bytes.try_reserve_exact(new_capacity - bytes.len()).is_err() {
                self.storage = Storage::Heap(bytes);
                interp.tracker_mut().on_free(new_capacity - old_capacity);
                return Err(ExcType::memory_error());
            }
            bytes.resize(new_capacity, 0);
        } else {
            bytes.truncate(new_capacity);
            bytes.shrink_to_fit();
        }
        self.storage = Storage::Heap(bytes);
        self.len = self.len.min(new_capacity);

        if new_capacity < old_capacity {
            interp.tracker_mut().on_free(old_capacity - new_capacity);
        }
        interp.tracer_mut().on_reallocate(old_capacity, new_capacity);
        Ok(())
    }

    /// Sets the logical length; the bytes up to capacity are already initialized.
    pub(crate) fn set_len(&mut self, len_bytes: usize) {
        debug_assert!(len_bytes <= self.capacity_bytes());
        self.len = len_bytes.min(self.capacity_bytes());
    }

    /// Opens a gap of `by` bytes at `from`, moving `[from, len)` up.
    ///
    /// The caller has already ensured `len + by <= capacity`.
    pub(crate) fn shift(&mut self, from: usize, by: usize) {
        let len = self.len;
        debug_assert!(from <= len && len + by <= self.capacity_bytes());
        self.storage.bytes_mut().copy_within(from..len, from + by);
        self.len = len + by;
    }

    /// Removes `count` bytes at `from`, moving the tail down over them.
    pub(crate) fn delete_range(&mut self, from: usize, count: usize) {
        let len = self.len;
        debug_assert!(from + count <= len);
        self.storage.bytes_mut().copy_within(from + count..len, from);
        self.len = len - count;
    }

    /// Copies `[src, src + count)` to `dest` within the logical region.
    pub(crate) fn move_within(&mut self, src: usize, count: usize, dest: usize) {
        self.as_bytes_mut().copy_within(src..src + count, dest);
    }

    /// Overwrites bytes at `offset`.
    pub(crate) fn write(&mut self, offset: usize, data: &[u8]) {
        self.as_bytes_mut()[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Moves the storage to a fixed allocation and returns a handle to it.
    ///
    /// Idempotent: a pinned buffer keeps its address. The block carries the
    /// ledger from here on, so its bytes are credited when the last handle
    /// goes, not when the array does.
    pub(crate) fn pin(&mut self) -> Arc<NativeBlock> {
        let block = match std::mem::replace(&mut self.storage, Storage::Heap(Vec::new())) {
            Storage::Native(block) => block,
            Storage::Heap(bytes) => Arc::new(NativeBlock::new(bytes.into_boxed_slice(), self.ledger.clone())),
        };
        self.storage = Storage::Native(Arc::clone(&block));
        block
    }
}

impl Drop for PackedBuffer {
    fn drop(&mut self) {
        if let (Storage::Heap(bytes), Some(ledger)) = (&self.storage, &self.ledger) {
            ledger.credit(bytes.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(bytes: &[u8], capacity: usize, interp: &mut Interp) -> PackedBuffer {
        let mut buffer = PackedBuffer::new();
        buffer.reallocate(capacity, interp).unwrap();
        buffer.set_len(bytes.len());
        buffer.write(0, bytes);
        buffer
    }

    #[test]
    fn reallocate_keeps_prefix_and_zero_fills() {
        let mut interp = Interp::new();
        let mut buffer = filled(&[1, 2, 3], 4, &mut interp);
        buffer.reallocate(8, &mut interp).unwrap();
        assert_eq!(buffer.capacity_bytes(), 8);
        assert_eq!(buffer.as_bytes(), &[1, 2, 3]);
        buffer.set_len(8);
        assert_eq!(&buffer.as_bytes()[3..], &[0, 0, 0, 0, 0]);
    }

    #[test]
    fn shrinking_truncates_length() {
        let mut interp = Interp::new();
        let mut buffer = filled(&[1, 2, 3, 4], 4, &mut interp);
        buffer.reallocate(2, &mut interp).unwrap();
        assert_eq!(buffer.as_bytes(), &[1, 2]);
    }

    #[test]
    fn shift_moves_overlapping_tail() {
        let mut interp = Interp::new();
        let mut buffer = filled(&[1, 2, 3, 4], 8, &mut interp);
        buffer.shift(1, 2);
        buffer.write(1, &[9, 9]);
        assert_eq!(buffer.as_bytes(), &[1, 9, 9, 2, 3, 4]);
    }

    #[test]
    fn delete_range_closes_gap() {
        let mut interp = Interp::new();
        let mut buffer = filled(&[1, 2, 3, 4, 5, 6], 6, &mut interp);
        buffer.delete_range(1, 3);
        assert_eq!(buffer.as_bytes(), &[1, 5, 6]);
    }

    #[test]
    fn pin_keeps_address_until_reallocated() {
        let mut interp = Interp::new();
        let mut buffer = filled(&[1, 2, 3, 4], 4, &mut interp);
        let addr = buffer.pin().address();
        assert!(buffer.is_native());
        assert_eq!(buffer.pin().address(), addr);
        assert_eq!(buffer.address(), addr);
        assert_eq!(buffer.as_bytes(), &[1, 2, 3, 4]);
        buffer.reallocate(16, &mut interp).unwrap();
        assert!(!buffer.is_native());
        assert_eq!(buffer.as_bytes(), &[1, 2, 3, 4]);
    }
}
