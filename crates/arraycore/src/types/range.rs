use crate::exception::{ExcType, RunResult};

/// An immutable arithmetic progression, Python's `range(start, stop, step)`.
///
/// Used as an array initializer: the length is known up front so the buffer
/// is preallocated exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Range {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl Range {
    /// Creates a range, rejecting a zero step like `range()` does.
    pub fn new(start: i64, stop: i64, step: i64) -> RunResult<Self> {
        if step == 0 {
            return Err(ExcType::value_error("range() arg 3 must not be zero"));
        }
        Ok(Self { start, stop, step })
    }

    /// `range(stop)`.
    #[must_use]
    pub fn to(stop: i64) -> Self {
        Self { start: 0, stop, step: 1 }
    }

    /// Number of elements, computed in `i128` so extreme bounds can't overflow.
    #[must_use]
    pub fn len(&self) -> u64 {
        let (start, stop, step) = (i128::from(self.start), i128::from(self.stop), i128::from(self.step));
        let len = if step > 0 && start < stop {
            (stop - start - 1) / step + 1
        } else if step < 0 && start > stop {
            (start - stop - 1) / -step + 1
        } else {
            0
        };
        len as u64
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `index`-th element; always within `i64` for `index < len()`.
    #[must_use]
    pub fn get(&self, index: u64) -> i64 {
        (i128::from(self.start) + i128::from(index) * i128::from(self.step)) as i64
    }

    /// Iterates the elements in order.
    pub fn iter(&self) -> impl Iterator<Item = i64> + use<> {
        let range = *self;
        (0..range.len()).map(move |i| range.get(i))
    }
}
