use crate::exception::{ExcType, RunResult};

/// An unresolved `start:stop:step` slice; omitted parts are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SliceSpec {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: Option<i64>,
}

/// A slice resolved against a concrete length.
///
/// `start` and `stop` may be `-1` or `len` for negative and positive steps
/// respectively; only the first `len` positions `start + i * step` are
/// guaranteed to be valid indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceIndices {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
    pub len: usize,
}

impl SliceSpec {
    #[must_use]
    pub fn new(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Self {
        Self { start, stop, step }
    }

    /// `[:]`
    #[must_use]
    pub fn full() -> Self {
        Self::default()
    }

    /// `[start:stop]`
    #[must_use]
    pub fn range(start: i64, stop: i64) -> Self {
        Self::new(Some(start), Some(stop), None)
    }

    /// Resolves the slice for a sequence of `len` elements, clamping out of
    /// range bounds the way `slice.indices()` does.
    pub fn indices(&self, len: usize) -> RunResult<SliceIndices> {
        let step = match self.step {
            None => 1,
            Some(0) => return Err(ExcType::value_error("slice step cannot be zero")),
            // -i64::MAX so that negating the step can't overflow.
            Some(step) => step.max(-i64::MAX),
        };
        let len = i64::try_from(len).unwrap_or(i64::MAX);
        let (lower, upper) = if step < 0 { (-1, len - 1) } else { (0, len) };
        let clamp = |bound: Option<i64>, default: i64| match bound {
            None => default,
            Some(b) if b < 0 => (b.saturating_add(len)).max(lower),
            Some(b) => b.min(upper),
        };
        let start = clamp(self.start, if step < 0 { upper } else { lower });
        let stop = clamp(self.stop, if step < 0 { lower } else { upper });

        let count = if step < 0 {
            if stop < start { (start - stop - 1) / -step + 1 } else { 0 }
        } else if start < stop {
            (stop - start - 1) / step + 1
        } else {
            0
        };
        Ok(SliceIndices {
            start,
            stop,
            step,
            len: count as usize,
        })
    }
}

impl SliceIndices {
    /// The selected indices, in slice order.
    pub fn positions(&self) -> impl Iterator<Item = usize> + use<> {
        let Self { start, step, len, .. } = *self;
        (0..len).map(move |i| (start + i as i64 * step) as usize)
    }
}
