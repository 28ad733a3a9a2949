use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use serde::{Deserialize, Serialize};

use crate::exception::{ExcType, RunError, SimpleException};

/// Threshold in bytes above which `check_large_result` is called.
///
/// Bulk operations (`repeat`, `fromfile`, range initializers) that may produce
/// buffers larger than this threshold call `check_large_result` before
/// allocating, so `array('b', [0]) * 10**12` is rejected up front rather than
/// after the allocator has been asked for a terabyte.
pub const LARGE_RESULT_THRESHOLD: usize = 100_000;

/// Recommended maximum protocol re-entry depth if not otherwise specified.
///
/// A user `__index__` that itself packs into an array re-enters the core; this
/// bounds that nesting.
pub const DEFAULT_MAX_PROTOCOL_DEPTH: usize = 200;

/// Error returned when a resource limit is exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// Maximum number of buffer allocations exceeded.
    Allocation { limit: usize, count: usize },
    /// Maximum total buffer memory exceeded.
    Memory { limit: usize, used: usize },
    /// A single buffer would exceed the per-array size limit.
    ArraySize { limit: usize, requested: usize },
    /// Maximum protocol re-entry depth exceeded.
    Recursion { limit: usize, depth: usize },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allocation { limit, count } => {
                write!(f, "allocation limit exceeded: {count} > {limit}")
            }
            Self::Memory { limit, used } => {
                write!(f, "memory limit exceeded: {used} bytes > {limit} bytes")
            }
            Self::ArraySize { limit, requested } => {
                write!(f, "array size limit exceeded: {requested} bytes > {limit} bytes")
            }
            Self::Recursion { .. } => {
                write!(f, "maximum recursion depth exceeded")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

impl ResourceError {
    /// Converts this resource error to a Python exception.
    ///
    /// Maps resource error types to Python exception types:
    /// - `Allocation` → `MemoryError`
    /// - `Memory` → `MemoryError`
    /// - `ArraySize` → `MemoryError`
    /// - `Recursion` → `RecursionError`
    #[must_use]
    pub(crate) fn into_exception(self) -> SimpleException {
        let exc_type = match self {
            Self::Allocation { .. } | Self::Memory { .. } | Self::ArraySize { .. } => ExcType::MemoryError,
            Self::Recursion { .. } => ExcType::RecursionError,
        };
        SimpleException::new_msg(exc_type, self)
    }
}

impl From<ResourceError> for RunError {
    fn from(err: ResourceError) -> Self {
        // RecursionError stays catchable so callers can recover from a runaway
        // protocol; limit-driven MemoryErrors must not be swallowed.
        if matches!(err, ResourceError::Recursion { .. }) {
            Self::Exc(Box::new(err.into_exception()))
        } else {
            Self::UncatchableExc(Box::new(err.into_exception()))
        }
    }
}

/// Bytes given back by buffers that were dropped.
///
/// Drop has no interpreter handle to call `on_free` through, so a buffer
/// charged against a tracker keeps a clone of the tracker's ledger and
/// credits its capacity here instead. The tracker settles the credit before
/// its next check.
#[derive(Debug, Clone, Default)]
pub struct FreedBytes(Arc<AtomicUsize>);

impl FreedBytes {
    pub(crate) fn credit(&self, bytes: usize) {
        self.0.fetch_add(bytes, Ordering::AcqRel);
    }

    /// Credited bytes not yet settled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    fn take(&self) -> usize {
        self.0.swap(0, Ordering::AcqRel)
    }
}

/// Trait for tracking buffer memory and protocol nesting.
///
/// Every packed-buffer (re)allocation consults the tracker before the
/// allocator is touched. Accounting is per interpreter handle: growth is
/// charged, shrinking is credited through `on_free`, and dropped buffers
/// credit the ledger returned by `freed_bytes`.
pub trait ResourceTracker: fmt::Debug + std::any::Any {
    /// Called before a buffer grows by `size` bytes.
    ///
    /// Returns `Ok(())` if the allocation should proceed, or `Err(ResourceError)`
    /// if a limit would be exceeded.
    fn on_allocate(&mut self, size: usize) -> Result<(), ResourceError>;

    /// Called after a buffer shrinks by `size` bytes.
    fn on_free(&mut self, size: usize);

    /// Called before a user protocol runs to check re-entry depth.
    ///
    /// # Arguments
    /// * `current_depth` - Protocol nesting depth before the new call
    fn check_recursion_depth(&self, current_depth: usize) -> Result<(), ResourceError>;

    /// Called before operations that may produce large buffers (>100KB).
    ///
    /// # Arguments
    /// * `estimated_bytes` - Size of the buffer the operation will need
    fn check_large_result(&self, estimated_bytes: usize) -> Result<(), ResourceError>;

    /// Called before a buffer is (re)allocated to `bytes` total capacity.
    fn check_array_size(&self, _bytes: usize) -> Result<(), ResourceError> {
        Ok(())
    }

    /// Returns the total number of allocations tracked, if this tracker records them.
    fn allocation_count(&self) -> Option<usize> {
        None
    }

    /// Ledger that buffers charged to this tracker credit when dropped.
    fn freed_bytes(&self) -> Option<FreedBytes> {
        None
    }

    /// Returns the current approximate buffer memory in bytes, if tracked.
    fn current_memory_bytes(&self) -> Option<usize> {
        None
    }
}

/// A resource tracker that imposes no limits beyond the default protocol depth.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NoLimitTracker;

impl ResourceTracker for NoLimitTracker {
    #[inline]
    fn on_allocate(&mut self, _size: usize) -> Result<(), ResourceError> {
        Ok(())
    }

    #[inline]
    fn on_free(&mut self, _size: usize) {}

    #[inline]
    fn check_recursion_depth(&self, current_depth: usize) -> Result<(), ResourceError> {
        if current_depth >= DEFAULT_MAX_PROTOCOL_DEPTH {
            Err(ResourceError::Recursion {
                limit: DEFAULT_MAX_PROTOCOL_DEPTH,
                depth: current_depth + 1,
            })
        } else {
            Ok(())
        }
    }

    #[inline]
    fn check_large_result(&self, _estimated_bytes: usize) -> Result<(), ResourceError> {
        Ok(())
    }
}

/// Configuration for resource limits.
///
/// All limits are optional - set to `None` to disable a specific limit.
/// Use `ResourceLimits::default()` for no limits, or build custom limits
/// with the builder pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Maximum number of buffer allocations allowed.
    pub max_allocations: Option<usize>,
    /// Maximum total packed-buffer memory in bytes.
    pub max_memory: Option<usize>,
    /// Maximum size in bytes of any single array buffer.
    pub max_array_bytes: Option<usize>,
    /// Maximum nesting of user protocol calls.
    pub max_protocol_depth: Option<usize>,
}

impl ResourceLimits {
    /// Creates a new ResourceLimits with all limits disabled except the protocol depth.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_protocol_depth: Some(DEFAULT_MAX_PROTOCOL_DEPTH),
            ..Default::default()
        }
    }

    /// Sets the maximum number of allocations.
    #[must_use]
    pub fn max_allocations(mut self, limit: usize) -> Self {
        self.max_allocations = Some(limit);
        self
    }

    /// Sets the maximum memory usage in bytes.
    #[must_use]
    pub fn max_memory(mut self, limit: usize) -> Self {
        self.max_memory = Some(limit);
        self
    }

    /// Sets the maximum size of a single array buffer in bytes.
    #[must_use]
    pub fn max_array_bytes(mut self, limit: usize) -> Self {
        self.max_array_bytes = Some(limit);
        self
    }

    /// Sets the maximum protocol nesting depth.
    #[must_use]
    pub fn max_protocol_depth(mut self, limit: Option<usize>) -> Self {
        self.max_protocol_depth = limit;
        self
    }
}

/// A resource tracker that enforces configurable limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitedTracker {
    limits: ResourceLimits,
    /// Total number of allocations made.
    allocation_count: usize,
    /// Current approximate buffer memory in bytes, before settling `freed`.
    current_memory: usize,
    #[serde(skip)]
    freed: FreedBytes,
}

impl LimitedTracker {
    /// Creates a new LimitedTracker with the given limits.
    #[must_use]
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            limits,
            allocation_count: 0,
            current_memory: 0,
            freed: FreedBytes::default(),
        }
    }

    fn live_memory(&self) -> usize {
        self.current_memory.saturating_sub(self.freed.pending())
    }

    #[must_use]
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }
}

impl ResourceTracker for LimitedTracker {
    fn on_allocate(&mut self, size: usize) -> Result<(), ResourceError> {
        self.current_memory = self.current_memory.saturating_sub(self.freed.take());
        if let Some(max) = self.limits.max_allocations
            && self.allocation_count >= max
        {
            return Err(ResourceError::Allocation {
                limit: max,
                count: self.allocation_count + 1,
            });
        }

        let new_memory = self.current_memory.saturating_add(size);
        if let Some(max) = self.limits.max_memory
            && new_memory > max
        {
            return Err(ResourceError::Memory {
                limit: max,
                used: new_memory,
            });
        }

        self.allocation_count += 1;
        self.current_memory = new_memory;
        Ok(())
    }

    fn on_free(&mut self, size: usize) {
        self.current_memory = self.current_memory.saturating_sub(size);
    }

    fn check_recursion_depth(&self, current_depth: usize) -> Result<(), ResourceError> {
        if let Some(max) = self.limits.max_protocol_depth
            && current_depth >= max
        {
            return Err(ResourceError::Recursion {
                limit: max,
                depth: current_depth + 1,
            });
        }
        Ok(())
    }

    fn check_large_result(&self, estimated_bytes: usize) -> Result<(), ResourceError> {
        self.check_array_size(estimated_bytes)?;
        if let Some(max) = self.limits.max_memory {
            let new_memory = self.live_memory().saturating_add(estimated_bytes);
            if new_memory > max {
                return Err(ResourceError::Memory {
                    limit: max,
                    used: new_memory,
                });
            }
        }
        Ok(())
    }

    fn check_array_size(&self, bytes: usize) -> Result<(), ResourceError> {
        if let Some(max) = self.limits.max_array_bytes
            && bytes > max
        {
            return Err(ResourceError::ArraySize {
                limit: max,
                requested: bytes,
            });
        }
        Ok(())
    }

    fn allocation_count(&self) -> Option<usize> {
        Some(self.allocation_count)
    }

    fn freed_bytes(&self) -> Option<FreedBytes> {
        Some(self.freed.clone())
    }

    fn current_memory_bytes(&self) -> Option<usize> {
        Some(self.live_memory())
    }
}
