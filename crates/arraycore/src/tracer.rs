//! Array storage tracing infrastructure.
//!
//! Provides a trait-based tracing system for buffer lifecycle events: reallocations,
//! logical resizes, buffer exports and user-protocol re-entry.
//!
//! # Architecture
//!
//! The [`ArrayTracer`] trait defines hook points with default no-op bodies. Concrete
//! implementations collect different kinds of data:
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | No-op (default) |
//! | [`StderrTracer`] | Human-readable event log to stderr |
//! | [`ProfilingTracer`] | Reallocation/export counters and protocol depth tracking |
//! | [`RecordingTracer`] | Full event recording for assertions or post-mortem |
//!
//! # Usage
//!
//! ```
//! use arraycore::{Interp, RecordingTracer, TypedArray, Value};
//!
//! let mut interp = Interp::with_tracer(RecordingTracer::new());
//! let mut arr = TypedArray::construct("i", None, &mut interp).unwrap();
//! arr.append(&Value::Int(1), &mut interp).unwrap();
//! let tracer = interp.tracer::<RecordingTracer>().unwrap();
//! assert!(tracer.event_count() > 0);
//! ```

use std::{any::Any, fmt};

/// Trace event emitted by array storage operations.
///
/// Used by [`RecordingTracer`] to capture a full trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// The backing buffer was reallocated.
    Reallocate {
        /// Capacity in bytes before the reallocation.
        old_capacity: usize,
        /// Capacity in bytes after the reallocation.
        new_capacity: usize,
    },
    /// The logical element count changed.
    Resize { old_len: usize, new_len: usize },
    /// A buffer view was acquired.
    Export {
        /// Export count after the acquire.
        exports: usize,
    },
    /// A buffer view was released.
    Release {
        /// Export count after the release.
        exports: usize,
    },
    /// A user-level protocol method was invoked.
    ProtocolCall {
        type_name: String,
        protocol: &'static str,
        /// Protocol nesting depth before the call.
        depth: usize,
    },
    /// Storage was pinned for a native pointer export.
    NativePin { bytes: usize },
}

/// Trait for array storage tracing.
///
/// All methods have default no-op implementations, so [`NoopTracer`] requires
/// zero lines of code. Implementations only override the hooks they care about.
///
/// The `Any` supertrait lets callers recover the concrete tracer from an
/// [`Interp`](crate::Interp) after a run.
pub trait ArrayTracer: fmt::Debug + Any {
    /// Called after the backing buffer is reallocated.
    ///
    /// # Arguments
    /// * `old_capacity` - Capacity in bytes before the reallocation
    /// * `new_capacity` - Capacity in bytes after the reallocation
    #[inline(always)]
    fn on_reallocate(&mut self, _old_capacity: usize, _new_capacity: usize) {}

    /// Called after the logical element count changes.
    #[inline(always)]
    fn on_resize(&mut self, _old_len: usize, _new_len: usize) {}

    /// Called after a buffer view is acquired.
    ///
    /// # Arguments
    /// * `exports` - Outstanding export count after the acquire
    #[inline(always)]
    fn on_export(&mut self, _exports: usize) {}

    /// Called after a buffer view is explicitly released.
    #[inline(always)]
    fn on_release(&mut self, _exports: usize) {}

    /// Called before a user-level protocol method runs.
    ///
    /// # Arguments
    /// * `type_name` - Python type name of the receiver
    /// * `protocol` - Dunder name, e.g. `__index__`
    /// * `depth` - Protocol nesting depth before the call
    #[inline(always)]
    fn on_protocol_call(&mut self, _type_name: &str, _protocol: &'static str, _depth: usize) {}

    /// Called after storage is pinned for a native pointer export.
    #[inline(always)]
    fn on_native_pin(&mut self, _bytes: usize) {}
}

// ============================================================================
// NoopTracer: production default
// ============================================================================

/// A tracer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl ArrayTracer for NoopTracer {}

// ============================================================================
// StderrTracer: human-readable event log
// ============================================================================

/// Tracer that prints a human-readable event log to stderr.
///
/// Output format:
/// ```text
///   ~~~ REALLOC      16 -> 48 bytes
///   ... RESIZE       3 -> 4
///   >>> EXPORT       exports=1
///   <<< RELEASE      exports=0
///   ??? PROTOCOL     Idx.__index__ depth=0
/// ```
#[derive(Debug)]
pub struct StderrTracer {
    /// Maximum number of events to print before stopping. None = unlimited.
    limit: Option<usize>,
    /// Number of events printed so far.
    count: usize,
}

impl StderrTracer {
    /// Creates a new stderr tracer with no event limit.
    #[must_use]
    pub fn new() -> Self {
        Self { limit: None, count: 0 }
    }

    /// Creates a new stderr tracer that stops after `limit` events.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            count: 0,
        }
    }

    /// Number of events printed so far.
    #[must_use]
    pub fn printed(&self) -> usize {
        self.count
    }

    fn emit(&mut self, line: fmt::Arguments<'_>) {
        if self.limit.is_some_and(|l| self.count >= l) {
            return;
        }
        eprintln!("{line}");
        self.count += 1;
        if let Some(limit) = self.limit
            && self.count >= limit
        {
            eprintln!("--- trace limit reached ({limit} events) ---");
        }
    }
}

impl Default for StderrTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl ArrayTracer for StderrTracer {
    fn on_reallocate(&mut self, old_capacity: usize, new_capacity: usize) {
        self.emit(format_args!("  ~~~ REALLOC      {old_capacity} -> {new_capacity} bytes"));
    }

    fn on_resize(&mut self, old_len: usize, new_len: usize) {
        self.emit(format_args!("  ... RESIZE       {old_len} -> {new_len}"));
    }

    fn on_export(&mut self, exports: usize) {
        self.emit(format_args!("  >>> EXPORT       exports={exports}"));
    }

    fn on_release(&mut self, exports: usize) {
        self.emit(format_args!("  <<< RELEASE      exports={exports}"));
    }

    fn on_protocol_call(&mut self, type_name: &str, protocol: &'static str, depth: usize) {
        self.emit(format_args!("  ??? PROTOCOL     {type_name}.{protocol} depth={depth}"));
    }

    fn on_native_pin(&mut self, bytes: usize) {
        self.emit(format_args!("  !!! NATIVE PIN   {bytes} bytes"));
    }
}

// ============================================================================
// ProfilingTracer: allocation and protocol counters
// ============================================================================

/// Tracer that collects storage statistics for profiling.
///
/// Retrieve results via [`ProfilingTracer::report`] after execution.
#[derive(Debug, Default)]
pub struct ProfilingTracer {
    reallocations: u64,
    bytes_reallocated: u64,
    resizes: u64,
    exports: u64,
    protocol_calls: u64,
    max_protocol_depth: usize,
    native_pins: u64,
}

/// Summary report from a profiling trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilingReport {
    /// Number of buffer reallocations.
    pub reallocations: u64,
    /// Sum of the new capacities of every reallocation.
    pub bytes_reallocated: u64,
    /// Number of logical length changes.
    pub resizes: u64,
    /// Number of buffer views acquired.
    pub exports: u64,
    /// Number of user-level protocol calls.
    pub protocol_calls: u64,
    /// Deepest protocol nesting observed (1 = a protocol call with no re-entry).
    pub max_protocol_depth: usize,
    /// Number of native pointer exports.
    pub native_pins: u64,
}

impl ProfilingTracer {
    /// Creates a new profiling tracer with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a profiling report from the collected data.
    #[must_use]
    pub fn report(&self) -> ProfilingReport {
        ProfilingReport {
            reallocations: self.reallocations,
            bytes_reallocated: self.bytes_reallocated,
            resizes: self.resizes,
            exports: self.exports,
            protocol_calls: self.protocol_calls,
            max_protocol_depth: self.max_protocol_depth,
            native_pins: self.native_pins,
        }
    }
}

impl ArrayTracer for ProfilingTracer {
    #[inline]
    fn on_reallocate(&mut self, _old_capacity: usize, new_capacity: usize) {
        self.reallocations += 1;
        self.bytes_reallocated += new_capacity as u64;
    }

    #[inline]
    fn on_resize(&mut self, _old_len: usize, _new_len: usize) {
        self.resizes += 1;
    }

    fn on_export(&mut self, _exports: usize) {
        self.exports += 1;
    }

    fn on_protocol_call(&mut self, _type_name: &str, _protocol: &'static str, depth: usize) {
        self.protocol_calls += 1;
        self.max_protocol_depth = self.max_protocol_depth.max(depth + 1);
    }

    fn on_native_pin(&mut self, _bytes: usize) {
        self.native_pins += 1;
    }
}

impl fmt::Display for ProfilingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Array Storage Profile ===")?;
        writeln!(
            f,
            "Reallocations: {} ({} bytes)",
            self.reallocations, self.bytes_reallocated
        )?;
        writeln!(f, "Resizes: {}", self.resizes)?;
        writeln!(f, "Exports: {}", self.exports)?;
        writeln!(f, "Native pins: {}", self.native_pins)?;
        write!(
            f,
            "Protocol calls: {} (max depth {})",
            self.protocol_calls, self.max_protocol_depth
        )
    }
}

// ============================================================================
// RecordingTracer: full event capture
// ============================================================================

/// Tracer that records every event for later inspection.
#[derive(Debug)]
pub struct RecordingTracer {
    /// All recorded events in chronological order.
    events: Vec<TraceEvent>,
    /// Optional limit on number of events recorded.
    limit: Option<usize>,
}

impl RecordingTracer {
    /// Creates a new recording tracer with no event limit.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            limit: None,
        }
    }

    /// Creates a new recording tracer that stops recording after `limit` events.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            events: Vec::with_capacity(limit.min(1024)),
            limit: Some(limit),
        }
    }

    /// Returns the recorded events.
    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Consumes the tracer and returns the recorded events.
    #[must_use]
    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }

    /// Returns the number of events recorded.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    fn record(&mut self, event: TraceEvent) {
        if self.limit.is_some_and(|l| self.events.len() >= l) {
            return;
        }
        self.events.push(event);
    }
}

impl Default for RecordingTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl ArrayTracer for RecordingTracer {
    fn on_reallocate(&mut self, old_capacity: usize, new_capacity: usize) {
        self.record(TraceEvent::Reallocate {
            old_capacity,
            new_capacity,
        });
    }

    fn on_resize(&mut self, old_len: usize, new_len: usize) {
        self.record(TraceEvent::Resize { old_len, new_len });
    }

    fn on_export(&mut self, exports: usize) {
        self.record(TraceEvent::Export { exports });
    }

    fn on_release(&mut self, exports: usize) {
        self.record(TraceEvent::Release { exports });
    }

    fn on_protocol_call(&mut self, type_name: &str, protocol: &'static str, depth: usize) {
        self.record(TraceEvent::ProtocolCall {
            type_name: type_name.to_owned(),
            protocol,
            depth,
        });
    }

    fn on_native_pin(&mut self, bytes: usize) {
        self.record(TraceEvent::NativePin { bytes });
    }
}
