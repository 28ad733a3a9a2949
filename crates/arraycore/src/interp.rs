use std::any::Any;

use crate::{
    exception::RunResult,
    resource::{LimitedTracker, NoLimitTracker, ResourceLimits, ResourceTracker},
    tracer::{ArrayTracer, NoopTracer},
};

/// Interpreter handle threaded through every operation that can allocate or
/// run user-level protocol code.
///
/// Owns the resource tracker that bounds buffer growth, the tracer that
/// observes storage events, and the current protocol re-entry depth. Arrays
/// themselves stay plain data; all policy lives here.
#[derive(Debug)]
pub struct Interp {
    tracker: Box<dyn ResourceTracker>,
    tracer: Box<dyn ArrayTracer>,
    protocol_depth: usize,
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}

impl Interp {
    /// Creates a handle with no resource limits and no tracing.
    #[must_use]
    pub fn new() -> Self {
        Self::with_parts(NoLimitTracker, NoopTracer)
    }

    /// Creates a handle enforcing `limits` through a [`LimitedTracker`].
    #[must_use]
    pub fn with_limits(limits: ResourceLimits) -> Self {
        Self::with_parts(LimitedTracker::new(limits), NoopTracer)
    }

    /// Creates an unlimited handle that reports storage events to `tracer`.
    #[must_use]
    pub fn with_tracer(tracer: impl ArrayTracer) -> Self {
        Self::with_parts(NoLimitTracker, tracer)
    }

    /// Creates a handle from an explicit tracker and tracer.
    #[must_use]
    pub fn with_parts(tracker: impl ResourceTracker, tracer: impl ArrayTracer) -> Self {
        Self {
            tracker: Box::new(tracker),
            tracer: Box::new(tracer),
            protocol_depth: 0,
        }
    }

    /// Returns the tracker if it is a `T`.
    #[must_use]
    pub fn tracker<T: ResourceTracker>(&self) -> Option<&T> {
        let tracker: &dyn Any = &*self.tracker;
        tracker.downcast_ref()
    }

    /// Returns the tracer if it is a `T`.
    #[must_use]
    pub fn tracer<T: ArrayTracer>(&self) -> Option<&T> {
        let tracer: &dyn Any = &*self.tracer;
        tracer.downcast_ref()
    }

    /// Returns the tracker as a trait object, for limit-independent queries.
    #[must_use]
    pub fn resource_tracker(&self) -> &dyn ResourceTracker {
        &*self.tracker
    }

    /// Current nesting depth of user-level protocol calls.
    #[must_use]
    pub fn protocol_depth(&self) -> usize {
        self.protocol_depth
    }

    pub(crate) fn tracker_mut(&mut self) -> &mut dyn ResourceTracker {
        &mut *self.tracker
    }

    pub(crate) fn tracer_mut(&mut self) -> &mut dyn ArrayTracer {
        &mut *self.tracer
    }

    /// Runs one user-level protocol method under the re-entry guard.
    ///
    /// `call` returns `None` when the receiver doesn't implement the protocol,
    /// which surfaces as `Ok(None)`.
    pub(crate) fn call_protocol<R>(
        &mut self,
        type_name: &str,
        protocol: &'static str,
        call: impl FnOnce(&mut Self) -> Option<RunResult<R>>,
    ) -> RunResult<Option<R>> {
        self.tracker.check_recursion_depth(self.protocol_depth)?;
        self.tracer.on_protocol_call(type_name, protocol, self.protocol_depth);
        self.protocol_depth += 1;
        let result = call(self);
        self.protocol_depth -= 1;
        result.transpose()
    }
}
