#![doc = include_str!("../../../README.md")]
#![expect(clippy::cast_possible_truncation, reason = "narrowing casts follow range checks")]
#![expect(clippy::cast_sign_loss, reason = "two's-complement reinterpretation is intentional")]
#![expect(clippy::cast_possible_wrap, reason = "wrap behavior mirrors CPython")]

mod array;
mod coerce;
mod exception;
mod identity;
mod interp;
mod io;
mod object;
pub mod py_hash;
mod resource;
pub mod tracer;
mod types;
mod value;

pub use crate::{
    array::{
        ArrayIter, ArrayRef, BufferView, CompareOp, ElementBytes, ElementKind, MachineFormat, NativeExport,
        ReduceState, SliceIndices, SliceSpec, TYPECODES, TypeCode, TypedArray, array_reconstructor, check_element,
        pack_element, unpack_element,
    },
    coerce::{
        to_bigint, to_f64_exact, to_f64_lossy, to_i32_exact, to_i32_lossy, to_i64_exact, to_i64_lossy, to_u64_exact,
        to_u64_lossy,
    },
    exception::{ExcType, RunError, RunResult, SimpleException},
    identity::{is_same, numeric_cmp, numeric_eq, py_compare, py_eq, py_hash},
    interp::Interp,
    io::{FileLike, MemoryFile},
    object::PyObject,
    resource::{
        DEFAULT_MAX_PROTOCOL_DEPTH, FreedBytes, LARGE_RESULT_THRESHOLD, LimitedTracker, NoLimitTracker, ResourceError,
        ResourceLimits, ResourceTracker,
    },
    tracer::{
        ArrayTracer, NoopTracer, ProfilingReport, ProfilingTracer, RecordingTracer, StderrTracer, TraceEvent,
    },
    types::{LongInt, Range, Type},
    value::{Value, float_repr},
};
