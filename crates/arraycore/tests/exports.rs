use arraycore::{
    ArrayRef, ExcType, Interp, LimitedTracker, NativeExport, Range, RecordingTracer, ResourceLimits, ResourceTracker,
    RunError, SliceSpec, StderrTracer, TraceEvent, TypedArray, Value,
};
use pretty_assertions::assert_eq;

fn shared(typecode: &str, values: &[i64], interp: &mut Interp) -> ArrayRef {
    ArrayRef::new(TypedArray::construct(typecode, Some(&Value::int_list(values.iter().copied())), interp).unwrap())
}

fn as_ints(array: &TypedArray) -> Vec<i64> {
    array.tolist().unwrap().iter().map(|v| v.as_i64().unwrap()).collect()
}

fn assert_exported_error(err: &RunError) {
    assert_eq!(err.exc_type(), ExcType::BufferError);
    assert_eq!(err.message(), Some("Existing exports of data: object cannot be re-sized"));
}

#[test]
fn resize_is_refused_until_view_released() {
    let mut interp = Interp::new();
    let array = shared("i", &[1, 2, 3], &mut interp);
    let view = array.acquire_buffer_view(&mut interp).unwrap();
    assert_eq!(array.borrow().export_count(), 1);

    let err = array.borrow_mut().append(&Value::Int(4), &mut interp).unwrap_err();
    assert_exported_error(&err);
    let err = array.borrow_mut().pop(-1, &mut interp).unwrap_err();
    assert_exported_error(&err);
    let err = array.borrow_mut().insert(0, &Value::Int(0), &mut interp).unwrap_err();
    assert_exported_error(&err);
    let err = array.borrow_mut().repeat_in_place(2, &mut interp).unwrap_err();
    assert_exported_error(&err);
    assert_eq!(as_ints(&array.borrow()), vec![1, 2, 3]);

    view.release(&mut interp);
    assert_eq!(array.borrow().export_count(), 0);
    array.borrow_mut().append(&Value::Int(4), &mut interp).unwrap();
    assert_eq!(as_ints(&array.borrow()), vec![1, 2, 3, 4]);
}

#[test]
fn length_preserving_mutation_is_allowed_while_exported() {
    let mut interp = Interp::new();
    let array = shared("i", &[1, 2, 3, 4], &mut interp);
    let _view = array.acquire_buffer_view(&mut interp).unwrap();

    array.borrow_mut().setitem(0, &Value::Int(10), &mut interp).unwrap();
    array.borrow_mut().repeat_in_place(1, &mut interp).unwrap();
    array.borrow_mut().reverse();
    array.borrow_mut().byteswap();
    array.borrow_mut().byteswap();
    array.borrow_mut().extend(&Value::int_list([]), &mut interp).unwrap();

    let same_size = Value::from(TypedArray::construct("i", Some(&Value::int_list([7, 8])), &mut interp).unwrap());
    array
        .borrow_mut()
        .set_slice(&SliceSpec::range(0, 2), Some(&same_size), &mut interp)
        .unwrap();
    assert_eq!(as_ints(&array.borrow()), vec![7, 8, 2, 10]);

    let err = array
        .borrow_mut()
        .set_slice(&SliceSpec::range(0, 1), Some(&same_size), &mut interp)
        .unwrap_err();
    assert_exported_error(&err);
    let err = array
        .borrow_mut()
        .delete_slice(&SliceSpec::new(None, None, Some(2)), &mut interp)
        .unwrap_err();
    assert_exported_error(&err);
    assert_eq!(as_ints(&array.borrow()), vec![7, 8, 2, 10]);
}

#[test]
fn view_reads_and_writes_live_storage() {
    let mut interp = Interp::new();
    let array = shared("i", &[1, 2], &mut interp);
    let view = array.acquire_buffer_view(&mut interp).unwrap();
    assert_eq!(view.itemsize(), 4);
    assert_eq!(view.len_bytes().unwrap(), 8);

    view.write_bytes(4, &42i32.to_ne_bytes()).unwrap();
    assert_eq!(as_ints(&array.borrow()), vec![1, 42]);
    array.borrow_mut().setitem(0, &Value::Int(-3), &mut interp).unwrap();
    assert_eq!(view.read_bytes(0, 4).unwrap(), (-3i32).to_ne_bytes().to_vec());
    assert_eq!(view.with_bytes(<[u8]>::len).unwrap(), 8);

    let err = view.read_bytes(6, 4).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::IndexError);
    assert_eq!(err.message(), Some("buffer view access out of range"));
    let err = view.write_bytes(usize::MAX, &[0]).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::IndexError);
}

#[test]
fn dropping_a_view_releases_it() {
    let mut interp = Interp::new();
    let array = shared("b", &[1], &mut interp);
    {
        let _first = array.acquire_buffer_view(&mut interp).unwrap();
        let _second = array.acquire_buffer_view(&mut interp).unwrap();
        assert_eq!(array.borrow().export_count(), 2);
    }
    assert_eq!(array.borrow().export_count(), 0);
    array.borrow_mut().append(&Value::Int(2), &mut interp).unwrap();
}

#[test]
fn native_pointer_is_stable_and_matches_buffer_info() {
    let mut interp = Interp::new();
    let mut array = TypedArray::construct("d", Some(&Value::float_list([1.0, 2.0])), &mut interp).unwrap();
    let first = array.get_native_pointer(&mut interp);
    let second = array.get_native_pointer(&mut interp);
    assert_eq!(first.address(), second.address());
    assert_eq!(first.address(), array.buffer_info().0);
    assert_eq!(first.len_bytes(), 16);
    assert_eq!(array.export_count(), 2);

    first.release(&mut interp);
    let err = array.append(&Value::Float(3.0), &mut interp).unwrap_err();
    assert_exported_error(&err);
    second.release(&mut interp);
    array.append(&Value::Float(3.0), &mut interp).unwrap();
    assert_eq!(array.len(), 3);
}

#[test]
fn native_export_can_be_released_from_another_thread() {
    fn assert_send<T: Send>() {}
    assert_send::<NativeExport>();

    let mut interp = Interp::new();
    let mut array = TypedArray::construct("q", Some(&Value::int_list([1, 2, 3])), &mut interp).unwrap();
    let export = array.get_native_pointer(&mut interp);
    std::thread::spawn(move || drop(export)).join().unwrap();
    assert_eq!(array.export_count(), 0);
    array.append(&Value::Int(4), &mut interp).unwrap();
}

#[test]
fn storage_events_are_traced() {
    let mut interp = Interp::with_tracer(RecordingTracer::new());
    let mut array = TypedArray::construct("i", None, &mut interp).unwrap();
    for i in 1..=5 {
        array.append(&Value::Int(i), &mut interp).unwrap();
    }
    let array = ArrayRef::new(array);
    let view = array.acquire_buffer_view(&mut interp).unwrap();
    assert!(array.borrow_mut().append(&Value::Int(6), &mut interp).is_err());
    view.release(&mut interp);
    let native = array.borrow_mut().get_native_pointer(&mut interp);
    native.release(&mut interp);

    let events = interp.tracer::<RecordingTracer>().unwrap().events();
    assert_eq!(
        events,
        [
            TraceEvent::Reallocate {
                old_capacity: 0,
                new_capacity: 16
            },
            TraceEvent::Resize { old_len: 0, new_len: 1 },
            TraceEvent::Resize { old_len: 1, new_len: 2 },
            TraceEvent::Resize { old_len: 2, new_len: 3 },
            TraceEvent::Resize { old_len: 3, new_len: 4 },
            TraceEvent::Reallocate {
                old_capacity: 16,
                new_capacity: 32
            },
            TraceEvent::Resize { old_len: 4, new_len: 5 },
            TraceEvent::Export { exports: 1 },
            TraceEvent::Release { exports: 0 },
            TraceEvent::NativePin { bytes: 32 },
            TraceEvent::Export { exports: 1 },
            TraceEvent::Release { exports: 0 },
        ]
    );
}

/// Shrinking by 16 or more elements gives memory back; smaller shrinks keep the allocation.
#[test]
fn shrinking_follows_the_over_allocation_policy() {
    let mut interp = Interp::with_tracer(RecordingTracer::new());
    let mut array = TypedArray::construct("b", Some(&Value::Range(Range::to(40))), &mut interp).unwrap();
    array.delete_range(0, 30, &mut interp).unwrap();
    array.delete_range(0, 1, &mut interp).unwrap();
    assert_eq!(as_ints(&array), (31..40).collect::<Vec<_>>());

    let events = interp.tracer::<RecordingTracer>().unwrap().events();
    assert_eq!(
        events,
        [
            TraceEvent::Reallocate {
                old_capacity: 0,
                new_capacity: 40
            },
            TraceEvent::Resize { old_len: 0, new_len: 40 },
            TraceEvent::Reallocate {
                old_capacity: 40,
                new_capacity: 17
            },
            TraceEvent::Resize { old_len: 40, new_len: 10 },
            TraceEvent::Resize { old_len: 10, new_len: 9 },
        ]
    );
}

#[test]
fn array_size_limit_is_uncatchable() {
    let mut interp = Interp::with_limits(ResourceLimits::new().max_array_bytes(64));
    let mut array = TypedArray::construct("q", Some(&Value::int_list([1])), &mut interp).unwrap();
    let err = array.frombytes(&[0; 80], &mut interp).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::MemoryError);
    assert!(!err.is_instance_of(ExcType::MemoryError));
    assert_eq!(err.message(), Some("array size limit exceeded: 112 bytes > 64 bytes"));
    assert_eq!(as_ints(&array), vec![1]);

    let err = array.repeat(200_000, &mut interp).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::MemoryError);
}

#[test]
fn unrepresentable_sizes_are_catchable_memory_errors() {
    let mut interp = Interp::new();
    let array = TypedArray::construct("q", Some(&Value::int_list([1, 2])), &mut interp).unwrap();
    let err = array.repeat(i64::MAX, &mut interp).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::MemoryError);
    assert!(err.is_instance_of(ExcType::MemoryError));
    assert_eq!(err.message(), None);
}

#[test]
fn memory_is_accounted_per_interpreter() {
    let mut interp = Interp::with_limits(ResourceLimits::new().max_memory(1_000));
    let mut array = TypedArray::construct("i", None, &mut interp).unwrap();
    array.append(&Value::Int(1), &mut interp).unwrap();
    let tracker = interp.tracker::<LimitedTracker>().unwrap();
    assert_eq!(tracker.current_memory_bytes(), Some(16));
    assert_eq!(tracker.allocation_count(), Some(1));
    assert_eq!(interp.resource_tracker().current_memory_bytes(), Some(16));
    assert!(Interp::new().tracker::<LimitedTracker>().is_none());
}

#[test]
fn reserved_capacity_keeps_the_address() {
    let mut interp = Interp::new();
    let mut array = TypedArray::construct("b", None, &mut interp).unwrap();
    array.ensure_capacity(100, &mut interp).unwrap();
    assert!(array.is_empty());
    let (address, _) = array.buffer_info();
    assert_ne!(address, 0);
    for i in 0..100 {
        array.append(&Value::Int(i), &mut interp).unwrap();
    }
    assert_eq!(array.buffer_info(), (address, 100));
}

fn live_bytes(interp: &Interp) -> usize {
    interp.resource_tracker().current_memory_bytes().unwrap()
}

#[test]
fn native_export_outlives_its_array() {
    let mut interp = Interp::with_limits(ResourceLimits::new().max_memory(1_000));
    let mut array = TypedArray::construct("i", Some(&Value::int_list([1, 2, 3])), &mut interp).unwrap();
    let charged = live_bytes(&interp);
    assert!(charged >= 12);

    let export = array.get_native_pointer(&mut interp);
    let address = export.address();
    drop(array);
    assert!(export.is_live());
    assert_eq!(export.address(), address);
    assert_eq!(export.len_bytes(), 12);
    assert_eq!(live_bytes(&interp), charged);

    export.release(&mut interp);
    assert_eq!(live_bytes(&interp), 0);
}

#[test]
fn dropped_arrays_give_their_memory_back() {
    let mut interp = Interp::with_limits(ResourceLimits::new().max_memory(1_000));
    for round in 0..5 {
        let array = TypedArray::construct("b", Some(&Value::Bytes(vec![0; 600])), &mut interp).unwrap();
        assert_eq!(array.len(), 600, "round {round}");
        assert_eq!(live_bytes(&interp), 640, "round {round}");
        drop(array);
        assert_eq!(live_bytes(&interp), 0, "round {round}");
    }
}

#[test]
fn failed_construction_gives_its_memory_back() {
    let mut interp = Interp::with_limits(ResourceLimits::new().max_memory(1_000));
    let mut values = vec![0; 300];
    values.push(1_000);
    for _ in 0..3 {
        let err = TypedArray::construct("b", Some(&Value::int_list(values.iter().copied())), &mut interp).unwrap_err();
        assert_eq!(err.exc_type(), ExcType::OverflowError);
        assert_eq!(live_bytes(&interp), 0);
    }
}

#[test]
fn temporaries_give_their_memory_back() {
    let mut interp = Interp::with_limits(ResourceLimits::new().max_memory(3_000));
    let array = TypedArray::construct("b", Some(&Value::Bytes(vec![1; 400])), &mut interp).unwrap();
    let baseline = live_bytes(&interp);
    for _ in 0..10 {
        let copy = array.get_slice(&SliceSpec::full(), &mut interp).unwrap();
        let doubled = array.concat(&copy, &mut interp).unwrap();
        assert_eq!(doubled.len(), 800);
        drop((copy, doubled));
        let repeated = array.repeat(2, &mut interp).unwrap();
        let cloned = repeated.clone_array(&mut interp).unwrap();
        assert_eq!(cloned.len(), 800);
        drop((repeated, cloned));
        assert_eq!(live_bytes(&interp), baseline);
    }
}

#[test]
fn stderr_tracer_stops_at_its_limit() {
    let mut interp = Interp::with_tracer(StderrTracer::with_limit(2));
    let mut array = TypedArray::construct("h", None, &mut interp).unwrap();
    for i in 0..4 {
        array.append(&Value::Int(i), &mut interp).unwrap();
    }
    assert_eq!(interp.tracer::<StderrTracer>().unwrap().printed(), 2);
}
