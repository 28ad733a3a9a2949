use std::{cell::Cell, rc::Rc};

use arraycore::{
    ArrayRef, CompareOp, ExcType, FileLike, Interp, MemoryFile, PyObject, Range, RunResult, SliceSpec, TYPECODES,
    TypeCode, TypedArray, Value,
};
use pretty_assertions::assert_eq;

fn ints(typecode: &str, values: &[i64], interp: &mut Interp) -> TypedArray {
    TypedArray::construct(typecode, Some(&Value::int_list(values.iter().copied())), interp).unwrap()
}

fn as_ints(array: &TypedArray) -> Vec<i64> {
    array.tolist().unwrap().iter().map(|v| v.as_i64().unwrap()).collect()
}

fn as_floats(array: &TypedArray) -> Vec<f64> {
    array.tolist().unwrap().iter().map(|v| v.as_f64().unwrap()).collect()
}

/// Iterator object yielding `n, n-1, ..., 1`.
#[derive(Debug)]
struct Countdown(Cell<i64>);

impl PyObject for Countdown {
    fn type_name(&self) -> &str {
        "Countdown"
    }

    fn iter_next(&self, _interp: &mut Interp) -> Option<RunResult<Option<Value>>> {
        let n = self.0.get();
        if n == 0 {
            return Some(Ok(None));
        }
        self.0.set(n - 1);
        Some(Ok(Some(Value::int(n))))
    }
}

/// Representative in-range values for each typecode.
fn sample_values(typecode: TypeCode) -> Value {
    match typecode {
        TypeCode::I8 => Value::int_list([-128, -1, 0, 127]),
        TypeCode::U8 => Value::int_list([0, 1, 255]),
        TypeCode::I16 => Value::int_list([-32768, 0, 32767]),
        TypeCode::U16 => Value::int_list([0, 65535]),
        TypeCode::I32 => Value::int_list([i64::from(i32::MIN), 0, i64::from(i32::MAX)]),
        TypeCode::U32 => Value::int_list([0, i64::from(u32::MAX)]),
        TypeCode::Long | TypeCode::I64 => Value::int_list([i64::MIN, -1, 0, i64::MAX]),
        TypeCode::ULong | TypeCode::U64 => Value::List(vec![Value::Int(0), Value::from(u64::MAX)]),
        TypeCode::F32 => Value::float_list([0.5, -2.0, f64::INFINITY]),
        TypeCode::F64 => Value::float_list([0.1, -1e300, f64::NEG_INFINITY]),
        TypeCode::Unicode => Value::List(vec![Value::from('a'), Value::from('€'), Value::from('😀')]),
    }
}

#[test]
fn fromlist_then_tolist_reproduces_values_for_every_typecode() {
    let mut interp = Interp::new();
    for typecode in TypeCode::ALL {
        let values = sample_values(typecode);
        let mut array = TypedArray::new(typecode);
        array.fromlist(&values, &mut interp).unwrap();
        let back = Value::List(array.tolist().unwrap());
        assert_eq!(back.py_repr().unwrap(), values.py_repr().unwrap(), "typecode {typecode:?}");
    }
}

#[test]
fn typecodes_constant_lists_every_code() {
    let parsed: String = TypeCode::ALL.iter().map(|t| t.as_char()).collect();
    assert_eq!(parsed, TYPECODES);
}

#[test]
fn bad_typecodes() {
    let mut interp = Interp::new();
    let err = TypedArray::construct("x", None, &mut interp).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::ValueError);
    assert_eq!(
        err.message(),
        Some("bad typecode (must be b, B, u, h, H, i, I, l, L, q, Q, f or d)")
    );
    let err = TypedArray::construct("ii", None, &mut interp).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::TypeError);
}

/// `array('i', [1,2,3]) + array('i', [4,5])`, then `insert(0, 9)`, then delete indices 1..3.
#[test]
fn concat_insert_delete_scenario() {
    let mut interp = Interp::new();
    let left = ints("i", &[1, 2, 3], &mut interp);
    let right = ints("i", &[4, 5], &mut interp);
    let mut joined = left.concat(&right, &mut interp).unwrap();
    assert_eq!(as_ints(&joined), vec![1, 2, 3, 4, 5]);
    joined.insert(0, &Value::Int(9), &mut interp).unwrap();
    assert_eq!(as_ints(&joined), vec![9, 1, 2, 3, 4, 5]);
    joined.delete_range(1, 2, &mut interp).unwrap();
    assert_eq!(as_ints(&joined), vec![9, 3, 4, 5]);
}

#[test]
fn growth_primitives() {
    let mut interp = Interp::new();
    let mut array = ints("h", &[1, 2, 3], &mut interp);
    array.shift(1, 2, &mut interp).unwrap();
    assert_eq!(array.len(), 5);
    array.set(1, &Value::Int(8), &mut interp).unwrap();
    array.set(2, &Value::Int(9), &mut interp).unwrap();
    assert_eq!(as_ints(&array), vec![1, 8, 9, 2, 3]);

    array.set_length(2, &mut interp).unwrap();
    assert_eq!(as_ints(&array), vec![1, 8]);
    let err = array.shift(3, 1, &mut interp).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::IndexError);
}

#[test]
fn concat_requires_matching_typecodes() {
    let mut interp = Interp::new();
    let a = ints("i", &[1], &mut interp);
    let b = ints("h", &[1], &mut interp);
    let err = a.concat(&b, &mut interp).unwrap_err();
    assert_eq!(err.message(), Some("bad argument type for built-in operation"));
    let err = a.add(&Value::int_list([1]), &mut interp).unwrap_err();
    assert_eq!(err.message(), Some("can only append array (not \"list\") to array"));
}

#[test]
fn append_then_pop_round_trips() {
    let mut interp = Interp::new();
    for typecode in TypeCode::ALL {
        let Value::List(values) = sample_values(typecode) else { unreachable!() };
        let mut array = TypedArray::new(typecode);
        array.fromlist(&Value::List(values.clone()), &mut interp).unwrap();
        let before = array.len();
        for value in &values {
            array.append(value, &mut interp).unwrap();
            let popped = array.pop(-1, &mut interp).unwrap();
            assert_eq!(popped.py_repr().unwrap(), value.py_repr().unwrap());
            assert_eq!(array.len(), before);
        }
    }
}

#[test]
fn pop_errors() {
    let mut interp = Interp::new();
    let mut array = TypedArray::new(TypeCode::I32);
    let err = array.pop(-1, &mut interp).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::IndexError);
    assert_eq!(err.message(), Some("pop from empty array"));

    let mut array = ints("i", &[1, 2], &mut interp);
    let err = array.pop(2, &mut interp).unwrap_err();
    assert_eq!(err.message(), Some("pop index out of range"));
    assert_eq!(array.pop(0, &mut interp).unwrap().as_i64(), Some(1));
    assert_eq!(as_ints(&array), vec![2]);
}

#[test]
fn insert_checks_value_before_moving_memory() {
    let mut interp = Interp::new();
    let mut array = ints("b", &[1, 2, 3], &mut interp);
    let err = array.insert(1, &Value::Int(300), &mut interp).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::OverflowError);
    assert_eq!(err.message(), Some("signed char is greater than maximum"));
    assert_eq!(as_ints(&array), vec![1, 2, 3]);
}

#[test]
fn insert_clamps_index() {
    let mut interp = Interp::new();
    let mut array = ints("i", &[1, 2, 3], &mut interp);
    array.insert(-100, &Value::Int(7), &mut interp).unwrap();
    array.insert(100, &Value::Int(8), &mut interp).unwrap();
    array.insert(-1, &Value::Int(0), &mut interp).unwrap();
    assert_eq!(as_ints(&array), vec![7, 1, 2, 3, 0, 8]);
}

#[test]
fn element_access_and_assignment() {
    let mut interp = Interp::new();
    let mut array = ints("H", &[10, 20, 30], &mut interp);
    assert_eq!(array.getitem(-1).unwrap().as_i64(), Some(30));
    let err = array.getitem(3).unwrap_err();
    assert_eq!(err.message(), Some("array index out of range"));

    array.setitem(-3, &Value::Int(11), &mut interp).unwrap();
    let err = array.setitem(5, &Value::Int(1), &mut interp).unwrap_err();
    assert_eq!(err.message(), Some("array assignment index out of range"));
    let err = array.set(0, &Value::Int(-1), &mut interp).unwrap_err();
    assert_eq!(err.message(), Some("unsigned short is less than minimum"));
    assert_eq!(as_ints(&array), vec![11, 20, 30]);

    array.delete(1, &mut interp).unwrap();
    assert_eq!(as_ints(&array), vec![11, 30]);
}

#[test]
fn remove_index_count_contains() {
    let mut interp = Interp::new();
    let mut array = ints("i", &[5, 1, 5, 2, 5], &mut interp);
    assert_eq!(array.index(&Value::Int(5), Some(1), None, &mut interp).unwrap(), 2);
    assert_eq!(array.index(&Value::Int(5), Some(-2), None, &mut interp).unwrap(), 4);
    assert_eq!(array.count(&Value::Int(5), &mut interp).unwrap(), 3);
    assert!(array.contains(&Value::Float(2.0), &mut interp).unwrap());
    assert!(!array.contains(&Value::from("2"), &mut interp).unwrap());

    let err = array.index(&Value::Int(2), None, Some(3), &mut interp).unwrap_err();
    assert_eq!(err.message(), Some("array.index(x): x not in array"));

    array.remove(&Value::Int(5), &mut interp).unwrap();
    assert_eq!(as_ints(&array), vec![1, 5, 2, 5]);
    let err = array.remove(&Value::Int(9), &mut interp).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::ValueError);
    assert_eq!(err.message(), Some("array.remove(x): x not in array"));
}

#[test]
fn nan_is_never_found() {
    let mut interp = Interp::new();
    let array = TypedArray::construct("d", Some(&Value::float_list([f64::NAN])), &mut interp).unwrap();
    assert_eq!(array.count(&Value::Float(f64::NAN), &mut interp).unwrap(), 0);
}

#[test]
fn reverse_and_byteswap_are_involutions() {
    let mut interp = Interp::new();
    for typecode in TypeCode::ALL {
        let mut array = TypedArray::with_initializer(typecode, Some(&sample_values(typecode)), &mut interp).unwrap();
        let original = array.tobytes();
        array.reverse();
        if array.len() > 1 {
            assert_ne!(array.tobytes(), original);
        }
        array.reverse();
        assert_eq!(array.tobytes(), original);
        array.byteswap();
        array.byteswap();
        assert_eq!(array.tobytes(), original);
    }
}

#[test]
fn byteswap_swaps_within_elements() {
    let mut interp = Interp::new();
    let mut array = ints("h", &[1], &mut interp);
    array.byteswap();
    assert_eq!(as_ints(&array), vec![256]);
    let mut bytes = ints("B", &[1, 2], &mut interp);
    bytes.byteswap();
    assert_eq!(as_ints(&bytes), vec![1, 2]);
}

#[test]
fn extend_with_itself_doubles() {
    let mut interp = Interp::new();
    let shared = ArrayRef::new(ints("q", &[1, 2, 3], &mut interp));
    let alias = Value::Array(shared.clone());
    shared.borrow_mut().extend(&alias, &mut interp).unwrap();
    assert_eq!(as_ints(&shared.borrow()), vec![1, 2, 3, 1, 2, 3]);
    shared.borrow_mut().concat_in_place(&alias, &mut interp).unwrap();
    assert_eq!(shared.borrow().len(), 12);
}

#[test]
fn extend_rejects_other_kinds_of_array() {
    let mut interp = Interp::new();
    let mut array = ints("i", &[1], &mut interp);
    let other = Value::from(ints("l", &[2], &mut interp));
    let err = array.extend(&other, &mut interp).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::TypeError);
    assert_eq!(err.message(), Some("can only extend with array of same kind"));
    let err = array.concat_in_place(&Value::int_list([1]), &mut interp).unwrap_err();
    assert_eq!(err.message(), Some("can only extend array with array (not \"list\")"));
}

#[test]
fn extend_from_iterable_keeps_items_before_a_failure() {
    let mut interp = Interp::new();
    let mut array = TypedArray::new(TypeCode::I32);
    let items = Value::List(vec![Value::Int(1), Value::Int(2), Value::from("x"), Value::Int(4)]);
    let err = array.extend(&items, &mut interp).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::TypeError);
    assert_eq!(as_ints(&array), vec![1, 2]);
}

#[test]
fn fromlist_is_all_or_nothing() {
    let mut interp = Interp::new();
    let mut array = ints("i", &[7], &mut interp);
    let items = Value::List(vec![Value::Int(1), Value::Int(2), Value::from("x")]);
    assert!(array.fromlist(&items, &mut interp).is_err());
    assert_eq!(as_ints(&array), vec![7]);
    let err = array.fromlist(&Value::Int(1), &mut interp).unwrap_err();
    assert_eq!(err.message(), Some("arg must be list"));
}

#[test]
fn construct_from_range() {
    let mut interp = Interp::new();
    let range = Value::Range(Range::new(0, 10, 3).unwrap());
    let array = TypedArray::construct("h", Some(&range), &mut interp).unwrap();
    assert_eq!(as_ints(&array), vec![0, 3, 6, 9]);

    let down = Value::Range(Range::new(5, 0, -2).unwrap());
    let array = TypedArray::construct("d", Some(&down), &mut interp).unwrap();
    assert_eq!(as_floats(&array), vec![5.0, 3.0, 1.0]);

    let err = TypedArray::construct("b", Some(&Value::Range(Range::new(120, 130, 1).unwrap())), &mut interp)
        .unwrap_err();
    assert_eq!(err.exc_type(), ExcType::OverflowError);
}

#[test]
fn construct_from_text_and_bytes() {
    let mut interp = Interp::new();
    let text = TypedArray::construct("u", Some(&Value::from("h€llo")), &mut interp).unwrap();
    assert_eq!(text.len(), 5);
    assert_eq!(text.tounicode().unwrap(), "h€llo");

    let err = TypedArray::construct("i", Some(&Value::from("abc")), &mut interp).unwrap_err();
    assert_eq!(
        err.message(),
        Some("cannot use a str to initialize an array with typecode 'i'")
    );

    let mut raw = Vec::new();
    raw.extend_from_slice(&1i16.to_ne_bytes());
    raw.extend_from_slice(&(-2i16).to_ne_bytes());
    let shorts = TypedArray::construct("h", Some(&Value::Bytes(raw)), &mut interp).unwrap();
    assert_eq!(as_ints(&shorts), vec![1, -2]);
}

#[test]
fn construct_from_array_converts_each_element() {
    let mut interp = Interp::new();
    let source = Value::from(ints("i", &[1, 2], &mut interp));
    let doubles = TypedArray::construct("d", Some(&source), &mut interp).unwrap();
    assert_eq!(as_floats(&doubles), vec![1.0, 2.0]);

    let floats = Value::from(doubles);
    let err = TypedArray::construct("i", Some(&floats), &mut interp).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::TypeError);

    let text = Value::from(TypedArray::construct("u", Some(&Value::from("ab")), &mut interp).unwrap());
    let err = TypedArray::construct("i", Some(&text), &mut interp).unwrap_err();
    assert_eq!(
        err.message(),
        Some("cannot use a unicode array to initialize an array with typecode 'i'")
    );

    let big = Value::from(ints("q", &[1_000], &mut interp));
    let err = TypedArray::construct("b", Some(&big), &mut interp).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::OverflowError);
}

#[test]
fn construct_from_iterator_object() {
    let mut interp = Interp::new();
    let source = Value::Object(Rc::new(Countdown(Cell::new(3))));
    let array = TypedArray::construct("l", Some(&source), &mut interp).unwrap();
    assert_eq!(as_ints(&array), vec![3, 2, 1]);

    let err = TypedArray::construct("l", Some(&Value::Int(3)), &mut interp).unwrap_err();
    assert_eq!(err.message(), Some("'int' object is not iterable"));
}

#[test]
fn repeat_variants() {
    let mut interp = Interp::new();
    let array = ints("i", &[1, 2], &mut interp);
    assert_eq!(as_ints(&array.repeat(3, &mut interp).unwrap()), vec![1, 2, 1, 2, 1, 2]);
    assert!(array.repeat(-4, &mut interp).unwrap().is_empty());

    let mut in_place = ints("i", &[4, 5, 6], &mut interp);
    in_place.repeat_in_place(2, &mut interp).unwrap();
    assert_eq!(as_ints(&in_place), vec![4, 5, 6, 4, 5, 6]);
    in_place.repeat_in_place(0, &mut interp).unwrap();
    assert!(in_place.is_empty());
}

#[test]
fn equality_short_circuits_on_length() {
    let mut interp = Interp::new();
    let a = ints("i", &[1, 2], &mut interp);
    let b = ints("i", &[1, 2, 3], &mut interp);
    assert!(!a.compare(&b, CompareOp::Eq).unwrap());
    assert!(a.compare(&b, CompareOp::Ne).unwrap());
    assert!(a.compare(&b, CompareOp::Lt).unwrap());
    assert!(a.compare(&a, CompareOp::Eq).unwrap());
    assert!(a.compare(&a, CompareOp::Le).unwrap());

    let c = ints("i", &[1, 3], &mut interp);
    let d = ints("i", &[1, 2, 3], &mut interp);
    assert!(d.compare(&c, CompareOp::Lt).unwrap());
    assert!(!d.compare(&c, CompareOp::Ge).unwrap());
}

#[test]
fn mixed_typecodes_compare_by_value() {
    let mut interp = Interp::new();
    let a = ints("i", &[1, 2], &mut interp);
    let b = TypedArray::construct("d", Some(&Value::float_list([1.0, 2.0])), &mut interp).unwrap();
    assert!(a.compare(&b, CompareOp::Eq).unwrap());

    let text = TypedArray::construct("u", Some(&Value::from("a")), &mut interp).unwrap();
    assert!(!a.compare(&text, CompareOp::Eq).unwrap());
    let err = a.compare(&text, CompareOp::Lt).unwrap_err();
    assert_eq!(
        err.message(),
        Some("'<' not supported between instances of 'int' and 'str'")
    );
}

/// `array('d', [1.0, nan])` is not equal to itself.
#[test]
fn nan_makes_double_array_unequal_to_itself() {
    let mut interp = Interp::new();
    let array = TypedArray::construct("d", Some(&Value::float_list([1.0, f64::NAN])), &mut interp).unwrap();
    assert!(!array.compare(&array, CompareOp::Eq).unwrap());
    assert!(array.compare(&array, CompareOp::Ne).unwrap());

    let shared = Value::from(array);
    assert!(!arraycore::py_eq(&shared, &shared, &mut interp).unwrap());
}

#[test]
fn unicode_conversions() {
    let mut interp = Interp::new();
    let mut text = TypedArray::new(TypeCode::Unicode);
    text.fromunicode("ab", &mut interp).unwrap();
    text.append(&Value::from('c'), &mut interp).unwrap();
    assert_eq!(text.tounicode().unwrap(), "abc");

    let mut numbers = TypedArray::new(TypeCode::I32);
    let err = numbers.fromunicode("ab", &mut interp).unwrap_err();
    assert_eq!(
        err.message(),
        Some("fromunicode() may only be called on unicode type arrays")
    );
    assert_eq!(numbers.tounicode().unwrap_err().exc_type(), ExcType::ValueError);
}

#[test]
fn reprs() {
    let mut interp = Interp::new();
    let doubles = TypedArray::construct("d", Some(&Value::float_list([1.0, 0.5, 1e16])), &mut interp).unwrap();
    assert_eq!(doubles.py_repr().unwrap(), "array('d', [1.0, 0.5, 1e+16])");
    let text = TypedArray::construct("u", Some(&Value::from("ab")), &mut interp).unwrap();
    assert_eq!(text.py_repr().unwrap(), "array('u', 'ab')");
    assert_eq!(TypedArray::new(TypeCode::F32).py_repr().unwrap(), "array('f')");
    let unsigned = TypedArray::construct("Q", Some(&Value::List(vec![Value::from(u64::MAX)])), &mut interp).unwrap();
    assert_eq!(unsigned.py_repr().unwrap(), "array('Q', [18446744073709551615])");
}

#[test]
fn file_round_trip() {
    let mut interp = Interp::new();
    let array = ints("i", &[1, -2, 3], &mut interp);
    let mut file = MemoryFile::new();
    array.tofile(&mut file, &mut interp).unwrap();
    assert_eq!(file.getvalue(), array.tobytes().as_slice());

    file.seek(0).unwrap();
    let mut back = TypedArray::new(TypeCode::I32);
    back.fromfile(&mut file, 3, &mut interp).unwrap();
    assert_eq!(as_ints(&back), vec![1, -2, 3]);
}

#[test]
fn fromfile_short_read_keeps_complete_elements() {
    let mut interp = Interp::new();
    let mut file = MemoryFile::with_contents(vec![1; 10]);
    let mut array = TypedArray::new(TypeCode::I32);
    let err = array.fromfile(&mut file, 3, &mut interp).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::EOFError);
    assert_eq!(err.message(), Some("read() didn't return enough bytes"));
    assert_eq!(array.len(), 2);

    let err = array.fromfile(&mut file, -1, &mut interp).unwrap_err();
    assert_eq!(err.message(), Some("negative count"));
}

#[test]
fn tofile_writes_large_arrays_in_blocks() {
    #[derive(Default)]
    struct BlockCounter {
        blocks: Vec<usize>,
    }
    impl FileLike for BlockCounter {
        fn read(&mut self, _size: usize, _interp: &mut Interp) -> RunResult<Vec<u8>> {
            Ok(Vec::new())
        }
        fn write(&mut self, data: &[u8], _interp: &mut Interp) -> RunResult<()> {
            self.blocks.push(data.len());
            Ok(())
        }
    }

    let mut interp = Interp::new();
    let array = TypedArray::construct("d", Some(&Value::Range(Range::to(10_000))), &mut interp).unwrap();
    let mut counter = BlockCounter::default();
    array.tofile(&mut counter, &mut interp).unwrap();
    assert_eq!(counter.blocks, vec![65_536, 14_464]);
}

#[test]
fn buffer_info_reports_length() {
    let mut interp = Interp::new();
    assert_eq!(TypedArray::new(TypeCode::I8).buffer_info(), (0, 0));
    let array = ints("b", &[1, 2, 3], &mut interp);
    let (address, len) = array.buffer_info();
    assert_ne!(address, 0);
    assert_eq!(len, 3);
}

#[test]
fn iterators_are_snapshots() {
    let mut interp = Interp::new();
    let mut array = ints("i", &[1, 2, 3], &mut interp);
    let forward = array.iter();
    array.append(&Value::Int(4), &mut interp).unwrap();
    let seen: Vec<i64> = forward.map(|v| v.unwrap().as_i64().unwrap()).collect();
    assert_eq!(seen, vec![1, 2, 3]);
    let backward: Vec<i64> = array.reversed().map(|v| v.unwrap().as_i64().unwrap()).collect();
    assert_eq!(backward, vec![4, 3, 2, 1]);
}

#[test]
fn clone_is_independent() {
    let mut interp = Interp::new();
    let array = ints("i", &[1, 2], &mut interp);
    let mut copy = array.clone_array(&mut interp).unwrap();
    copy.append(&Value::Int(3), &mut interp).unwrap();
    assert_eq!(as_ints(&array), vec![1, 2]);
    assert_eq!(as_ints(&copy), vec![1, 2, 3]);
}

#[test]
fn slice_of_shared_handle() {
    let mut interp = Interp::new();
    let shared = ArrayRef::new(ints("i", &[1, 2, 3, 4], &mut interp));
    let tail = shared.borrow().get_slice(&SliceSpec::range(2, 4), &mut interp).unwrap();
    assert_eq!(as_ints(&tail), vec![3, 4]);
}
