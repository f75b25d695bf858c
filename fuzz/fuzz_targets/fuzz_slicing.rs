#![no_main]

use arbitrary::Arbitrary;
use arrayproxy::{ArrayProxy, Value};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum Op {
    Get(i64),
    Set(i64, i64),
    Range(i64, i64, bool),
    Pair(i64, i64),
    Concat(Vec<i16>),
    Includes(i64),
}

#[derive(Arbitrary, Debug)]
struct Input {
    initial: Vec<i16>,
    ops: Vec<Op>,
}

fuzz_target!(|input: Input| {
    let proxy = ArrayProxy::from_native(input.initial);
    let len = proxy.len();
    for op in input.ops {
        match op {
            Op::Get(i) => {
                let _ = proxy.get(i);
            }
            Op::Set(i, v) => {
                let _ = proxy.set(i, Value::from(v));
            }
            Op::Range(first, last, exclude_end) => {
                assert!(proxy.slice_range(first, last, exclude_end).len() <= len);
            }
            Op::Pair(first, length) => {
                if let Ok(slice) = proxy.slice_pair(first, length) {
                    assert!(slice.len() <= len);
                }
            }
            Op::Concat(tail) => {
                let tail = Value::Proxy(ArrayProxy::from_native(tail));
                let _ = proxy.concat(&tail);
            }
            Op::Includes(probe) => {
                let _ = proxy.includes(&Value::from(probe));
            }
        }
        assert_eq!(proxy.len(), len);
    }
});
