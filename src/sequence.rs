//! Iteration, counting, digging and rendering

use std::fmt::{self, Debug, Display, Formatter};
use std::iter::FusedIterator;

use crate::error::{ProxyError, Result};
use crate::native::NativeArray;
use crate::proxy::ArrayProxy;
use crate::value::inspect_float;
use crate::Value;

/// A callback passed to the iteration methods. The variant is the block's
/// arity and selects how each element is passed.
pub enum Block<'a> {
    /// Receives one value
    Unary(&'a mut dyn FnMut(Value) -> Result<Value>),
    /// Receives two values
    Binary(&'a mut dyn FnMut(Value, Value) -> Result<Value>),
}

impl Debug for Block<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Block::Unary(_) => f.write_str("Block::Unary"),
            Block::Binary(_) => f.write_str("Block::Binary"),
        }
    }
}

/// Outcome of an iteration method.
#[derive(Debug)]
pub enum Iteration {
    /// The block ran over every element; holds the receiver.
    Completed(ArrayProxy),
    /// No block was given.
    Enumerator(Enumerator),
}

/// The iteration method an [`Enumerator`] replays.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EnumMethod {
    /// Yields each element
    Each,
    /// Yields `[element, index]` pairs
    EachWithIndex,
}

impl EnumMethod {
    /// Name of the method.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            EnumMethod::Each => "each",
            EnumMethod::EachWithIndex => "each_with_index",
        }
    }
}

fn index_value(i: usize) -> Value {
    Value::Integer(i64::try_from(i).unwrap_or(i64::MAX))
}

/// A restartable cursor over a proxy.
///
/// Elements are read from the storage as the cursor advances, so writes made
/// after the enumerator was created are observed.
#[derive(Clone, Debug)]
pub struct Enumerator {
    receiver: ArrayProxy,
    method: EnumMethod,
    cursor: usize,
}

impl Enumerator {
    /// Creates a cursor positioned before the first element.
    #[must_use]
    pub fn new(receiver: ArrayProxy, method: EnumMethod) -> Self {
        Enumerator {
            receiver,
            method,
            cursor: 0,
        }
    }

    /// The proxy being enumerated.
    #[must_use]
    pub fn receiver(&self) -> &ArrayProxy {
        &self.receiver
    }

    /// The method this enumerator replays.
    #[must_use]
    pub fn method(&self) -> EnumMethod {
        self.method
    }

    /// Returns `true` if another element remains.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.cursor < self.receiver.len()
    }

    /// Moves the cursor back before the first element.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Total number of elements, regardless of the cursor position.
    #[must_use]
    pub fn size(&self) -> usize {
        self.receiver.len()
    }
}

impl Iterator for Enumerator {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let element = self.receiver.element(self.cursor)?;
        let item = match self.method {
            EnumMethod::Each => element,
            EnumMethod::EachWithIndex => Value::pair(element, index_value(self.cursor)),
        };
        self.cursor += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.receiver.len().saturating_sub(self.cursor);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Enumerator {}

impl FusedIterator for Enumerator {}

/// Splits a sequence element over two block parameters.
fn splat(element: Value) -> (Value, Value) {
    match element.to_vec() {
        Some(items) => {
            let mut items = items.into_iter();
            (
                items.next().unwrap_or_default(),
                items.next().unwrap_or_default(),
            )
        }
        None => (element, Value::Nil),
    }
}

impl ArrayProxy {
    /// Calls `block` with each element in ascending order. A binary block
    /// receives a sequence element splatted over its two parameters.
    ///
    /// The storage is not borrowed while the block runs, so the block may
    /// write to this array.
    pub fn each(&self, block: Option<Block<'_>>) -> Result<Iteration> {
        let Some(block) = block else {
            return Ok(Iteration::Enumerator(Enumerator::new(
                self.clone(),
                EnumMethod::Each,
            )));
        };
        let mut i = 0;
        match block {
            Block::Unary(f) => {
                while let Some(element) = self.element(i) {
                    f(element)?;
                    i += 1;
                }
            }
            Block::Binary(f) => {
                while let Some(element) = self.element(i) {
                    let (first, second) = splat(element);
                    f(first, second)?;
                    i += 1;
                }
            }
        }
        Ok(Iteration::Completed(self.clone()))
    }

    /// Calls `block` with each element and its index. A unary block receives
    /// the `[element, index]` pair as one sequence.
    pub fn each_with_index(&self, block: Option<Block<'_>>) -> Result<Iteration> {
        let Some(block) = block else {
            return Ok(Iteration::Enumerator(Enumerator::new(
                self.clone(),
                EnumMethod::EachWithIndex,
            )));
        };
        let mut i = 0;
        match block {
            Block::Unary(f) => {
                while let Some(element) = self.element(i) {
                    f(Value::pair(element, index_value(i)))?;
                    i += 1;
                }
            }
            Block::Binary(f) => {
                while let Some(element) = self.element(i) {
                    f(element, index_value(i))?;
                    i += 1;
                }
            }
        }
        Ok(Iteration::Completed(self.clone()))
    }

    /// A cursor over the elements.
    #[must_use]
    pub fn iter(&self) -> Enumerator {
        Enumerator::new(self.clone(), EnumMethod::Each)
    }

    /// The first element, nil when empty.
    #[must_use]
    pub fn first(&self) -> Value {
        self.element(0).unwrap_or_default()
    }

    /// The first `n` elements as a new sequence; `n` is clamped to the
    /// array length and negative `n` gives an empty sequence.
    #[must_use]
    pub fn first_n(&self, n: i64) -> Value {
        let take = clamp_count(n, self.len());
        Value::array(self.iter().take(take).collect())
    }

    /// The last element, nil when empty.
    #[must_use]
    pub fn last(&self) -> Value {
        match self.len() {
            0 => Value::Nil,
            len => self.element(len - 1).unwrap_or_default(),
        }
    }

    /// The last `n` elements as a new sequence, clamped like
    /// [`ArrayProxy::first_n`].
    #[must_use]
    pub fn last_n(&self, n: i64) -> Value {
        let len = self.len();
        let take = clamp_count(n, len);
        let items = (len - take..len).filter_map(|i| self.element(i)).collect();
        Value::array(items)
    }

    /// Number of elements.
    #[must_use]
    pub fn count(&self) -> usize {
        self.len()
    }

    /// Number of elements for which `predicate` returns a truthy value.
    pub fn count_where(&self, mut predicate: impl FnMut(Value) -> Result<Value>) -> Result<usize> {
        let mut count = 0;
        let mut i = 0;
        while let Some(element) = self.element(i) {
            if predicate(element)?.is_truthy() {
                count += 1;
            }
            i += 1;
        }
        Ok(count)
    }

    /// Number of elements `==` to `probe`.
    #[must_use]
    pub fn count_of(&self, probe: &Value) -> usize {
        self.iter().filter(|element| element == probe).count()
    }

    /// Reads the element at the first index of `path` leniently, then digs
    /// the rest of the path out of that element.
    pub fn dig(&self, path: &[Value]) -> Result<Value> {
        let (first, rest) = path.split_first().ok_or_else(|| {
            ProxyError::TypeMismatch("wrong number of arguments (given 0, expected 1+)".into())
        })?;
        let element = self.at(first)?;
        if rest.is_empty() {
            Ok(element)
        } else {
            element.dig(rest)
        }
    }

    /// Copies the elements into a dynamic sequence. Nested native arrays
    /// are converted as well, except an array nested inside itself, which
    /// stays a proxy.
    #[must_use]
    pub fn to_a(&self) -> Value {
        self.to_a_within(&mut Vec::new())
    }

    fn to_a_within(&self, open: &mut Vec<usize>) -> Value {
        open.push(self.storage().addr());
        let items = self
            .iter()
            .map(|element| match element {
                Value::Proxy(nested) if !open.contains(&nested.storage().addr()) => {
                    nested.to_a_within(open)
                }
                other => other,
            })
            .collect();
        open.pop();
        Value::array(items)
    }

    /// Renders the array as `kind[e1, e2, ...]@hash`.
    #[must_use]
    pub fn inspect(&self) -> String {
        self.inspect_within(&mut Vec::new())
    }

    pub(crate) fn inspect_within(&self, open: &mut Vec<usize>) -> String {
        let addr = self.storage().addr();
        if open.contains(&addr) {
            return format!("{}[...]", self.kind());
        }
        open.push(addr);
        let items = render_slots(&self.storage().read(), open);
        open.pop();
        format!(
            "{}[{}]@{:x}",
            self.kind(),
            items.join(", "),
            self.hash_code() as u32
        )
    }
}

fn clamp_count(n: i64, len: usize) -> usize {
    usize::try_from(n).map_or(0, |n| n.min(len))
}

fn render_f32(v: f32) -> String {
    if v.is_finite() {
        format!("{:?}", v)
    } else {
        inspect_float(f64::from(v))
    }
}

fn render_char(unit: u16) -> String {
    char::from_u32(u32::from(unit)).map_or_else(|| unit.to_string(), String::from)
}

fn render_slots(array: &NativeArray, open: &mut Vec<usize>) -> Vec<String> {
    fn render<T>(slots: &[T], f: impl FnMut(&T) -> String) -> Vec<String> {
        slots.iter().map(f).collect()
    }
    match array {
        NativeArray::Byte(s) => render(s, ToString::to_string),
        NativeArray::Short(s) => render(s, ToString::to_string),
        NativeArray::Char(s) => render(s, |v| render_char(*v)),
        NativeArray::Int(s) => render(s, ToString::to_string),
        NativeArray::Long(s) => render(s, ToString::to_string),
        NativeArray::Float(s) => render(s, |v| render_f32(*v)),
        NativeArray::Double(s) => render(s, |v| inspect_float(*v)),
        NativeArray::Boolean(s) => render(s, ToString::to_string),
        NativeArray::Object(s) => render(s, |v| v.inspect_within(open)),
    }
}

impl Display for ArrayProxy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inspect())
    }
}

impl<'a> IntoIterator for &'a ArrayProxy {
    type Item = Value;
    type IntoIter = Enumerator;

    fn into_iter(self) -> Enumerator {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::ElementKind;

    fn ints(values: &[i32]) -> ArrayProxy {
        ArrayProxy::from_native(values.to_vec())
    }

    #[mockalloc::test]
    fn each_passes_elements_in_order() {
        let proxy = ints(&[1, 2, 3]);
        let mut seen = Vec::new();
        let mut collect = |v: Value| -> Result<Value> {
            seen.push(v);
            Ok(Value::Nil)
        };
        let result = proxy.each(Some(Block::Unary(&mut collect))).unwrap();
        assert!(matches!(result, Iteration::Completed(p) if p == proxy));
        assert_eq!(seen, vec![Value::from(1), Value::from(2), Value::from(3)]);
    }

    #[mockalloc::test]
    fn binary_each_splats_sequences() {
        let proxy = ArrayProxy::from_values(
            ElementKind::Object,
            &[Value::pair(1.into(), 2.into()), 3.into()],
        )
        .unwrap();
        let mut seen = Vec::new();
        let mut collect = |a: Value, b: Value| -> Result<Value> {
            seen.push((a, b));
            Ok(Value::Nil)
        };
        proxy.each(Some(Block::Binary(&mut collect))).unwrap();
        assert_eq!(
            seen,
            vec![
                (Value::from(1), Value::from(2)),
                (Value::from(3), Value::Nil)
            ]
        );
    }

    #[mockalloc::test]
    fn each_with_index_arity() {
        let proxy = ints(&[10, 20]);

        let mut pairs = Vec::new();
        let mut unary = |v: Value| -> Result<Value> {
            pairs.push(v);
            Ok(Value::Nil)
        };
        proxy.each_with_index(Some(Block::Unary(&mut unary))).unwrap();
        assert_eq!(pairs[1], Value::pair(20.into(), 1.into()));

        let mut total = 0;
        let mut binary = |v: Value, i: Value| -> Result<Value> {
            total += v.as_i64().unwrap() * i.as_i64().unwrap();
            Ok(Value::Nil)
        };
        proxy.each_with_index(Some(Block::Binary(&mut binary))).unwrap();
        assert_eq!(total, 20);
    }

    #[mockalloc::test]
    fn blocks_may_write_to_the_receiver() {
        let proxy = ints(&[1, 2, 3]);
        let target = proxy.clone();
        let mut i = 0;
        let mut double = |v: Value| -> Result<Value> {
            let doubled = Value::from(v.as_i64().unwrap() * 2);
            target.set(i, doubled)?;
            i += 1;
            Ok(Value::Nil)
        };
        proxy.each(Some(Block::Unary(&mut double))).unwrap();
        assert_eq!(proxy.elements(), vec![Value::from(2), Value::from(4), Value::from(6)]);
    }

    #[mockalloc::test]
    fn block_errors_stop_iteration() {
        let proxy = ints(&[1, 2, 3]);
        let mut calls = 0;
        let mut fail = |_: Value| -> Result<Value> {
            calls += 1;
            Err(ProxyError::TypeMismatch("stop".into()))
        };
        assert!(proxy.each(Some(Block::Unary(&mut fail))).is_err());
        assert_eq!(calls, 1);
    }

    #[mockalloc::test]
    fn enumerators_are_restartable() {
        let proxy = ints(&[1, 2]);
        let Iteration::Enumerator(mut e) = proxy.each_with_index(None).unwrap() else {
            panic!("expected an enumerator")
        };
        assert_eq!(e.method().name(), "each_with_index");
        assert_eq!(e.size(), 2);
        assert_eq!(e.len(), 2);
        assert_eq!(e.next(), Some(Value::pair(1.into(), 0.into())));
        assert!(e.has_next());
        assert_eq!(e.next(), Some(Value::pair(2.into(), 1.into())));
        assert_eq!(e.next(), None);
        assert!(!e.has_next());

        e.rewind();
        proxy.set(0, Value::from(7)).unwrap();
        assert_eq!(e.next(), Some(Value::pair(7.into(), 0.into())));
        assert!(e.receiver().storage().ptr_eq(proxy.storage()));
    }

    #[mockalloc::test]
    fn boundary_elements() {
        let proxy = ints(&[1, 2, 3]);
        assert_eq!(proxy.first(), Value::from(1));
        assert_eq!(proxy.last(), Value::from(3));
        assert_eq!(proxy.first_n(2), Value::array(vec![1.into(), 2.into()]));
        assert_eq!(proxy.last_n(2), Value::array(vec![2.into(), 3.into()]));
        assert_eq!(proxy.last_n(10).to_vec().unwrap().len(), 3);
        assert_eq!(proxy.first_n(-1).to_vec().unwrap().len(), 0);

        let empty = ints(&[]);
        assert!(empty.first().is_nil());
        assert!(empty.last().is_nil());
        assert_eq!(empty.last_n(2).to_vec().unwrap().len(), 0);
    }

    #[mockalloc::test]
    fn counting() {
        let bools = ArrayProxy::from_native(vec![true, false, true]);
        assert_eq!(bools.count(), 3);
        assert_eq!(bools.count_of(&Value::from(true)), 2);
        assert_eq!(bools.count_where(Ok).unwrap(), 2);

        let doubles = ArrayProxy::from_native(vec![1.0f64, 2.5]);
        assert_eq!(doubles.count_of(&Value::from(1)), 1);
    }

    #[mockalloc::test]
    fn dig_into_nested_arrays() {
        let grid = ArrayProxy::allocate(ElementKind::Int, &[2, 3]).unwrap();
        let Value::Proxy(row) = grid.get(1) else {
            panic!("expected a row")
        };
        row.set(2, Value::from(5)).unwrap();

        assert_eq!(grid.dig(&[1.into(), (-1).into()]).unwrap(), Value::from(5));
        assert!(grid.dig(&[4.into(), 0.into()]).unwrap().is_nil());
        assert!(matches!(
            grid.dig(&[0.into(), 0.into(), 0.into()]),
            Err(ProxyError::TypeMismatch(_))
        ));
        assert!(matches!(grid.dig(&[]), Err(ProxyError::TypeMismatch(_))));
    }

    #[mockalloc::test]
    fn to_a_converts_nested_arrays() {
        let grid = ArrayProxy::allocate(ElementKind::Byte, &[2, 1]).unwrap();
        let nested = grid.to_a();
        let rows = nested.to_vec().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(matches!(&rows[0], Value::Array(_)));
        assert!(rows[0].eql(&Value::array(vec![0.into()])));
    }

    #[mockalloc::test]
    fn inspect_renders_kind_and_hash() {
        let proxy = ArrayProxy::from_native(vec![0.5f32, f32::INFINITY]);
        let expected = format!("float[0.5, Infinity]@{:x}", proxy.hash_code() as u32);
        assert_eq!(proxy.inspect(), expected);
        assert_eq!(proxy.to_string(), expected);

        let empty = ArrayProxy::from_native(Vec::<i8>::new());
        assert_eq!(empty.inspect(), "byte[]@b");

        let chars = ArrayProxy::from_native(vec![u16::from(b'a'), 0xd800]);
        let expected = format!("char[a, 55296]@{:x}", chars.hash_code() as u32);
        assert_eq!(chars.inspect(), expected);
    }

    #[mockalloc::test]
    fn self_referencing_arrays_terminate() {
        let proxy = ArrayProxy::allocate(ElementKind::Object, &[2]).unwrap();
        proxy.set(0, Value::Proxy(proxy.clone())).unwrap();
        proxy.set(1, Value::from(3)).unwrap();

        let raw = format!("#<object[2]@{:x}>", proxy.storage().addr());
        let expected = format!("object[{}, 3]@{:x}", raw, proxy.hash_code() as u32);
        assert_eq!(proxy.inspect(), expected);

        let copy = proxy.dup();
        assert!(proxy.eql(&Value::Proxy(copy.clone())));
        assert_eq!(proxy.hash_code(), copy.hash_code());

        let items = proxy.to_a().to_vec().unwrap();
        assert!(matches!(&items[0], Value::Proxy(p) if p.storage().ptr_eq(proxy.storage())));

        let seq = Value::array(vec![Value::Proxy(proxy.clone())]);
        proxy.set(1, seq.clone()).unwrap();
        assert!(proxy.inspect().contains("[object[...]]"));
        assert_eq!(proxy.hash_code(), proxy.hash_code());

        // break the cycles so the storage is released
        proxy.set(0, Value::Nil).unwrap();
        proxy.set(1, Value::Nil).unwrap();
    }

    #[mockalloc::test]
    fn borrowed_proxies_iterate() {
        let proxy = ints(&[4, 5]);
        let sum: i64 = (&proxy).into_iter().filter_map(|v| v.as_i64()).sum();
        assert_eq!(sum, 9);
    }
}
