//! The dynamic value type exchanged with the host object system

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::fmt::{self, Debug, Display, Formatter};
use std::hash::BuildHasherDefault;

use hashbrown::HashMap;

use crate::error::{ProxyError, Result};
use crate::index;
use crate::native::NativeArrayRef;
use crate::proxy::ArrayProxy;
use crate::sync::Shared;

/// Handle to a dynamic sequence. Sequences are reference types: clones of a
/// handle observe each other's mutations.
pub type SeqRef = Shared<Vec<Value>>;

/// A range with arbitrary endpoints, as produced by `first..last` or
/// `first...last` in the host language.
#[derive(Clone, Debug)]
pub struct RangeValue {
    /// First endpoint
    pub first: Value,
    /// Last endpoint
    pub last: Value,
    /// Whether `last` itself is excluded
    pub exclude_end: bool,
}

/// Name-keyed table for object fields and instance variables. The hasher is
/// fixed-key, so building an empty table never touches global state.
pub(crate) type FieldMap = HashMap<String, Value, BuildHasherDefault<DefaultHasher>>;

#[derive(Debug, Default)]
struct ObjectData {
    class_name: String,
    fields: FieldMap,
}

/// Reference to a foreign object of the host system. Objects compare and
/// hash by identity; their fields are reachable through [`Value::dig`] with
/// string keys.
#[derive(Clone)]
pub struct ObjectRef(Shared<ObjectData>);

impl ObjectRef {
    /// Creates a new object with no fields.
    pub fn new(class_name: impl Into<String>) -> Self {
        ObjectRef(Shared::new(ObjectData {
            class_name: class_name.into(),
            fields: FieldMap::default(),
        }))
    }

    /// Name of the object's class.
    #[must_use]
    pub fn class_name(&self) -> String {
        self.0.read().class_name.clone()
    }

    /// Reads a field, if set.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<Value> {
        self.0.read().fields.get(name).cloned()
    }

    /// Sets a field, returning its previous value.
    pub fn set_field(&self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.write().fields.insert(name.into(), value.into())
    }

    /// Names of the fields that are set.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        self.0.read().fields.keys().cloned().collect()
    }

    pub(crate) fn with_fields<R>(&self, f: impl FnOnce(&FieldMap) -> R) -> R {
        f(&self.0.read().fields)
    }

    /// Returns `true` if both handles refer to the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        self.0.ptr_eq(&other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        self.0.addr()
    }

    fn identity_hash(&self) -> i32 {
        fold_u64(self.addr() as u64)
    }
}

impl Debug for ObjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#<{}@{:x}>", self.class_name(), self.0.addr())
    }
}

/// A value of the dynamic object system.
///
/// `PartialEq` implements the host's general equality (`1 == 1.0`); strict
/// equality is [`Value::eql`], and [`Value::hash_code`] is consistent with it.
#[derive(Clone, Debug)]
pub enum Value {
    /// The absent value
    Nil,
    /// `true` or `false`
    Bool(bool),
    /// An integer of the host's numeric tower
    Integer(i64),
    /// A floating point number
    Float(f64),
    /// A string
    Str(String),
    /// A dynamic sequence
    Array(SeqRef),
    /// A range
    Range(Box<RangeValue>),
    /// A raw native array handle that has not been wrapped in a proxy
    Native(NativeArrayRef),
    /// A native array proxy
    Proxy(ArrayProxy),
    /// A foreign object reference
    Object(ObjectRef),
}

fn can_represent_as_f64(x: u64) -> bool {
    x.leading_zeros() + x.trailing_zeros() >= 11
}

fn cmp_u64_to_f64(a: u64, b: f64) -> Ordering {
    if can_represent_as_f64(a) {
        (a as f64).partial_cmp(&b).unwrap_or(Ordering::Less)
    } else if b <= (0x0020_0000_0000_0000_u64 as f64) {
        // every integer that cannot be represented exactly is above 2^53
        Ordering::Greater
    } else if b >= u64::MAX as f64 {
        Ordering::Less
    } else {
        // the remaining floats convert to u64 losslessly
        a.cmp(&(b as u64))
    }
}

/// Compares an integer with a float without rounding the integer.
pub(crate) fn cmp_i64_to_f64(a: i64, b: f64) -> Option<Ordering> {
    if b.is_nan() {
        None
    } else if a < 0 {
        Some(cmp_u64_to_f64(a.wrapping_neg() as u64, -b).reverse())
    } else {
        Some(cmp_u64_to_f64(a as u64, b))
    }
}

pub(crate) fn fold_u64(v: u64) -> i32 {
    (v ^ (v >> 32)) as i32
}

pub(crate) fn float_hash(v: f64) -> i32 {
    // +0.0 and -0.0 compare equal, so they must hash alike
    let bits = if v == 0.0 { 0 } else { v.to_bits() };
    fold_u64(bits)
}

pub(crate) fn string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

pub(crate) fn fold_hashes(hashes: impl Iterator<Item = i32>) -> i32 {
    hashes.fold(1i32, |h, e| h.wrapping_mul(31).wrapping_add(e))
}

impl Value {
    /// Builds a new dynamic sequence from `items`.
    #[must_use]
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Shared::new(items))
    }

    /// Builds a two-element dynamic sequence.
    #[must_use]
    pub fn pair(first: Value, second: Value) -> Self {
        Value::array(vec![first, second])
    }

    /// Builds a range value.
    #[must_use]
    pub fn range(first: impl Into<Value>, last: impl Into<Value>, exclude_end: bool) -> Self {
        Value::Range(Box::new(RangeValue {
            first: first.into(),
            last: last.into(),
            exclude_end,
        }))
    }

    /// Name of the value's dynamic type, used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Str(_) => "String",
            Value::Array(_) => "Array",
            Value::Range(_) => "Range",
            Value::Native(_) => "NativeArray",
            Value::Proxy(_) => "ArrayProxy",
            Value::Object(_) => "Object",
        }
    }

    /// Returns `true` for the nil value.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Host truthiness: everything except `nil` and `false` is true.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// The integer payload, if this is an integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// The numeric payload as a float, for integers and floats.
    #[must_use]
    pub fn to_f64_lossy(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Copies the items of a dynamic sequence.
    #[must_use]
    pub fn to_vec(&self) -> Option<Vec<Value>> {
        match self {
            Value::Array(seq) => Some(seq.read().clone()),
            _ => None,
        }
    }

    /// Strict equality: same dynamic type and equal contents, with no
    /// numeric coercion (`1.eql(1.0)` is false).
    ///
    /// A proxy and a raw native handle are different types here and never
    /// `eql`; raw handles compare by identity.
    #[must_use]
    pub fn eql(&self, other: &Value) -> bool {
        self.eql_within(other, &mut Vec::new())
    }

    /// Strict equality, treating a pair of containers already being
    /// compared further up as equal.
    pub(crate) fn eql_within(&self, other: &Value, open: &mut Vec<(usize, usize)>) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                let key = (a.addr(), b.addr());
                if a.ptr_eq(b) || open.contains(&key) {
                    return true;
                }
                open.push(key);
                let equal = {
                    let a = a.read();
                    let b = b.read();
                    a.len() == b.len()
                        && a.iter().zip(b.iter()).all(|(x, y)| x.eql_within(y, open))
                };
                open.pop();
                equal
            }
            (Value::Range(a), Value::Range(b)) => {
                a.exclude_end == b.exclude_end
                    && a.first.eql_within(&b.first, open)
                    && a.last.eql_within(&b.last, open)
            }
            (Value::Native(a), Value::Native(b)) => a.ptr_eq(b),
            (Value::Proxy(a), Value::Proxy(b)) => a.eql_within(b, open),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Hash consistent with [`Value::eql`].
    #[must_use]
    pub fn hash_code(&self) -> i32 {
        self.hash_within(&mut Vec::new())
    }

    /// Hash of the value; a container already being hashed further up
    /// contributes 0.
    pub(crate) fn hash_within(&self, open: &mut Vec<usize>) -> i32 {
        match self {
            Value::Nil => 0,
            Value::Bool(b) => {
                if *b {
                    1231
                } else {
                    1237
                }
            }
            Value::Integer(v) => fold_u64(*v as u64),
            Value::Float(v) => float_hash(*v),
            Value::Str(s) => string_hash(s),
            Value::Array(seq) => {
                if open.contains(&seq.addr()) {
                    return 0;
                }
                open.push(seq.addr());
                let h = fold_hashes(seq.read().iter().map(|v| v.hash_within(open)));
                open.pop();
                h
            }
            Value::Range(r) => {
                let h = r.first.hash_within(open);
                let h = h.wrapping_mul(31).wrapping_add(r.last.hash_within(open));
                h.wrapping_mul(31).wrapping_add(i32::from(r.exclude_end))
            }
            Value::Native(n) => fold_u64(n.addr() as u64),
            Value::Proxy(p) => p.hash_within(open),
            Value::Object(o) => o.identity_hash(),
        }
    }

    /// Follows `path` one index (or key) at a time, stopping at nil.
    pub fn dig(&self, path: &[Value]) -> Result<Value> {
        let (segment, rest) = path
            .split_first()
            .ok_or_else(|| ProxyError::TypeMismatch("dig requires at least one key".into()))?;
        let next = match self {
            Value::Nil => return Ok(Value::Nil),
            Value::Array(seq) => {
                let i = index::index_from_value(segment)?;
                let seq = seq.read();
                index::normalize(i, seq.len())
                    .map(|i| seq[i].clone())
                    .unwrap_or(Value::Nil)
            }
            Value::Proxy(proxy) => return proxy.dig(path),
            Value::Native(storage) => return ArrayProxy::new(storage.clone()).dig(path),
            Value::Object(object) => match segment {
                Value::Str(key) => object.field(key).unwrap_or(Value::Nil),
                other => return Err(ProxyError::type_mismatch(other, "String")),
            },
            other => {
                return Err(ProxyError::TypeMismatch(format!(
                    "{} does not have #dig method",
                    other.type_name()
                )))
            }
        };
        if rest.is_empty() {
            Ok(next)
        } else {
            next.dig(rest)
        }
    }

    /// Renders the value the way the host's `inspect` does. A container
    /// that holds itself renders the inner occurrence as `[...]`.
    #[must_use]
    pub fn inspect(&self) -> String {
        self.inspect_within(&mut Vec::new())
    }

    pub(crate) fn inspect_within(&self, open: &mut Vec<usize>) -> String {
        match self {
            Value::Nil => "nil".to_owned(),
            Value::Bool(b) => b.to_string(),
            Value::Integer(v) => v.to_string(),
            Value::Float(v) => inspect_float(*v),
            Value::Str(s) => format!("{:?}", s),
            Value::Array(seq) => {
                if open.contains(&seq.addr()) {
                    return "[...]".to_owned();
                }
                open.push(seq.addr());
                let items: Vec<String> =
                    seq.read().iter().map(|v| v.inspect_within(open)).collect();
                open.pop();
                format!("[{}]", items.join(", "))
            }
            Value::Range(r) => format!(
                "{}{}{}",
                r.first.inspect_within(open),
                if r.exclude_end { "..." } else { ".." },
                r.last.inspect_within(open)
            ),
            Value::Native(storage) => {
                let array = storage.read();
                format!("#<{}[{}]@{:x}>", array.kind(), array.len(), storage.addr())
            }
            Value::Proxy(proxy) => proxy.inspect_within(open),
            Value::Object(object) => format!("{:?}", object),
        }
    }
}

pub(crate) fn inspect_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_owned()
    } else if v.is_infinite() {
        let rendered = if v > 0.0 { "Infinity" } else { "-Infinity" };
        rendered.to_owned()
    } else {
        format!("{:?}", v)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                cmp_i64_to_f64(*a, *b) == Some(Ordering::Equal)
            }
            (Value::Array(a), Value::Array(b)) => {
                if a.ptr_eq(b) {
                    return true;
                }
                let a = a.read();
                let b = b.read();
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
            }
            (Value::Proxy(p), other)
            | (other @ (Value::Array(_) | Value::Native(_)), Value::Proxy(p)) => {
                p.op_equal(other)
            }
            (Value::Range(a), Value::Range(b)) => {
                a.exclude_end == b.exclude_end && a.first == b.first && a.last == b.last
            }
            _ => self.eql(other),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inspect())
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Nil
    }
}

macro_rules! from_int_impl {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::Integer(i64::from(v))
            }
        })*
    };
}

from_int_impl!(i8, u8, i16, u16, i32, u32, i64);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::array(v)
    }
}

impl From<ArrayProxy> for Value {
    fn from(v: ArrayProxy) -> Self {
        Value::Proxy(v)
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Value::Object(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Nil, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn general_equality_coerces_numbers() {
        assert_eq!(Value::from(1), Value::from(1.0));
        assert_eq!(Value::from(-2), Value::from(-2.0));
        assert_ne!(Value::from(1), Value::from(1.5));
        assert_ne!(Value::from(i64::MAX), Value::from(i64::MAX as f64));
        assert_ne!(Value::from(0), Value::Float(f64::NAN));
        assert!(!Value::from(1).eql(&Value::from(1.0)));
    }

    #[mockalloc::test]
    fn strict_hash_matches_strict_equality() {
        let pairs = [
            (Value::from(0.0), Value::from(-0.0)),
            (Value::from("abc"), Value::from("abc")),
            (
                Value::array(vec![1.into(), "x".into()]),
                Value::array(vec![1.into(), "x".into()]),
            ),
            (Value::range(1, 3, true), Value::range(1, 3, true)),
        ];
        for (a, b) in &pairs {
            assert!(a.eql(b));
            assert_eq!(a.hash_code(), b.hash_code());
        }
    }

    #[mockalloc::test]
    fn proxies_and_raw_handles_are_never_eql() {
        let proxy = ArrayProxy::from_native(vec![1i32, 2]);
        let twin = ArrayProxy::from_native(vec![1i32, 2]);
        let wrapped = Value::Proxy(proxy.clone());
        let raw = Value::Native(twin.storage().clone());
        let own_raw = Value::Native(proxy.storage().clone());

        assert!(!wrapped.eql(&raw));
        assert!(!raw.eql(&wrapped));
        assert!(!wrapped.eql(&own_raw));
        assert!(!own_raw.eql(&wrapped));
        assert!(wrapped.eql(&Value::Proxy(twin.clone())));
        assert_eq!(wrapped.hash_code(), Value::Proxy(twin).hash_code());
    }

    #[mockalloc::test]
    fn cyclic_sequences_terminate() {
        let cyclic = || {
            let seq = Value::array(vec![1.into()]);
            if let Value::Array(handle) = &seq {
                handle.write().push(seq.clone());
            }
            seq
        };
        let a = cyclic();
        let b = cyclic();
        assert_eq!(a.inspect(), "[1, [...]]");
        assert!(a.eql(&b));
        assert_eq!(a.hash_code(), b.hash_code());

        // break the cycles so the sequences are released
        for seq in [a, b] {
            if let Value::Array(handle) = &seq {
                handle.write().pop();
            }
        }
    }

    #[mockalloc::test]
    fn sequences_are_shared() {
        let a = Value::array(vec![1.into()]);
        let b = a.clone();
        if let Value::Array(seq) = &b {
            seq.write().push(2.into());
        }
        assert_eq!(a.to_vec().map(|v| v.len()), Some(2));
    }

    #[mockalloc::test]
    fn objects_compare_by_identity() {
        let a = ObjectRef::new("Point");
        let b = ObjectRef::new("Point");
        assert!(Value::from(a.clone()).eql(&Value::from(a.clone())));
        assert_ne!(Value::from(a), Value::from(b));
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::from(false).is_truthy());
        assert!(Value::from(0).is_truthy());
        assert!(Value::from("").is_truthy());
    }

    #[mockalloc::test]
    fn dig_through_sequences_and_objects() {
        let point = ObjectRef::new("Point");
        point.set_field("x", 7);
        let nested = Value::array(vec![
            Value::array(vec![1.into(), 2.into()]),
            point.into(),
        ]);

        assert_eq!(nested.dig(&[0.into(), (-1).into()]).unwrap(), Value::from(2));
        assert_eq!(nested.dig(&[1.into(), "x".into()]).unwrap(), Value::from(7));
        assert!(nested.dig(&[5.into(), 0.into()]).unwrap().is_nil());
        assert!(matches!(
            Value::from(3).dig(&[0.into()]),
            Err(ProxyError::TypeMismatch(_))
        ));
        assert!(matches!(nested.dig(&[]), Err(ProxyError::TypeMismatch(_))));
    }

    #[mockalloc::test]
    fn inspect_rendering() {
        let v = Value::array(vec![
            Value::Nil,
            true.into(),
            3.into(),
            1.5.into(),
            "a\"b".into(),
            Value::range(1, 4, true),
        ]);
        assert_eq!(v.inspect(), r#"[nil, true, 3, 1.5, "a\"b", 1...4]"#);
        assert_eq!(Value::Float(f64::NEG_INFINITY).inspect(), "-Infinity");
    }
}
