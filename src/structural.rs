//! Equality, hashing, copying and membership for proxies

use std::hash::{Hash, Hasher};

use crate::native::{NativeArray, NativeArrayRef};
use crate::proxy::{ArrayProxy, ProxyState};
use crate::value::{float_hash, fold_hashes, fold_u64};
use crate::Value;

/// Multiplier applied to every content hash, whatever the element kind.
const HASH_SALT: i32 = 11;

fn f32_hash(v: f32) -> i32 {
    let bits = if v == 0.0 { 0 } else { v.to_bits() };
    bits as i32
}

fn bool_hash(v: bool) -> i32 {
    if v {
        1231
    } else {
        1237
    }
}

fn slots_eq<T>(a: &[T], b: &[T], eq: impl Fn(&T, &T) -> bool) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| eq(x, y))
}

fn contains_integral<T: TryFrom<i64> + PartialEq>(slots: &[T], probe: i64) -> bool {
    // a probe outside the kind's range cannot be stored, so it cannot match
    T::try_from(probe).map_or(false, |probe| slots.contains(&probe))
}

impl NativeArray {
    /// Strict content equality: same kind, and every slot equal under the
    /// kind's own equality. Object slots use [`Value::eql`].
    #[must_use]
    pub fn content_eq(&self, other: &NativeArray) -> bool {
        self.content_eq_within(other, &mut Vec::new())
    }

    #[allow(clippy::float_cmp)]
    fn content_eq_within(&self, other: &NativeArray, open: &mut Vec<(usize, usize)>) -> bool {
        use NativeArray::*;
        match (self, other) {
            (Byte(a), Byte(b)) => a == b,
            (Short(a), Short(b)) => a == b,
            (Char(a), Char(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Long(a), Long(b)) => a == b,
            (Float(a), Float(b)) => slots_eq(a, b, |x, y| x == y),
            (Double(a), Double(b)) => slots_eq(a, b, |x, y| x == y),
            (Boolean(a), Boolean(b)) => a == b,
            (Object(a), Object(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.eql_within(y, open))
            }
            _ => false,
        }
    }

    /// Hash consistent with [`NativeArray::content_eq`].
    #[must_use]
    pub fn content_hash(&self) -> i32 {
        self.content_hash_within(&mut Vec::new())
    }

    fn content_hash_within(&self, open: &mut Vec<usize>) -> i32 {
        use NativeArray::*;
        let h = match self {
            Byte(s) => fold_hashes(s.iter().map(|&v| i32::from(v))),
            Short(s) => fold_hashes(s.iter().map(|&v| i32::from(v))),
            Char(s) => fold_hashes(s.iter().map(|&v| i32::from(v))),
            Int(s) => fold_hashes(s.iter().copied()),
            Long(s) => fold_hashes(s.iter().map(|&v| fold_u64(v as u64))),
            Float(s) => fold_hashes(s.iter().map(|&v| f32_hash(v))),
            Double(s) => fold_hashes(s.iter().map(|&v| float_hash(v))),
            Boolean(s) => fold_hashes(s.iter().map(|&v| bool_hash(v))),
            Object(s) => fold_hashes(s.iter().map(|v| v.hash_within(open))),
        };
        h.wrapping_mul(HASH_SALT)
    }
}

fn storage_eql(a: &NativeArrayRef, b: &NativeArrayRef, open: &mut Vec<(usize, usize)>) -> bool {
    let key = (a.addr(), b.addr());
    if a.ptr_eq(b) || open.contains(&key) {
        return true;
    }
    open.push(key);
    let equal = a.read().content_eq_within(&b.read(), open);
    open.pop();
    equal
}

impl ArrayProxy {
    fn eql_storage(&self, other: &ArrayProxy) -> bool {
        self.eql_within(other, &mut Vec::new())
    }

    pub(crate) fn eql_within(&self, other: &ArrayProxy, open: &mut Vec<(usize, usize)>) -> bool {
        storage_eql(self.storage(), other.storage(), open)
    }

    /// Strict equality against another proxy or a raw native array: the
    /// kinds must match and every slot must be equal.
    #[must_use]
    pub fn eql(&self, other: &Value) -> bool {
        match other {
            Value::Proxy(other) => self.eql_storage(other),
            Value::Native(storage) => storage_eql(self.storage(), storage, &mut Vec::new()),
            _ => false,
        }
    }

    /// General equality. Against a dynamic sequence, each of its elements is
    /// converted toward this array's kind and compared with the matching
    /// slot; otherwise this is [`ArrayProxy::eql`].
    #[must_use]
    pub fn op_equal(&self, other: &Value) -> bool {
        match other {
            Value::Array(seq) => self.equals_sequence(&seq.read()),
            other => self.eql(other),
        }
    }

    /// Compares with a slice of dynamic values. An element that cannot be
    /// converted to this array's kind makes the two unequal.
    #[must_use]
    pub fn equals_sequence(&self, items: &[Value]) -> bool {
        let array = self.storage().read();
        let converter = self.converter();
        array.len() == items.len()
            && items
                .iter()
                .enumerate()
                .all(|(i, item)| converter.matches(&array, i, item))
    }

    /// Content hash, equal for proxies that are [`ArrayProxy::eql`].
    #[must_use]
    pub fn hash_code(&self) -> i32 {
        self.hash_within(&mut Vec::new())
    }

    pub(crate) fn hash_within(&self, open: &mut Vec<usize>) -> i32 {
        let addr = self.storage().addr();
        if open.contains(&addr) {
            return 0;
        }
        open.push(addr);
        let h = self.storage().read().content_hash_within(open);
        open.pop();
        h
    }

    fn copy_with(&self, state: ProxyState) -> ArrayProxy {
        let copy = self.storage().read().clone();
        ArrayProxy::from_native(copy).with_state(state)
    }

    /// A shallow copy over fresh storage, carrying the instance variables
    /// and tainted flag but not the frozen flag.
    #[must_use]
    pub fn dup(&self) -> ArrayProxy {
        let state = ProxyState {
            frozen: false,
            ..self.state()
        };
        self.copy_with(state)
    }

    /// Like [`ArrayProxy::dup`], also carrying the frozen flag.
    #[must_use]
    pub fn clone_proxy(&self) -> ArrayProxy {
        self.copy_with(self.state())
    }

    /// Returns `true` if some element is `==` to `probe`.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn includes(&self, probe: &Value) -> bool {
        let native = {
            use NativeArray::*;
            let array = self.storage().read();
            match (&*array, probe) {
                (Byte(s), Value::Integer(v)) => Some(contains_integral(s, *v)),
                (Short(s), Value::Integer(v)) => Some(contains_integral(s, *v)),
                (Char(s), Value::Integer(v)) => Some(contains_integral(s, *v)),
                (Int(s), Value::Integer(v)) => Some(contains_integral(s, *v)),
                (Long(s), Value::Integer(v)) => Some(s.contains(v)),
                (Float(s), Value::Float(v)) => {
                    let v = *v as f32;
                    Some(s.iter().any(|x| *x == v))
                }
                (Double(s), Value::Float(v)) => Some(s.iter().any(|x| x == v)),
                (Boolean(s), Value::Bool(b)) => Some(s.contains(b)),
                _ => None,
            }
        };
        native.unwrap_or_else(|| {
            (0..self.len())
                .filter_map(|i| self.element(i))
                .any(|element| element == *probe)
        })
    }
}

impl PartialEq for ArrayProxy {
    fn eq(&self, other: &ArrayProxy) -> bool {
        self.eql_storage(other)
    }
}

impl Eq for ArrayProxy {}

impl Hash for ArrayProxy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_i32(self.hash_code());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::ElementKind;

    #[mockalloc::test]
    fn strict_equality_requires_same_kind() {
        let ints = ArrayProxy::from_native(vec![1i32, 2]);
        let longs = ArrayProxy::from_native(vec![1i64, 2]);
        let other_ints = ArrayProxy::from_native(vec![1i32, 2]);

        assert!(ints.eql(&Value::Proxy(other_ints.clone())));
        assert_eq!(ints, other_ints);
        assert_eq!(ints.hash_code(), other_ints.hash_code());
        assert!(!ints.eql(&Value::Proxy(longs)));
        assert!(ints.eql(&Value::Native(other_ints.storage().clone())));
        assert!(!ints.eql(&Value::array(vec![1.into(), 2.into()])));
    }

    #[mockalloc::test]
    fn loose_equality_converts_sequence_elements() {
        let bytes = ArrayProxy::from_native(vec![1i8, 2]);
        assert!(bytes.op_equal(&Value::array(vec![1.into(), 2.0.into()])));
        assert!(!bytes.op_equal(&Value::array(vec![1.into(), 258.into()])));
        assert!(!bytes.op_equal(&Value::array(vec![1.into()])));
        assert!(!bytes.op_equal(&Value::array(vec![1.into(), "2".into()])));
    }

    #[mockalloc::test]
    fn float_hashes_ignore_zero_sign() {
        let a = ArrayProxy::from_native(vec![0.0f64]);
        let b = ArrayProxy::from_native(vec![-0.0f64]);
        assert_eq!(a, b);
        assert_eq!(a.hash_code(), b.hash_code());

        let c = ArrayProxy::from_native(vec![0.0f32]);
        let d = ArrayProxy::from_native(vec![-0.0f32]);
        assert_eq!(c.hash_code(), d.hash_code());

        let nan = ArrayProxy::from_native(vec![f64::NAN]);
        assert!(!nan.eql(&Value::Proxy(nan.dup())));
    }

    #[mockalloc::test]
    fn hash_follows_fold_and_salt() {
        let proxy = ArrayProxy::from_native(vec![1i32, 2]);
        assert_eq!(proxy.hash_code(), (31 * (31 + 1) + 2) * 11);
        let empty = ArrayProxy::from_native(Vec::<bool>::new());
        assert_eq!(empty.hash_code(), 11);
    }

    #[mockalloc::test]
    fn dup_copies_storage_and_metadata() {
        let proxy = ArrayProxy::from_native(vec![1i16, 2]);
        proxy.set_ivar("@name", "p");
        proxy.taint();
        proxy.freeze();

        let dup = proxy.dup();
        dup.set(0, Value::from(9)).unwrap();
        assert_eq!(proxy.get(0), Value::from(1));
        assert_eq!(dup.ivar("@name"), Value::from("p"));
        assert!(dup.is_tainted());
        assert!(!dup.is_frozen());

        let cloned = proxy.clone_proxy();
        assert!(cloned.is_frozen());
        assert!(!cloned.storage().ptr_eq(proxy.storage()));
    }

    #[mockalloc::test]
    fn object_copies_share_referents() {
        let inner = ArrayProxy::from_native(vec![1i32]);
        let outer = ArrayProxy::allocate(ElementKind::Object, &[1]).unwrap();
        outer.set(0, Value::Proxy(inner.clone())).unwrap();

        let Value::Proxy(copied) = outer.dup().get(0) else {
            panic!("expected a proxy")
        };
        assert!(copied.storage().ptr_eq(inner.storage()));
    }

    #[mockalloc::test]
    fn membership() {
        let bools = ArrayProxy::from_native(vec![true, false, true]);
        assert!(bools.includes(&Value::from(false)));
        assert!(!bools.includes(&Value::from(0)));

        let bytes = ArrayProxy::from_native(vec![1i8, 2, 3]);
        assert!(bytes.includes(&Value::from(3)));
        assert!(!bytes.includes(&Value::from(259)));
        assert!(bytes.includes(&Value::from(2.0)));
        assert!(!bytes.includes(&Value::from("2")));

        let floats = ArrayProxy::from_native(vec![0.5f32]);
        assert!(floats.includes(&Value::from(0.5)));
        assert!(!floats.includes(&Value::from(1)));

        let objects =
            ArrayProxy::from_values(ElementKind::Object, &["a".into(), 1.into()]).unwrap();
        assert!(objects.includes(&Value::from(1.0)));
        assert!(!objects.includes(&Value::Nil));
    }
}
