//! `serde::Serialize` implementations

use std::cell::RefCell;

use serde::ser::{self, Serialize, SerializeStruct, Serializer};

use crate::kind::ElementKind;
use crate::native::{with_slots, NativeArray, NativeArrayRef};
use crate::proxy::ArrayProxy;
use crate::value::{ObjectRef, Value};

/// A value being serialized, with the containers currently open above it.
/// Reaching an open container again is an error rather than endless output.
struct Nested<'a, T: ?Sized> {
    value: &'a T,
    open: &'a RefCell<Vec<usize>>,
}

impl<T: ?Sized> Nested<'_, T> {
    fn child<'b, U: ?Sized>(&'b self, value: &'b U) -> Nested<'b, U> {
        Nested {
            value,
            open: self.open,
        }
    }

    fn enter<E: ser::Error>(&self, addr: usize) -> Result<(), E> {
        let mut open = self.open.borrow_mut();
        if open.contains(&addr) {
            return Err(E::custom("cannot serialize a container that holds itself"));
        }
        open.push(addr);
        Ok(())
    }

    fn leave(&self) {
        self.open.borrow_mut().pop();
    }
}

impl Serialize for ElementKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl Serialize for Nested<'_, NativeArrayRef> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.enter::<S::Error>(self.value.addr())?;
        let array = self.value.read();
        let result = match &*array {
            NativeArray::Object(slots) => {
                serializer.collect_seq(slots.iter().map(|slot| self.child(slot)))
            }
            other => other.serialize(serializer),
        };
        self.leave();
        result
    }
}

impl Serialize for NativeArray {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        with_slots!(self, s => serializer.collect_seq(s.iter()))
    }
}

impl Serialize for ArrayProxy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let open = RefCell::new(Vec::new());
        Nested {
            value: self.storage(),
            open: &open,
        }
        .serialize(serializer)
    }
}

impl Serialize for Nested<'_, ObjectRef> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.enter::<S::Error>(self.value.addr())?;
        let result = self.value.with_fields(|fields| {
            serializer.collect_map(fields.iter().map(|(name, value)| (name, self.child(value))))
        });
        self.leave();
        result
    }
}

impl Serialize for ObjectRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let open = RefCell::new(Vec::new());
        Nested {
            value: self,
            open: &open,
        }
        .serialize(serializer)
    }
}

impl Serialize for Nested<'_, Value> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.value {
            Value::Nil => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Array(seq) => {
                self.enter::<S::Error>(seq.addr())?;
                let items = seq.read();
                let result = serializer.collect_seq(items.iter().map(|item| self.child(item)));
                self.leave();
                result
            }
            Value::Range(range) => {
                let mut s = serializer.serialize_struct("Range", 3)?;
                s.serialize_field("first", &self.child(&range.first))?;
                s.serialize_field("last", &self.child(&range.last))?;
                s.serialize_field("exclude_end", &range.exclude_end)?;
                s.end()
            }
            Value::Native(storage) => self.child(storage).serialize(serializer),
            Value::Proxy(proxy) => self.child(proxy.storage()).serialize(serializer),
            Value::Object(object) => self.child(object).serialize(serializer),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let open = RefCell::new(Vec::new());
        Nested {
            value: self,
            open: &open,
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[mockalloc::test]
    fn proxies_serialize_as_sequences() {
        let ints = ArrayProxy::from_native(vec![1i32, -2]);
        assert_eq!(serde_json::to_string(&ints).unwrap(), "[1,-2]");

        let chars = ArrayProxy::from_native(vec![65u16]);
        assert_eq!(serde_json::to_string(&chars).unwrap(), "[65]");

        let grid = ArrayProxy::allocate(ElementKind::Boolean, &[2, 1]).unwrap();
        assert_eq!(serde_json::to_string(&grid).unwrap(), "[[false],[false]]");
    }

    #[mockalloc::test]
    fn values_serialize() {
        let point = ObjectRef::new("Point");
        point.set_field("x", 1.5);
        let value = Value::array(vec![
            Value::Nil,
            true.into(),
            "s".into(),
            point.into(),
            Value::range(0, 2, true),
        ]);
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"[null,true,"s",{"x":1.5},{"first":0,"last":2,"exclude_end":true}]"#
        );
        assert_eq!(
            serde_json::to_string(&ElementKind::Double).unwrap(),
            r#""double""#
        );
    }

    #[mockalloc::test]
    fn self_referencing_arrays_fail_to_serialize() {
        let array = ArrayProxy::allocate(ElementKind::Object, &[2]).unwrap();
        array.set(0, Value::Proxy(array.clone())).unwrap();
        assert!(serde_json::to_string(&array).is_err());

        // the same array twice side by side is not a cycle
        let inner = ArrayProxy::from_native(vec![1i8]);
        array.set(0, Value::Proxy(inner.clone())).unwrap();
        array.set(1, Value::Proxy(inner)).unwrap();
        assert_eq!(serde_json::to_string(&array).unwrap(), "[[1],[1]]");
    }
}
