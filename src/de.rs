//! `serde::Deserialize` implementations and kind-directed decoding

use std::fmt::{self, Formatter};
use std::marker::PhantomData;

use log::debug;
use serde::de::{self, DeserializeSeed, Deserializer, MapAccess, SeqAccess, Unexpected, Visitor};
use serde::Deserialize;

use crate::convert::NativeElement;
use crate::error::Result;
use crate::kind::ElementKind;
use crate::native::NativeArray;
use crate::proxy::ArrayProxy;
use crate::value::{ObjectRef, Value};

/// Upper bound on the capacity reserved from an untrusted length hint.
const MAX_PREALLOCATED: usize = 4096;

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("any value")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Integer(v))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Value, E> {
        Ok(i64::try_from(v).map_or(Value::Float(v as f64), Value::Integer))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E>(self, v: &str) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_string<E>(self, v: String) -> Result<Value, E> {
        Ok(Value::Str(v))
    }

    fn visit_none<E>(self) -> Result<Value, E> {
        Ok(Value::Nil)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Deserialize::deserialize(deserializer)
    }

    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Nil)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(MAX_PREALLOCATED));
        while let Some(item) = seq.next_element::<Value>()? {
            items.push(item);
        }
        Ok(Value::array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let object = ObjectRef::new("Hash");
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            object.set_field(key, value);
        }
        Ok(Value::Object(object))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct KindVisitor;

impl<'de> Visitor<'de> for KindVisitor {
    type Value = ElementKind;

    fn expecting(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("an element kind name")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ElementKind, E> {
        ElementKind::from_name(v).ok_or_else(|| E::invalid_value(Unexpected::Str(v), &self))
    }
}

impl<'de> Deserialize<'de> for ElementKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(KindVisitor)
    }
}

/// Decodes a sequence straight into a native array of the given kind.
///
/// Each element goes through the kind's conversion rules, so a JSON string
/// of one character is accepted for `char` and an integral float for the
/// integer kinds.
#[derive(Copy, Clone, Debug)]
pub struct ElementSeed(pub ElementKind);

struct TypedVisitor<T>(PhantomData<T>);

impl<'de, T: NativeElement> Visitor<'de> for TypedVisitor<T> {
    type Value = NativeArray;

    fn expecting(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "a sequence of {} values", T::KIND)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<NativeArray, A::Error> {
        let mut slots: Vec<T> =
            Vec::with_capacity(seq.size_hint().unwrap_or(0).min(MAX_PREALLOCATED));
        while let Some(item) = seq.next_element::<Value>()? {
            slots.push(T::from_value(&item).map_err(<A::Error as de::Error>::custom)?);
        }
        Ok(T::into_array(slots.into_boxed_slice()))
    }
}

fn typed<'de, T: NativeElement, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<NativeArray, D::Error> {
    deserializer.deserialize_seq(TypedVisitor::<T>(PhantomData))
}

impl<'de> DeserializeSeed<'de> for ElementSeed {
    type Value = NativeArray;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<NativeArray, D::Error> {
        use ElementKind::*;
        match self.0 {
            Byte => typed::<i8, D>(deserializer),
            Short => typed::<i16, D>(deserializer),
            Char => typed::<u16, D>(deserializer),
            Int => typed::<i32, D>(deserializer),
            Long => typed::<i64, D>(deserializer),
            Float => typed::<f32, D>(deserializer),
            Double => typed::<f64, D>(deserializer),
            Boolean => typed::<bool, D>(deserializer),
            Object => typed::<Value, D>(deserializer),
        }
    }
}

impl ArrayProxy {
    /// Parses a JSON array into a new proxy of `kind`.
    pub fn from_json(kind: ElementKind, json: &str) -> Result<ArrayProxy> {
        let mut deserializer = serde_json::Deserializer::from_str(json);
        let array = ElementSeed(kind).deserialize(&mut deserializer)?;
        deserializer.end()?;
        debug!("decoded {} array of length {} from JSON", kind, array.len());
        Ok(ArrayProxy::from_native(array))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProxyError;

    #[mockalloc::test]
    fn typed_decoding_applies_conversion_rules() {
        let bytes = ArrayProxy::from_json(ElementKind::Byte, "[1, -2, 3.0]").unwrap();
        assert_eq!(*bytes.storage().read(), NativeArray::from(vec![1i8, -2, 3]));

        let chars = ArrayProxy::from_json(ElementKind::Char, r#"["a", 98]"#).unwrap();
        assert_eq!(*chars.storage().read(), NativeArray::from(vec![97u16, 98]));

        let doubles = ArrayProxy::from_json(ElementKind::Double, "[1, 2.5]").unwrap();
        assert_eq!(doubles.elements(), vec![Value::from(1.0), Value::from(2.5)]);
    }

    #[mockalloc::test]
    fn typed_decoding_rejects_bad_input() {
        assert!(matches!(
            ArrayProxy::from_json(ElementKind::Byte, "[1, 300]"),
            Err(ProxyError::Json(_))
        ));
        assert!(matches!(
            ArrayProxy::from_json(ElementKind::Boolean, "[true, 1]"),
            Err(ProxyError::Json(_))
        ));
        assert!(matches!(
            ArrayProxy::from_json(ElementKind::Int, "{}"),
            Err(ProxyError::Json(_))
        ));
        assert!(matches!(
            ArrayProxy::from_json(ElementKind::Int, "[1] [2]"),
            Err(ProxyError::Json(_))
        ));
    }

    #[mockalloc::test]
    fn object_arrays_keep_dynamic_values() {
        let objects = ArrayProxy::from_json(ElementKind::Object, r#"[null, "x", [1]]"#).unwrap();
        assert!(objects.get(0).is_nil());
        assert_eq!(objects.get(1), Value::from("x"));
        assert_eq!(objects.get(2), Value::array(vec![1.into()]));
    }

    #[mockalloc::test]
    fn values_deserialize() {
        let value: Value = serde_json::from_str(r#"{"a": [1, 2.5, "s", true, null]}"#).unwrap();
        let Value::Object(object) = &value else {
            panic!("expected an object")
        };
        assert_eq!(object.class_name(), "Hash");
        assert_eq!(
            object.field("a").unwrap(),
            Value::array(vec![
                1.into(),
                2.5.into(),
                "s".into(),
                true.into(),
                Value::Nil
            ])
        );

        let big: Value = serde_json::from_str("18446744073709551615").unwrap();
        assert!(matches!(big, Value::Float(_)));
    }

    #[test]
    fn kinds_deserialize_from_names() {
        let kind: ElementKind = serde_json::from_str(r#""java.lang.Integer""#).unwrap();
        assert_eq!(kind, ElementKind::Int);
        assert!(serde_json::from_str::<ElementKind>(r#""decimal""#).is_err());
    }
}
