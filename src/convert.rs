//! Element converters between native slots and dynamic values

use std::fmt::{self, Debug, Formatter};

use crate::error::{ProxyError, Result};
use crate::kind::ElementKind;
use crate::native::{object_slot, NativeArray, NativeArrayRef};
use crate::proxy::ArrayProxy;
use crate::Value;

/// A type that can live in the slots of a native array.
pub trait NativeElement: Clone + Sized + 'static {
    /// Element kind of arrays holding this type
    const KIND: ElementKind;

    /// Borrows the slots of `array` if it holds this type.
    fn slots(array: &NativeArray) -> Option<&[Self]>;

    /// Mutably borrows the slots of `array` if it holds this type.
    fn slots_mut(array: &mut NativeArray) -> Option<&mut [Self]>;

    /// Builds a native array owning `slots`.
    fn into_array(slots: Box<[Self]>) -> NativeArray;

    /// Converts a slot to its dynamic representation.
    fn to_value(&self) -> Value;

    /// Converts a dynamic value to a slot, if the value fits.
    fn coerce(value: &Value) -> Option<Self>;

    /// Equality between a slot and a converted foreign value.
    fn same(&self, other: &Self) -> bool;

    /// Like [`NativeElement::coerce`], but reports why the value was rejected.
    fn from_value(value: &Value) -> Result<Self> {
        Self::coerce(value).ok_or_else(|| ProxyError::conversion(Self::KIND, value))
    }
}

/// Exact integer payload of an integer, or of a float with no fractional
/// part that fits in an `i64`.
fn exact_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(v) => Some(*v),
        Value::Float(v) if v.fract() == 0.0 && i64::MIN as f64 <= *v && *v < i64::MAX as f64 => {
            Some(*v as i64)
        }
        _ => None,
    }
}

fn coerce_integral<T: TryFrom<i64>>(value: &Value) -> Option<T> {
    exact_integer(value).and_then(|v| T::try_from(v).ok())
}

fn coerce_char(value: &Value) -> Option<u16> {
    match value {
        Value::Str(s) => {
            let mut units = s.encode_utf16();
            match (units.next(), units.next()) {
                (Some(unit), None) => Some(unit),
                _ => None,
            }
        }
        other => coerce_integral(other),
    }
}

fn coerce_f32(value: &Value) -> Option<f32> {
    match value {
        Value::Integer(v) => Some(*v as f32),
        // non-finite values carry over; finite ones must fit the f32 range
        Value::Float(v) if !v.is_finite() || v.abs() <= f64::from(f32::MAX) => Some(*v as f32),
        _ => None,
    }
}

fn coerce_f64(value: &Value) -> Option<f64> {
    value.to_f64_lossy()
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        _ => None,
    }
}

macro_rules! native_element_impl {
    ($(($ty:ty, $variant:ident, $coerce:expr)),*) => {
        $(impl NativeElement for $ty {
            const KIND: ElementKind = ElementKind::$variant;

            fn slots(array: &NativeArray) -> Option<&[Self]> {
                match array {
                    NativeArray::$variant(slots) => Some(slots),
                    _ => None,
                }
            }

            fn slots_mut(array: &mut NativeArray) -> Option<&mut [Self]> {
                match array {
                    NativeArray::$variant(slots) => Some(slots),
                    _ => None,
                }
            }

            fn into_array(slots: Box<[Self]>) -> NativeArray {
                NativeArray::$variant(slots)
            }

            fn to_value(&self) -> Value {
                Value::from(*self)
            }

            fn coerce(value: &Value) -> Option<Self> {
                $coerce(value)
            }

            #[allow(clippy::float_cmp)]
            fn same(&self, other: &Self) -> bool {
                self == other
            }
        })*
    };
}

native_element_impl!(
    (i8, Byte, coerce_integral::<i8>),
    (i16, Short, coerce_integral::<i16>),
    (u16, Char, coerce_char),
    (i32, Int, coerce_integral::<i32>),
    (i64, Long, coerce_integral::<i64>),
    (f32, Float, coerce_f32),
    (f64, Double, coerce_f64),
    (bool, Boolean, coerce_bool)
);

/// Object slots box and unbox: a raw native array read from a slot comes
/// back wrapped in a proxy, and a proxy written to a slot is stored as its
/// raw storage.
impl NativeElement for Value {
    const KIND: ElementKind = ElementKind::Object;

    fn slots(array: &NativeArray) -> Option<&[Self]> {
        match array {
            NativeArray::Object(slots) => Some(slots),
            _ => None,
        }
    }

    fn slots_mut(array: &mut NativeArray) -> Option<&mut [Self]> {
        match array {
            NativeArray::Object(slots) => Some(slots),
            _ => None,
        }
    }

    fn into_array(slots: Box<[Self]>) -> NativeArray {
        NativeArray::Object(slots)
    }

    fn to_value(&self) -> Value {
        match self {
            Value::Native(storage) => Value::Proxy(ArrayProxy::new(storage.clone())),
            other => other.clone(),
        }
    }

    fn coerce(value: &Value) -> Option<Self> {
        Some(object_slot(value.clone()))
    }

    fn same(&self, other: &Self) -> bool {
        self == other
    }
}

fn read_slot<T: NativeElement>(array: &NativeArray, index: usize) -> Option<Value> {
    T::slots(array)?.get(index).map(T::to_value)
}

fn write_slot<T: NativeElement>(
    storage: &NativeArrayRef,
    index: usize,
    value: &Value,
) -> Result<()> {
    // convert before borrowing: the value may alias this very storage
    let converted = T::from_value(value)?;
    let mut array = storage.write();
    let len = array.len();
    let slot = T::slots_mut(&mut array)
        .and_then(|slots| slots.get_mut(index))
        .ok_or_else(|| {
            ProxyError::Bounds(format!("index {} outside of array of length {}", index, len))
        })?;
    *slot = converted;
    Ok(())
}

fn slot_matches<T: NativeElement>(array: &NativeArray, index: usize, foreign: &Value) -> bool {
    match (T::slots(array).and_then(|slots| slots.get(index)), T::coerce(foreign)) {
        (Some(slot), Some(converted)) => slot.same(&converted),
        _ => false,
    }
}

fn build_array<T: NativeElement>(values: &[Value]) -> Result<NativeArray> {
    let slots = values
        .iter()
        .map(T::from_value)
        .collect::<Result<Vec<T>>>()?;
    Ok(T::into_array(slots.into_boxed_slice()))
}

/// The conversion strategy for one element kind.
///
/// Selected once per proxy by [`Converter::for_kind`]; every accessor then
/// goes through monomorphic functions without re-inspecting the kind.
#[derive(Copy, Clone)]
pub struct Converter {
    kind: ElementKind,
    read: fn(&NativeArray, usize) -> Option<Value>,
    write: fn(&NativeArrayRef, usize, &Value) -> Result<()>,
    matches: fn(&NativeArray, usize, &Value) -> bool,
    build: fn(&[Value]) -> Result<NativeArray>,
}

impl Converter {
    fn of<T: NativeElement>() -> Self {
        Converter {
            kind: T::KIND,
            read: read_slot::<T>,
            write: write_slot::<T>,
            matches: slot_matches::<T>,
            build: build_array::<T>,
        }
    }

    /// Returns the converter for `kind`.
    #[must_use]
    pub fn for_kind(kind: ElementKind) -> Self {
        use ElementKind::*;
        match kind {
            Byte => Self::of::<i8>(),
            Short => Self::of::<i16>(),
            Char => Self::of::<u16>(),
            Int => Self::of::<i32>(),
            Long => Self::of::<i64>(),
            Float => Self::of::<f32>(),
            Double => Self::of::<f64>(),
            Boolean => Self::of::<bool>(),
            Object => Self::of::<Value>(),
        }
    }

    /// The element kind this converter handles.
    #[must_use]
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Reads slot `index` as a dynamic value, or `None` past the end.
    #[must_use]
    pub fn to_dynamic(&self, array: &NativeArray, index: usize) -> Option<Value> {
        (self.read)(array, index)
    }

    /// Converts `value` and stores it in slot `index`.
    pub fn from_dynamic(
        &self,
        storage: &NativeArrayRef,
        index: usize,
        value: &Value,
    ) -> Result<()> {
        (self.write)(storage, index, value)
    }

    /// Converts `foreign` toward this kind and compares it with slot `index`.
    /// A value that does not convert never matches.
    #[must_use]
    pub fn matches(&self, array: &NativeArray, index: usize, foreign: &Value) -> bool {
        (self.matches)(array, index, foreign)
    }

    /// Builds a fresh native array holding every value of `values`.
    pub fn build(&self, values: &[Value]) -> Result<NativeArray> {
        (self.build)(values)
    }
}

impl Debug for Converter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter").field("kind", &self.kind).finish()
    }
}
