//! Fixed-length native array storage

use std::fmt::{self, Debug, Formatter};

use crate::error::{ProxyError, Result};
use crate::kind::ElementKind;
use crate::sync::Shared;
use crate::Value;

/// Highest dimensionality accepted by [`NativeArray::allocate`].
pub const MAX_DIMENSIONS: usize = 255;

/// A fixed-length, homogeneous array of one element kind.
///
/// Each variant owns a boxed slice, so the length can never change once the
/// array exists. Object slots hold dynamic values; a nested native array is
/// stored as [`Value::Native`].
#[derive(Clone, PartialEq)]
pub enum NativeArray {
    /// `byte` slots
    Byte(Box<[i8]>),
    /// `short` slots
    Short(Box<[i16]>),
    /// `char` slots
    Char(Box<[u16]>),
    /// `int` slots
    Int(Box<[i32]>),
    /// `long` slots
    Long(Box<[i64]>),
    /// `float` slots
    Float(Box<[f32]>),
    /// `double` slots
    Double(Box<[f64]>),
    /// `boolean` slots
    Boolean(Box<[bool]>),
    /// Object reference slots
    Object(Box<[Value]>),
}

/// Shared handle to native storage. Every proxy over the same storage holds
/// a clone of the same handle.
pub type NativeArrayRef = Shared<NativeArray>;

/// Evaluates `$body` with `$slice` bound to the typed slots of any variant.
macro_rules! with_slots {
    ($array:expr, $slice:ident => $body:expr) => {
        match $array {
            NativeArray::Byte($slice) => $body,
            NativeArray::Short($slice) => $body,
            NativeArray::Char($slice) => $body,
            NativeArray::Int($slice) => $body,
            NativeArray::Long($slice) => $body,
            NativeArray::Float($slice) => $body,
            NativeArray::Double($slice) => $body,
            NativeArray::Boolean($slice) => $body,
            NativeArray::Object($slice) => $body,
        }
    };
}

pub(crate) use with_slots;

/// Like `with_slots!`, but wraps the result back into the same variant.
macro_rules! map_slots {
    ($array:expr, $slice:ident => $body:expr) => {
        match $array {
            NativeArray::Byte($slice) => NativeArray::Byte($body),
            NativeArray::Short($slice) => NativeArray::Short($body),
            NativeArray::Char($slice) => NativeArray::Char($body),
            NativeArray::Int($slice) => NativeArray::Int($body),
            NativeArray::Long($slice) => NativeArray::Long($body),
            NativeArray::Float($slice) => NativeArray::Float($body),
            NativeArray::Double($slice) => NativeArray::Double($body),
            NativeArray::Boolean($slice) => NativeArray::Boolean($body),
            NativeArray::Object($slice) => NativeArray::Object($body),
        }
    };
}

fn filled<T: Clone>(len: usize, value: T) -> Result<Box<[T]>> {
    let mut slots = Vec::new();
    slots
        .try_reserve_exact(len)
        .map_err(|e| ProxyError::Allocation(format!("cannot reserve {} slots: {}", len, e)))?;
    slots.resize(len, value);
    Ok(slots.into_boxed_slice())
}

impl NativeArray {
    /// Allocates `len` slots of `kind`, each set to the kind's zero value.
    pub fn zeroed(kind: ElementKind, len: usize) -> Result<Self> {
        use ElementKind::*;
        Ok(match kind {
            Byte => NativeArray::Byte(filled(len, 0)?),
            Short => NativeArray::Short(filled(len, 0)?),
            Char => NativeArray::Char(filled(len, 0)?),
            Int => NativeArray::Int(filled(len, 0)?),
            Long => NativeArray::Long(filled(len, 0)?),
            Float => NativeArray::Float(filled(len, 0.0)?),
            Double => NativeArray::Double(filled(len, 0.0)?),
            Boolean => NativeArray::Boolean(filled(len, false)?),
            Object => NativeArray::Object(filled(len, Value::Nil)?),
        })
    }

    /// Allocates an array with one or more dimensions.
    ///
    /// A single dimension yields an array of `kind`. With more dimensions the
    /// outer arrays are object arrays whose slots hold the next dimension's
    /// native arrays; only the innermost arrays are of `kind`.
    pub fn allocate(kind: ElementKind, dimensions: &[i64]) -> Result<Self> {
        if dimensions.is_empty() || dimensions.len() > MAX_DIMENSIONS {
            return Err(ProxyError::Allocation(format!(
                "can not create {} dimensional array",
                dimensions.len()
            )));
        }
        let sizes = dimensions
            .iter()
            .map(|&d| {
                usize::try_from(d)
                    .map_err(|_| ProxyError::Allocation(format!("negative array size: {}", d)))
            })
            .collect::<Result<Vec<usize>>>()?;
        Self::allocate_sizes(kind, &sizes)
    }

    fn allocate_sizes(kind: ElementKind, sizes: &[usize]) -> Result<Self> {
        match sizes {
            [len] => Self::zeroed(kind, *len),
            [len, inner @ ..] => {
                let mut slots = Vec::new();
                slots.try_reserve_exact(*len).map_err(|e| {
                    ProxyError::Allocation(format!("cannot reserve {} slots: {}", len, e))
                })?;
                for _ in 0..*len {
                    slots.push(Value::Native(Self::allocate_sizes(kind, inner)?.into_shared()));
                }
                Ok(NativeArray::Object(slots.into_boxed_slice()))
            }
            [] => Err(ProxyError::Allocation(
                "can not create 0 dimensional array".into(),
            )),
        }
    }

    /// Moves the array behind a shared handle.
    #[must_use]
    pub fn into_shared(self) -> NativeArrayRef {
        Shared::new(self)
    }

    /// Element kind of every slot.
    #[must_use]
    pub fn kind(&self) -> ElementKind {
        match self {
            NativeArray::Byte(_) => ElementKind::Byte,
            NativeArray::Short(_) => ElementKind::Short,
            NativeArray::Char(_) => ElementKind::Char,
            NativeArray::Int(_) => ElementKind::Int,
            NativeArray::Long(_) => ElementKind::Long,
            NativeArray::Float(_) => ElementKind::Float,
            NativeArray::Double(_) => ElementKind::Double,
            NativeArray::Boolean(_) => ElementKind::Boolean,
            NativeArray::Object(_) => ElementKind::Object,
        }
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        with_slots!(self, s => s.len())
    }

    /// Returns `true` if the array has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies `len` slots starting at `start` into a new array of the same
    /// kind. Panics if the window is outside the array; callers validate it
    /// through the index normalizer first.
    pub(crate) fn subarray(&self, start: usize, len: usize) -> NativeArray {
        let end = start + len;
        map_slots!(self, s => s[start..end].into())
    }

    /// Joins two arrays of the same kind. Returns `None` for mismatched kinds.
    pub(crate) fn concat(&self, other: &NativeArray) -> Option<NativeArray> {
        use NativeArray::*;
        fn join<T: Clone>(a: &[T], b: &[T]) -> Box<[T]> {
            a.iter().chain(b.iter()).cloned().collect()
        }
        Some(match (self, other) {
            (Byte(a), Byte(b)) => Byte(join(a, b)),
            (Short(a), Short(b)) => Short(join(a, b)),
            (Char(a), Char(b)) => Char(join(a, b)),
            (Int(a), Int(b)) => Int(join(a, b)),
            (Long(a), Long(b)) => Long(join(a, b)),
            (Float(a), Float(b)) => Float(join(a, b)),
            (Double(a), Double(b)) => Double(join(a, b)),
            (Boolean(a), Boolean(b)) => Boolean(join(a, b)),
            (Object(a), Object(b)) => Object(join(a, b)),
            _ => return None,
        })
    }
}

impl Debug for NativeArray {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        with_slots!(self, s => Debug::fmt(s, f))
    }
}

macro_rules! from_vec_impl {
    ($(($ty:ty, $variant:ident)),*) => {
        $(impl From<Vec<$ty>> for NativeArray {
            fn from(other: Vec<$ty>) -> Self {
                NativeArray::$variant(other.into_boxed_slice())
            }
        }

        impl From<&[$ty]> for NativeArray {
            fn from(other: &[$ty]) -> Self {
                NativeArray::$variant(other.into())
            }
        })*
    };
}

from_vec_impl!(
    (i8, Byte),
    (i16, Short),
    (u16, Char),
    (i32, Int),
    (i64, Long),
    (f32, Float),
    (f64, Double),
    (bool, Boolean)
);

/// Normalizes a value for storage in an object slot: a proxy is stored as
/// its raw storage.
pub(crate) fn object_slot(value: Value) -> Value {
    match value {
        Value::Proxy(proxy) => Value::Native(proxy.storage().clone()),
        other => other,
    }
}

impl From<Vec<Value>> for NativeArray {
    fn from(other: Vec<Value>) -> Self {
        NativeArray::Object(other.into_iter().map(object_slot).collect())
    }
}

impl From<&[Value]> for NativeArray {
    fn from(other: &[Value]) -> Self {
        NativeArray::Object(other.iter().cloned().map(object_slot).collect())
    }
}
