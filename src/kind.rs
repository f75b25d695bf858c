//! Element kinds of native arrays

use std::fmt::{self, Display, Formatter};
use std::mem::size_of;

use hashbrown::HashMap;
use lazy_static::lazy_static;

use crate::Value;

/// Tag indicating the type of every slot stored in a native array
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Signed 8-bit integers
    Byte = 0,
    /// Signed 16-bit integers
    Short = 1,
    /// Unsigned 16-bit code units
    Char = 2,
    /// Signed 32-bit integers
    Int = 3,
    /// Signed 64-bit integers
    Long = 4,
    /// 32-bit floats
    Float = 5,
    /// 64-bit floats
    Double = 6,
    /// Booleans
    Boolean = 7,
    /// References to arbitrary dynamic values
    Object = 8,
}

lazy_static! {
    static ref KIND_NAMES: HashMap<&'static str, ElementKind> = {
        use ElementKind::*;
        let mut names = HashMap::new();
        for (kind, aliases) in [
            (Byte, &["byte", "i8", "java.lang.Byte"][..]),
            (Short, &["short", "i16", "java.lang.Short"][..]),
            (Char, &["char", "u16", "java.lang.Character"][..]),
            (Int, &["int", "i32", "java.lang.Integer"][..]),
            (Long, &["long", "i64", "java.lang.Long"][..]),
            (Float, &["float", "f32", "java.lang.Float"][..]),
            (Double, &["double", "f64", "java.lang.Double"][..]),
            (Boolean, &["boolean", "bool", "java.lang.Boolean"][..]),
            (Object, &["object", "java.lang.Object"][..]),
        ] {
            for alias in aliases {
                names.insert(*alias, kind);
            }
        }
        names
    };
}

impl ElementKind {
    /// Every element kind, in tag order.
    pub const ALL: [ElementKind; 9] = [
        ElementKind::Byte,
        ElementKind::Short,
        ElementKind::Char,
        ElementKind::Int,
        ElementKind::Long,
        ElementKind::Float,
        ElementKind::Double,
        ElementKind::Boolean,
        ElementKind::Object,
    ];

    /// Looks up a kind by its name or one of its aliases (`"int"`, `"i32"`,
    /// `"java.lang.Integer"`).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        KIND_NAMES.get(name).copied()
    }

    /// The canonical name of the kind, as used when rendering arrays.
    #[must_use]
    pub fn name(self) -> &'static str {
        use ElementKind::*;
        match self {
            Byte => "byte",
            Short => "short",
            Char => "char",
            Int => "int",
            Long => "long",
            Float => "float",
            Double => "double",
            Boolean => "boolean",
            Object => "object",
        }
    }

    /// Size in bytes of a single slot.
    #[must_use]
    pub fn element_size(self) -> usize {
        use ElementKind::*;
        match self {
            Byte => size_of::<i8>(),
            Short => size_of::<i16>(),
            Char => size_of::<u16>(),
            Int => size_of::<i32>(),
            Long => size_of::<i64>(),
            Float => size_of::<f32>(),
            Double => size_of::<f64>(),
            Boolean => size_of::<bool>(),
            Object => size_of::<Value>(),
        }
    }

    /// Returns `true` for every kind except [`ElementKind::Object`].
    #[must_use]
    pub fn is_primitive(self) -> bool {
        self != ElementKind::Object
    }

    /// Returns `true` for the integral kinds, including `char`.
    #[must_use]
    pub fn is_integral(self) -> bool {
        use ElementKind::*;
        matches!(self, Byte | Short | Char | Int | Long)
    }

    /// Returns `true` for `float` and `double`.
    #[must_use]
    pub fn is_floating(self) -> bool {
        matches!(self, ElementKind::Float | ElementKind::Double)
    }

    /// Inclusive range of integers representable by an integral kind.
    #[must_use]
    pub fn integral_bounds(self) -> Option<(i64, i64)> {
        use ElementKind::*;
        match self {
            Byte => Some((i8::MIN.into(), i8::MAX.into())),
            Short => Some((i16::MIN.into(), i16::MAX.into())),
            Char => Some((u16::MIN.into(), u16::MAX.into())),
            Int => Some((i32::MIN.into(), i32::MAX.into())),
            Long => Some((i64::MIN, i64::MAX)),
            Float | Double | Boolean | Object => None,
        }
    }

    /// Whether arrays of `other` can be stored into arrays of this kind
    /// without conversion. Primitive kinds only accept themselves, and the
    /// single object kind only accepts object arrays.
    #[must_use]
    pub fn is_assignable_from(self, other: ElementKind) -> bool {
        self == other
    }
}

impl Display for ElementKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for kind in ElementKind::ALL {
            assert_eq!(ElementKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ElementKind::from_name("i8"), Some(ElementKind::Byte));
        assert_eq!(
            ElementKind::from_name("java.lang.Object"),
            Some(ElementKind::Object)
        );
        assert_eq!(ElementKind::from_name("decimal"), None);
    }

    #[test]
    fn bounds_cover_integral_kinds_only() {
        assert_eq!(ElementKind::Byte.integral_bounds(), Some((-128, 127)));
        assert_eq!(ElementKind::Char.integral_bounds(), Some((0, 65535)));
        assert_eq!(ElementKind::Double.integral_bounds(), None);
        assert_eq!(ElementKind::Object.integral_bounds(), None);
        assert!(ElementKind::ALL
            .iter()
            .all(|k| k.is_integral() == k.integral_bounds().is_some()));
    }

    #[test]
    fn element_sizes() {
        assert_eq!(ElementKind::Byte.element_size(), 1);
        assert_eq!(ElementKind::Char.element_size(), 2);
        assert_eq!(ElementKind::Double.element_size(), 8);
        assert!(ElementKind::Boolean.is_primitive());
        assert!(!ElementKind::Object.is_primitive());
    }
}
