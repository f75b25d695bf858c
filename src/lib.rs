//! Native-array proxies for a dynamic object system.
//!
//! A host language with its own dynamic sequence type sometimes has to hand
//! out fixed-length arrays of primitive slots (`byte`, `int`, `double`, ...)
//! allocated elsewhere. This crate wraps such an array in an [`ArrayProxy`]
//! that behaves like a host sequence: negative indices, range slicing,
//! iteration with and without a block, structural equality and hashing,
//! membership tests and `dig`. Every value crossing the boundary is a
//! [`Value`], converted to and from the array's [`ElementKind`] by a
//! per-kind [`Converter`].
//!
//! ```
//! use arrayproxy::{ArrayProxy, ElementKind, Value};
//!
//! let bytes = ArrayProxy::from_values(ElementKind::Byte, &[1.into(), 2.into(), 3.into()])?;
//! assert_eq!(bytes.get(-1), Value::from(3));
//! assert_eq!(
//!     bytes.aref(&Value::range(1, -1, false))?,
//!     Value::array(vec![2.into(), 3.into()])
//! );
//! assert!(bytes.set(5, Value::from(0)).is_err());
//! # Ok::<(), arrayproxy::ProxyError>(())
//! ```
//!
//! Storage is shared: every proxy built over the same [`NativeArrayRef`]
//! observes writes made through the others. By default handles are
//! single-threaded; the `thread_safe` feature makes them `Send + Sync`.
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod convert;
pub mod de;
pub mod error;
pub mod index;
pub mod kind;
pub mod native;
pub mod proxy;
pub mod sequence;
mod ser;
mod structural;
pub mod sync;
pub mod value;

pub use convert::{Converter, NativeElement};
pub use de::ElementSeed;
pub use error::{ProxyError, Result};
pub use kind::ElementKind;
pub use native::{NativeArray, NativeArrayRef, MAX_DIMENSIONS};
pub use proxy::ArrayProxy;
pub use sequence::{Block, EnumMethod, Enumerator, Iteration};
pub use sync::Shared;
pub use value::{ObjectRef, RangeValue, SeqRef, Value};
