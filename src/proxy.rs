//! The array proxy and its access layer
//!
//! An [`ArrayProxy`] gives a fixed-length native array the behavior of a
//! dynamic sequence. The proxy never copies its storage: every proxy created
//! over the same [`NativeArrayRef`] reads and writes the same slots.
//!
//! Reads are lenient (`get`, `at` return nil outside the array) and writes
//! are strict (`set`, `aset` fail with [`ProxyError::Bounds`]). Slicing by
//! range clips to the array; slicing by `(first, length)` pair does not.

use std::fmt::{self, Debug, Formatter};
use std::ops::Range;

use log::{debug, trace};

use crate::convert::Converter;
use crate::error::{ProxyError, Result};
use crate::index::{self, Selector};
use crate::kind::ElementKind;
use crate::native::{NativeArray, NativeArrayRef};
use crate::sync::Shared;
use crate::value::FieldMap;
use crate::Value;

/// Object state the host attaches to a proxy: instance variables and the
/// frozen and tainted flags.
#[derive(Clone, Debug, Default)]
pub(crate) struct ProxyState {
    pub(crate) ivars: FieldMap,
    pub(crate) frozen: bool,
    pub(crate) tainted: bool,
}

/// A dynamic-sequence view of a native array.
///
/// Cloning the proxy yields another handle to the same proxy object: same
/// storage, same metadata. Use [`ArrayProxy::dup`] for an independent copy.
#[derive(Clone)]
pub struct ArrayProxy {
    storage: NativeArrayRef,
    converter: Converter,
    state: Shared<ProxyState>,
}

impl ArrayProxy {
    /// Wraps existing storage. The element kind and converter are taken from
    /// the storage and never change afterwards.
    #[must_use]
    pub fn new(storage: NativeArrayRef) -> Self {
        let kind = storage.read().kind();
        ArrayProxy {
            storage,
            converter: Converter::for_kind(kind),
            state: Shared::new(ProxyState::default()),
        }
    }

    /// Moves a freshly built native array behind a new proxy.
    #[must_use]
    pub fn from_native(array: impl Into<NativeArray>) -> Self {
        Self::new(array.into().into_shared())
    }

    /// Allocates zeroed storage of `kind` with the given dimensions and
    /// wraps it. See [`NativeArray::allocate`] for the layout of
    /// multi-dimensional arrays.
    pub fn allocate(kind: ElementKind, dimensions: &[i64]) -> Result<Self> {
        debug!("allocating {} array with dimensions {:?}", kind, dimensions);
        NativeArray::allocate(kind, dimensions).map(Self::from_native)
    }

    /// Wraps a raw native array handle. Every other value is rejected.
    pub fn wrap(value: &Value) -> Result<Self> {
        match value {
            Value::Native(storage) => {
                let proxy = Self::new(storage.clone());
                debug!("wrapped {} array of length {}", proxy.kind(), proxy.len());
                Ok(proxy)
            }
            other => Err(ProxyError::TypeMismatch(format!(
                "{} is not a native array",
                other.type_name()
            ))),
        }
    }

    /// Converts `values` into a fresh native array of `kind`.
    pub fn from_values(kind: ElementKind, values: &[Value]) -> Result<Self> {
        debug!("building {} array from {} values", kind, values.len());
        Converter::for_kind(kind).build(values).map(Self::from_native)
    }

    /// The shared storage handle.
    #[must_use]
    pub fn storage(&self) -> &NativeArrayRef {
        &self.storage
    }

    /// The converter bound to this proxy's element kind.
    #[must_use]
    pub fn converter(&self) -> Converter {
        self.converter
    }

    /// Element kind of the storage.
    #[must_use]
    pub fn kind(&self) -> ElementKind {
        self.converter.kind()
    }

    /// Same as [`ArrayProxy::kind`].
    #[must_use]
    pub fn component_type(&self) -> ElementKind {
        self.kind()
    }

    /// Number of elements. Never changes over the life of the proxy.
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.read().len()
    }

    /// Same as [`ArrayProxy::len`].
    #[must_use]
    pub fn size(&self) -> usize {
        self.len()
    }

    /// Returns `true` if the array has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn element(&self, index: usize) -> Option<Value> {
        self.converter.to_dynamic(&self.storage.read(), index)
    }

    /// Copies every element out as a dynamic value.
    #[must_use]
    pub fn elements(&self) -> Vec<Value> {
        let array = self.storage.read();
        (0..array.len())
            .filter_map(|i| self.converter.to_dynamic(&array, i))
            .collect()
    }

    /// Reads the element at `index`, wrapping negative indices. Returns nil
    /// outside the array.
    #[must_use]
    pub fn get(&self, index: i64) -> Value {
        index::normalize(index, self.len())
            .and_then(|i| self.element(i))
            .unwrap_or(Value::Nil)
    }

    /// Like [`ArrayProxy::get`], taking the index as a dynamic value.
    pub fn at(&self, index: &Value) -> Result<Value> {
        index::index_from_value(index).map(|i| self.get(i))
    }

    /// Reads the element at `index`, wrapping negative indices. Fails
    /// outside the array.
    pub fn fetch(&self, index: i64) -> Result<Value> {
        let len = self.len();
        index::normalize(index, len)
            .and_then(|i| self.element(i))
            .ok_or_else(|| out_of_bounds(index, len))
    }

    /// Subscript read: an integer reads one element strictly, an integer
    /// range returns a sliced proxy.
    pub fn aref(&self, subscript: &Value) -> Result<Value> {
        self.select(Selector::from_value(subscript)?)
    }

    /// Subscript read with positional arguments: `(index)`, `(range)` or
    /// `(first, length)`.
    pub fn aref_args(&self, args: &[Value]) -> Result<Value> {
        self.select(Selector::from_args(args)?)
    }

    fn select(&self, selector: Selector) -> Result<Value> {
        match selector {
            Selector::Index(i) => self.fetch(i),
            other => self.slice_selector(other).map(Value::Proxy),
        }
    }

    /// Converts `value` to the element kind and stores it at `index`,
    /// wrapping negative indices. Returns the stored value.
    pub fn set(&self, index: i64, value: Value) -> Result<Value> {
        let len = self.len();
        let slot = index::normalize(index, len).ok_or_else(|| out_of_bounds(index, len))?;
        self.converter.from_dynamic(&self.storage, slot, &value)?;
        Ok(value)
    }

    /// Like [`ArrayProxy::set`], taking the index as a dynamic value.
    pub fn aset(&self, index: &Value, value: Value) -> Result<Value> {
        self.set(index::index_from_value(index)?, value)
    }

    /// Slices by an integer range or by a two-element `[first, length]`
    /// sequence.
    pub fn slice(&self, selector: &Value) -> Result<ArrayProxy> {
        let selector = match selector {
            Value::Array(_) => Selector::from_args(&selector.to_vec().unwrap_or_default())?,
            Value::Range(_) => Selector::from_value(selector)?,
            other => return Err(ProxyError::type_mismatch(other, "Range")),
        };
        self.slice_selector(selector)
    }

    fn slice_selector(&self, selector: Selector) -> Result<ArrayProxy> {
        match selector {
            Selector::Range {
                first,
                last,
                exclude_end,
            } => Ok(self.slice_range(first, last, exclude_end)),
            Selector::Pair { first, length } => self.slice_pair(first, length),
            Selector::Index(_) => Err(ProxyError::TypeMismatch(
                "slice requires a range or a (first, length) pair".into(),
            )),
        }
    }

    /// Copies the elements selected by a range into a new proxy of the same
    /// kind. Out-of-bounds ranges give an empty proxy.
    #[must_use]
    pub fn slice_range(&self, first: i64, last: i64, exclude_end: bool) -> ArrayProxy {
        let window = index::range_window(first, last, exclude_end, self.len());
        self.copy_window(window)
    }

    /// Copies `length` elements starting at `first` into a new proxy of the
    /// same kind.
    pub fn slice_pair(&self, first: i64, length: i64) -> Result<ArrayProxy> {
        let window = index::pair_window(first, length, self.len())?;
        Ok(self.copy_window(window))
    }

    fn copy_window(&self, window: Range<usize>) -> ArrayProxy {
        trace!("slicing {} array at {:?}", self.kind(), window);
        let copy = self.storage.read().subarray(window.start, window.len());
        ArrayProxy::from_native(copy)
    }

    /// Appends `other` to a copy of this array.
    ///
    /// A proxy of the same kind yields a new proxy. A proxy of another kind
    /// or a dynamic sequence yields a dynamic sequence of both arrays'
    /// elements.
    pub fn concat(&self, other: &Value) -> Result<Value> {
        match other {
            Value::Proxy(tail) if self.kind().is_assignable_from(tail.kind()) => {
                trace!("concatenating {} arrays natively", self.kind());
                let joined = self.storage.read().concat(&tail.storage.read());
                joined
                    .map(|array| Value::Proxy(ArrayProxy::from_native(array)))
                    .ok_or_else(|| ProxyError::type_mismatch(other, self.kind().name()))
            }
            Value::Proxy(tail) => {
                trace!("concatenating {} and {} arrays", self.kind(), tail.kind());
                let mut items = self.elements();
                items.extend(tail.elements());
                Ok(Value::array(items))
            }
            Value::Array(seq) => {
                let mut items = self.elements();
                items.extend(seq.read().iter().cloned());
                Ok(Value::array(items))
            }
            other => Err(ProxyError::type_mismatch(other, "Array")),
        }
    }

    /// Reads an instance variable, nil when unset.
    #[must_use]
    pub fn ivar(&self, name: &str) -> Value {
        self.state.read().ivars.get(name).cloned().unwrap_or(Value::Nil)
    }

    /// Sets an instance variable, returning the value.
    pub fn set_ivar(&self, name: impl Into<String>, value: impl Into<Value>) -> Value {
        let value = value.into();
        self.state.write().ivars.insert(name.into(), value.clone());
        value
    }

    /// Marks the proxy object frozen.
    pub fn freeze(&self) {
        self.state.write().frozen = true;
    }

    /// Returns `true` once [`ArrayProxy::freeze`] has been called.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.state.read().frozen
    }

    /// Marks the proxy object tainted.
    pub fn taint(&self) {
        self.state.write().tainted = true;
    }

    /// Returns `true` once [`ArrayProxy::taint`] has been called.
    #[must_use]
    pub fn is_tainted(&self) -> bool {
        self.state.read().tainted
    }

    pub(crate) fn state(&self) -> ProxyState {
        self.state.read().clone()
    }

    pub(crate) fn with_state(self, state: ProxyState) -> Self {
        *self.state.write() = state;
        self
    }
}

fn out_of_bounds(index: i64, len: usize) -> ProxyError {
    ProxyError::Bounds(format!(
        "index {} outside of array bounds: -{}...{}",
        index, len, len
    ))
}

impl From<NativeArray> for ArrayProxy {
    fn from(array: NativeArray) -> Self {
        Self::from_native(array)
    }
}

impl Debug for ArrayProxy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayProxy")
            .field("kind", &self.kind())
            .field("storage", &self.storage)
            .finish()
    }
}
