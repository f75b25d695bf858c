//! Shared, interiorly mutable handles.
//!
//! Native storage and dynamic sequences are reference types: every holder of
//! a handle sees writes made through any other handle. Without the
//! `thread_safe` feature a handle is an `Rc<RefCell<T>>`; with it, an
//! `Arc<parking_lot::RwLock<T>>`.

use std::fmt::{self, Debug, Formatter};
use std::ops::{Deref, DerefMut};

#[cfg(not(feature = "thread_safe"))]
type Inner<T> = std::rc::Rc<std::cell::RefCell<T>>;
#[cfg(feature = "thread_safe")]
type Inner<T> = std::sync::Arc<parking_lot::RwLock<T>>;

/// A cloneable handle to a value that may be mutated through any clone.
pub struct Shared<T>(Inner<T>);

impl<T> Shared<T> {
    /// Moves `value` behind a new handle.
    pub fn new(value: T) -> Self {
        #[cfg(not(feature = "thread_safe"))]
        let inner = std::rc::Rc::new(std::cell::RefCell::new(value));
        #[cfg(feature = "thread_safe")]
        let inner = std::sync::Arc::new(parking_lot::RwLock::new(value));
        Shared(inner)
    }

    /// Borrows the value for reading.
    ///
    /// Must not be held across a call that may write through another handle.
    #[cfg(not(feature = "thread_safe"))]
    pub fn read(&self) -> impl Deref<Target = T> + '_ {
        self.0.borrow()
    }

    /// Borrows the value for reading.
    ///
    /// Must not be held across a call that may write through another handle.
    /// A thread may take several read borrows of one value at once, even
    /// while a writer is waiting.
    #[cfg(feature = "thread_safe")]
    pub fn read(&self) -> impl Deref<Target = T> + '_ {
        self.0.read_recursive()
    }

    /// Borrows the value for writing.
    #[cfg(not(feature = "thread_safe"))]
    pub fn write(&self) -> impl DerefMut<Target = T> + '_ {
        self.0.borrow_mut()
    }

    /// Borrows the value for writing.
    #[cfg(feature = "thread_safe")]
    pub fn write(&self) -> impl DerefMut<Target = T> + '_ {
        self.0.write()
    }

    /// Returns `true` if both handles point at the same value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Inner::<T>::ptr_eq(&self.0, &other.0)
    }

    /// Address of the shared allocation, usable as an identity.
    pub fn addr(&self) -> usize {
        Inner::<T>::as_ptr(&self.0) as *const () as usize
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Shared(self.0.clone())
    }
}

impl<T: Debug> Debug for Shared<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&*self.read(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[mockalloc::test]
    fn writes_are_visible_through_clones() {
        let a = Shared::new(vec![1, 2, 3]);
        let b = a.clone();
        b.write()[1] = 20;

        assert_eq!(*a.read(), vec![1, 20, 3]);
        assert!(a.ptr_eq(&b));
        assert_eq!(a.addr(), b.addr());
    }

    #[mockalloc::test]
    fn distinct_handles_are_not_equal() {
        let a = Shared::new(1);
        let b = Shared::new(1);
        assert!(!a.ptr_eq(&b));
        assert_ne!(a.addr(), b.addr());
    }

    #[mockalloc::test]
    fn nested_reads_are_allowed() {
        let a = Shared::new(5);
        let outer = a.read();
        let inner = a.read();
        assert_eq!(*outer + *inner, 10);
    }

    #[cfg(feature = "thread_safe")]
    #[test]
    fn handles_cross_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<crate::ArrayProxy>();
        assert_send_sync::<crate::Value>();

        let proxy = crate::ArrayProxy::from_native(vec![1i32, 2, 3]);
        let writer = proxy.clone();
        std::thread::spawn(move || writer.set(0, crate::Value::from(7)))
            .join()
            .unwrap()
            .unwrap();
        assert_eq!(proxy.get(0), crate::Value::from(7));
        let joined = proxy.concat(&crate::Value::Proxy(proxy.clone())).unwrap();
        let crate::Value::Proxy(joined) = joined else {
            panic!("expected a proxy")
        };
        assert_eq!(joined.len(), 6);
    }
}
