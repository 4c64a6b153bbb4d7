//! Shared heap payload for reference-typed values.
//!
//! `Heap<T>` is an `Arc<T>` whose constructor is visible only inside the
//! value module, so strings, arrays, dictionaries, host objects and
//! wrappers are always built through the factory methods on `Value`.
//! Reference identity (`ptr_id`) is what instance-identity guards compare.

use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};

#[repr(transparent)]
pub struct Heap<T: ?Sized>(Arc<T>);

impl<T> Heap<T> {
    #[inline]
    pub(super) fn new(value: T) -> Self {
        Heap(Arc::new(value))
    }
}

impl Heap<str> {
    #[inline]
    pub(super) fn new_str(s: &str) -> Self {
        Heap(Arc::from(s))
    }
}

impl<T: ?Sized> Heap<T> {
    /// Address of the shared allocation. Stable for the payload's lifetime.
    #[inline]
    pub fn ptr_id(&self) -> usize {
        Arc::as_ptr(&self.0).cast::<()>() as usize
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: Any + Send + Sync> Heap<T> {
    /// Weak handle that does not keep the payload alive.
    pub fn downgrade(&self) -> WeakHeap {
        let weak: Weak<dyn Any + Send + Sync> = Arc::downgrade(&self.0) as Weak<T>;
        WeakHeap(weak)
    }
}

/// Type-erased weak reference to a heap payload.
///
/// While a `WeakHeap` exists the allocation is not released, so the
/// payload's `ptr_id` cannot be handed to another value.
#[derive(Clone)]
pub struct WeakHeap(Weak<dyn Any + Send + Sync>);

impl WeakHeap {
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    #[inline]
    pub fn ptr_id(&self) -> usize {
        self.0.as_ptr().cast::<()>() as usize
    }
}

impl fmt::Debug for WeakHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakHeap(@{:x}, alive={})", self.ptr_id(), self.is_alive())
    }
}

impl<T: ?Sized> Deref for Heap<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: ?Sized> Clone for Heap<T> {
    #[inline]
    fn clone(&self) -> Self {
        Heap(Arc::clone(&self.0))
    }
}

impl<T: ?Sized> AsRef<T> for Heap<T> {
    #[inline]
    fn as_ref(&self) -> &T {
        &self.0
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Heap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_allocation() {
        let a = Heap::new(String::from("shale"));
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.ptr_id(), b.ptr_id());
        assert_eq!(&*b, "shale");
    }

    #[test]
    fn test_weak_handle_tracks_liveness() {
        let a = Heap::new(String::from("shale"));
        let weak = a.downgrade();
        assert!(weak.is_alive());
        assert_eq!(weak.ptr_id(), a.ptr_id());
        drop(a);
        assert!(!weak.is_alive());
    }

    #[test]
    fn test_distinct_allocations_differ() {
        let a = Heap::new(1_u8);
        let b = Heap::new(1_u8);
        assert!(!a.ptr_eq(&b));
    }
}
