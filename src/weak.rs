use crate::{count, IntrusivePtr, RefCounted};
use alloc::boxed::Box;
use branches::likely;
use core::{
    fmt,
    marker::PhantomData,
    ptr::NonNull,
    sync::atomic::{fence, Ordering},
};

/// A weak intrusive reference-counting pointer.
///
/// [`Weak<T>`] holds a weak reference to a target managed by
/// [`IntrusivePtr<T>`]: it keeps the target's storage allocated but does not
/// keep the target logically alive, and it gives no access to the target's
/// data. The only way in is [`upgrade`][`Weak::upgrade`], which succeeds
/// exactly while at least one strong pointer still exists.
///
/// Weak pointers are the tool for breaking reference cycles: a cycle of
/// strong pointers is never reclaimed, so back edges should be weak.
///
/// A `Weak<T>` is created with
/// [`IntrusivePtr::downgrade`]; there is no way to conjure one out of
/// nothing, so every `Weak<T>` always refers to a target that existed at
/// some point.
///
/// # Examples
///
/// ```
/// use intrc::{Counted, IntrusivePtr};
///
/// let strong = IntrusivePtr::new(Counted::new("alive".to_string()));
/// let weak = IntrusivePtr::downgrade(&strong);
///
/// assert!(weak.upgrade().is_some());
/// drop(strong);
/// assert!(weak.upgrade().is_none());
/// ```
pub struct Weak<T: RefCounted> {
    ptr: NonNull<T>,
    phantom: PhantomData<Box<T>>,
}

unsafe impl<T: RefCounted + Sync + Send> Send for Weak<T> {}
unsafe impl<T: RefCounted + Sync + Send> Sync for Weak<T> {}

impl<T: RefCounted> Weak<T> {
    /// Takes over one already-counted weak unit on the target behind `ptr`.
    #[inline]
    pub(crate) fn from_non_null(ptr: NonNull<T>) -> Weak<T> {
        Weak {
            ptr,
            phantom: PhantomData,
        }
    }

    /// Attempts to promote this weak reference to a strong pointer.
    ///
    /// Succeeds and returns a new [`IntrusivePtr<T>`] to the same target if
    /// the strong count is nonzero at the moment of the attempt, which is
    /// decided by a single compare-and-increment on the combined counter.
    /// Returns `None` if the last strong pointer is already gone; that is an
    /// expected outcome, not an error, and once it happens every later
    /// attempt misses too.
    ///
    /// # Examples
    ///
    /// ```
    /// use intrc::{Counted, IntrusivePtr};
    ///
    /// let five = IntrusivePtr::new(Counted::new(5));
    /// let weak_five = IntrusivePtr::downgrade(&five);
    ///
    /// let strong_five = weak_five.upgrade();
    /// assert!(strong_five.is_some());
    ///
    /// drop(strong_five);
    /// drop(five);
    /// assert!(weak_five.upgrade().is_none());
    /// ```
    #[inline]
    #[must_use]
    pub fn upgrade(&self) -> Option<IntrusivePtr<T>> {
        if self.target().ref_counter().try_increment_strong() {
            // The strong reference minted by the compare-and-increment is
            // adopted as-is; its later drop balances it.
            Some(unsafe { IntrusivePtr::from_raw(self.ptr.as_ptr()) })
        } else {
            None
        }
    }

    /// Returns the target's address. The target's data may no longer be
    /// alive; the address is only good for identity comparisons.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    /// Gets the number of strong pointers to the target. Advisory only,
    /// except that a return of zero is final: the strong count never rises
    /// from zero again.
    #[inline]
    #[must_use]
    pub fn strong_count(&self) -> u32 {
        count::strong_of(self.target().ref_counter().load())
    }

    /// Gets the number of weak references to the target, including the
    /// implicit unit held on behalf of the strong side while any strong
    /// pointer exists. Advisory only.
    #[inline]
    #[must_use]
    pub fn weak_count(&self) -> u32 {
        count::weak_of(self.target().ref_counter().load())
    }

    /// Compares if two weak pointers reference the same target.
    #[inline]
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.ptr.as_ptr() == other.ptr.as_ptr()
    }

    #[inline(always)]
    fn target(&self) -> &T {
        // SAFETY: the weak reference this pointer owns keeps the target
        // allocated (and un-dropped) until the weak count reaches zero, so
        // its counter stays accessible even after the strong side died.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: RefCounted> Clone for Weak<T> {
    /// Makes another weak pointer to the same target with one relaxed atomic
    /// increment of the weak count.
    #[inline]
    fn clone(&self) -> Self {
        self.target().ref_counter().increment_weak();
        Weak::from_non_null(self.ptr)
    }
}

impl<T: RefCounted> Drop for Weak<T> {
    #[inline]
    fn drop(&mut self) {
        let old = self.target().ref_counter().decrement_weak();
        if likely(count::weak_of(old) != 1) {
            return;
        }
        // Last weak reference of any kind: the strong side already released
        // its implicit unit, so the target is free to go. Its Drop runs now.
        fence(Ordering::Acquire);
        unsafe {
            let _ = Box::from_raw(self.ptr.as_ptr());
        }
    }
}

impl<T: RefCounted> fmt::Debug for Weak<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(Weak)")
    }
}
