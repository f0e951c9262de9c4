use crate::{count, RefCounted, Weak};
use alloc::boxed::Box;
use branches::likely;
use core::{
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    ops::Deref,
    pin::Pin,
    ptr::NonNull,
    sync::atomic::{fence, Ordering},
};

/// A strong intrusive reference-counting pointer.
///
/// [`IntrusivePtr<T>`] provides shared ownership of a heap-allocated target
/// whose reference counts live inside the target itself (see
/// [`RefCounted`]). The pointer is a single machine word: no separate
/// control block is allocated and no second indirection is paid on access.
/// Cloning the pointer increments the target's strong count; dropping it
/// decrements the count, and the drop that takes the strong count to zero
/// runs the target's [`release_resources`][`RefCounted::release_resources`]
/// hook exactly once and frees the target unless weak pointers still pin it.
///
/// The counts are synchronized with lock-free atomics, so strong and weak
/// pointers to one target may be cloned and dropped freely from any number
/// of threads. Only the counts are synchronized: the target's own data gets
/// no locking from this type, which is why a shared target is only reachable
/// through `&T`.
///
/// Reference cycles are not detected. Two targets holding strong pointers to
/// each other keep each other alive forever; use [`Weak<T>`] for back edges.
///
/// # Cloning references
///
/// Creating a new pointer to the same target is done with the usual `Clone`
/// implementation:
///
/// ```
/// use intrc::{Counted, IntrusivePtr};
///
/// let foo = IntrusivePtr::new(Counted::new(vec![1.0, 2.0, 3.0]));
/// // The two syntaxes below are equivalent.
/// let a = foo.clone();
/// let b = IntrusivePtr::clone(&foo);
/// assert!(IntrusivePtr::ptr_eq(&a, &b));
/// ```
///
/// # Null
///
/// There is no null `IntrusivePtr<T>`; absence is spelled
/// `Option<IntrusivePtr<T>>`, which the niche optimization keeps at the same
/// single-word size.
pub struct IntrusivePtr<T: RefCounted> {
    ptr: NonNull<T>,
    phantom: PhantomData<Box<T>>,
}

unsafe impl<T: RefCounted + Sync + Send> Send for IntrusivePtr<T> {}
unsafe impl<T: RefCounted + Sync + Send> Sync for IntrusivePtr<T> {}

impl<T: RefCounted> IntrusivePtr<T> {
    /// Moves a target to the heap and takes ownership of it.
    ///
    /// The target's counter must be in the unowned state (all zeros, as
    /// produced by [`RefCounter::new`][`crate::RefCounter::new`]); this is
    /// debug-asserted. The counter is then set to strong = 1, weak = 1 with
    /// a single atomic store. The weak unit is the one held on behalf of the
    /// strong side as a whole; it is handed back when the last strong
    /// pointer goes away.
    ///
    /// # Examples
    ///
    /// ```
    /// use intrc::{Counted, IntrusivePtr};
    ///
    /// let tada = IntrusivePtr::new(Counted::new("Tada!".to_string()));
    /// assert_eq!(tada.strong_count(), 1);
    /// assert_eq!(tada.weak_count(), 1);
    /// ```
    #[inline]
    pub fn new(target: T) -> IntrusivePtr<T> {
        // Safety: box is always not null
        let ptr = unsafe { NonNull::new_unchecked(Box::leak(Box::new(target))) };
        unsafe { ptr.as_ref() }.ref_counter().make_unique();
        IntrusivePtr {
            ptr,
            phantom: PhantomData,
        }
    }

    /// Constructs a new `Pin<IntrusivePtr<T>>`. If `T` does not implement
    /// `Unpin`, then the target will be pinned in memory and unable to be
    /// moved.
    #[inline]
    #[must_use]
    pub fn pin(target: T) -> Pin<IntrusivePtr<T>> {
        unsafe { Pin::new_unchecked(IntrusivePtr::new(target)) }
    }

    /// Gives you a pointer to the target. The reference count stays the same
    /// and the [`IntrusivePtr<T>`] isn't used up. The pointer stays valid as
    /// long as there are strong references to the target.
    ///
    /// # Examples
    ///
    /// ```
    /// use intrc::{Counted, IntrusivePtr};
    ///
    /// let x = IntrusivePtr::new(Counted::new("hello".to_owned()));
    /// let y = IntrusivePtr::clone(&x);
    /// assert_eq!(x.as_ptr(), y.as_ptr());
    /// assert_eq!(unsafe { &**x.as_ptr() }, "hello");
    /// ```
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    /// Turns the pointer into a raw target address without touching the
    /// counts, must be converted back with [`IntrusivePtr::from_raw`] to
    /// avoid a leak.
    ///
    /// # Examples
    ///
    /// ```
    /// use intrc::{Counted, IntrusivePtr};
    ///
    /// let x = IntrusivePtr::new(Counted::new("hello".to_owned()));
    /// let x_ptr = IntrusivePtr::into_raw(x);
    /// assert_eq!(unsafe { &**x_ptr }, "hello");
    /// // reconstruct the pointer to drop the reference and avoid a leak
    /// unsafe { IntrusivePtr::from_raw(x_ptr) };
    /// ```
    #[inline]
    pub fn into_raw(this: Self) -> *const T {
        let ptr = Self::as_ptr(&this);
        core::mem::forget(this);
        ptr
    }

    /// Reconstructs an [`IntrusivePtr<T>`] from a raw target address without
    /// touching the counts: the strong reference given up by
    /// [`IntrusivePtr::into_raw`] is adopted as-is.
    ///
    /// # Safety
    ///
    /// The address must come from [`IntrusivePtr::into_raw`], and each such
    /// address may be reconstructed at most once. Anything else
    /// double-counts or double-frees the target.
    #[inline]
    pub unsafe fn from_raw(ptr: *const T) -> Self {
        IntrusivePtr {
            ptr: NonNull::new_unchecked(ptr as *mut T),
            phantom: PhantomData,
        }
    }

    /// Mints a new strong pointer from a borrowed target.
    ///
    /// This is the intrusive escape hatch for interop: because the counter
    /// lives inside the target, a plain `&T` is enough to re-enter the
    /// counted world. The strong count is incremented.
    ///
    /// # Safety
    ///
    /// The target must be owned by this crate (it was created by
    /// [`IntrusivePtr::new`]) and its strong count must be nonzero for the
    /// whole call. Both hold for any `&T` borrowed through a live
    /// [`IntrusivePtr<T>`]. Calling this on a stack value, or from inside
    /// [`release_resources`][`RefCounted::release_resources`] (where the
    /// strong count is already zero), is undefined behavior.
    ///
    /// # Examples
    ///
    /// ```
    /// use intrc::{Counted, IntrusivePtr};
    ///
    /// let p = IntrusivePtr::new(Counted::new(7u32));
    /// let borrowed: &Counted<u32> = &p;
    /// let q = unsafe { IntrusivePtr::from_ref(borrowed) };
    /// assert!(IntrusivePtr::ptr_eq(&p, &q));
    /// assert_eq!(p.strong_count(), 2);
    /// ```
    #[inline]
    pub unsafe fn from_ref(target: &T) -> IntrusivePtr<T> {
        target.ref_counter().increment_strong();
        IntrusivePtr {
            ptr: NonNull::from(target),
            phantom: PhantomData,
        }
    }

    /// Creates a [`Weak<T>`] pointer to this target.
    ///
    /// # Examples
    ///
    /// ```
    /// use intrc::{Counted, IntrusivePtr};
    ///
    /// let five = IntrusivePtr::new(Counted::new(5));
    /// let weak_five = IntrusivePtr::downgrade(&five);
    /// assert!(weak_five.upgrade().is_some());
    /// ```
    #[inline]
    #[must_use]
    pub fn downgrade(this: &Self) -> Weak<T> {
        this.target().ref_counter().increment_weak();
        Weak::from_non_null(this.ptr)
    }

    /// Gets the number of strong pointers to the target. Be careful as
    /// another thread can change the count at any time; the value is
    /// advisory and may be stale the moment it is returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use intrc::{Counted, IntrusivePtr};
    ///
    /// let five = IntrusivePtr::new(Counted::new(5));
    /// let _also_five = IntrusivePtr::clone(&five);
    ///
    /// // This assertion is deterministic because we haven't shared
    /// // the pointer between threads.
    /// assert_eq!(2, five.strong_count());
    /// ```
    #[inline]
    #[must_use]
    pub fn strong_count(&self) -> u32 {
        count::strong_of(self.target().ref_counter().load())
    }

    /// Gets the number of weak references to the target, including the one
    /// implicit unit held on behalf of the strong side while any strong
    /// pointer exists. Advisory only, like
    /// [`strong_count`][`Self::strong_count`].
    ///
    /// # Examples
    ///
    /// ```
    /// use intrc::{Counted, IntrusivePtr};
    ///
    /// let five = IntrusivePtr::new(Counted::new(5));
    /// assert_eq!(1, five.weak_count());
    /// let w = IntrusivePtr::downgrade(&five);
    /// assert_eq!(2, five.weak_count());
    /// drop(w);
    /// ```
    #[inline]
    #[must_use]
    pub fn weak_count(&self) -> u32 {
        count::weak_of(self.target().ref_counter().load())
    }

    /// Compares if two pointers reference the same target, similar to
    /// [`ptr::eq`][`core::ptr::eq`].
    ///
    /// # Examples
    ///
    /// ```
    /// use intrc::{Counted, IntrusivePtr};
    ///
    /// let five = IntrusivePtr::new(Counted::new(5));
    /// let same_five = IntrusivePtr::clone(&five);
    /// let other_five = IntrusivePtr::new(Counted::new(5));
    ///
    /// assert!(IntrusivePtr::ptr_eq(&five, &same_five));
    /// assert!(!IntrusivePtr::ptr_eq(&five, &other_five));
    /// ```
    #[inline]
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.ptr.as_ptr() == other.ptr.as_ptr()
    }

    #[inline(always)]
    fn target(&self) -> &T {
        // SAFETY: the target is kept alive by the strong reference this
        // pointer owns; it cannot be freed before this pointer is dropped.
        unsafe { self.ptr.as_ref() }
    }

    // The non-inlined portion of `drop`: frees the target, running its Drop
    // implementation. Split out so the common decrement stays small enough
    // to inline at call sites.
    unsafe fn drop_slow(&mut self) {
        let _ = Box::from_raw(self.ptr.as_ptr());
    }
}

impl<T: RefCounted> Clone for IntrusivePtr<T> {
    /// Makes another strong pointer to the same target with one relaxed
    /// atomic increment of the strong count.
    ///
    /// The sub-counts are 32 bits wide and not checked for overflow; see the
    /// crate-level documentation.
    #[inline]
    fn clone(&self) -> Self {
        self.target().ref_counter().increment_strong();
        Self {
            ptr: self.ptr,
            phantom: PhantomData,
        }
    }
}

impl<T: RefCounted> Drop for IntrusivePtr<T> {
    #[inline]
    fn drop(&mut self) {
        let old = self.target().ref_counter().decrement_strong();
        if likely(count::strong_of(old) != 1) {
            return;
        }
        // This was the last strong pointer. The fence pairs with the Release
        // of every other decrement so the frees below observe all writes to
        // the target made by other threads before they let go.
        fence(Ordering::Acquire);
        self.target().release_resources();
        if old == count::UNIQUE {
            // No weak pointer exists and none can appear: skip the weak
            // handoff and free directly.
            unsafe { self.drop_slow() };
            return;
        }
        // Hand back the weak unit held on behalf of the strong side. The
        // target stays allocated (and its Drop deferred) until the last weak
        // pointer is gone.
        let old = self.target().ref_counter().decrement_weak();
        if count::weak_of(old) == 1 {
            fence(Ordering::Acquire);
            unsafe { self.drop_slow() };
        }
    }
}

impl<T: RefCounted> Deref for IntrusivePtr<T> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &T {
        self.target()
    }
}

impl<T: RefCounted> From<T> for IntrusivePtr<T> {
    #[inline(always)]
    fn from(target: T) -> Self {
        IntrusivePtr::new(target)
    }
}

impl<T: RefCounted + Default> Default for IntrusivePtr<T> {
    #[inline]
    fn default() -> IntrusivePtr<T> {
        IntrusivePtr::new(Default::default())
    }
}

impl<T: RefCounted + Hash> Hash for IntrusivePtr<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        (**self).hash(state);
    }
}

impl<T: RefCounted + fmt::Display> fmt::Display for IntrusivePtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

impl<T: RefCounted + fmt::Debug> fmt::Debug for IntrusivePtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: RefCounted> fmt::Pointer for IntrusivePtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&(&**self as *const T), f)
    }
}

impl<T: RefCounted + PartialEq> PartialEq for IntrusivePtr<T> {
    #[inline]
    fn eq(&self, other: &IntrusivePtr<T>) -> bool {
        self.deref().eq(other)
    }
}

impl<T: RefCounted + Eq> Eq for IntrusivePtr<T> {}

impl<T: RefCounted + PartialOrd> PartialOrd for IntrusivePtr<T> {
    #[inline]
    fn partial_cmp(&self, other: &IntrusivePtr<T>) -> Option<core::cmp::Ordering> {
        (**self).partial_cmp(&**other)
    }
}

impl<T: RefCounted + Ord> Ord for IntrusivePtr<T> {
    #[inline]
    fn cmp(&self, other: &IntrusivePtr<T>) -> core::cmp::Ordering {
        (**self).cmp(&**other)
    }
}

/// Allows an [`IntrusivePtr<T>`] to be borrowed as a shared reference to its
/// target, for generic code that works over borrowed values.
impl<T: RefCounted> core::borrow::Borrow<T> for IntrusivePtr<T> {
    #[inline(always)]
    fn borrow(&self) -> &T {
        self
    }
}

impl<T: RefCounted> AsRef<T> for IntrusivePtr<T> {
    #[inline(always)]
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T: RefCounted> Unpin for IntrusivePtr<T> {}
