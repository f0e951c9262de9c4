use crate::RefCounter;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::{Deref, DerefMut};

/// The capability a type opts into to be managed by
/// [`IntrusivePtr<T>`][`crate::IntrusivePtr`] and [`Weak<T>`][`crate::Weak`].
///
/// An intrusively counted target carries its own reference counts: the
/// pointer types store nothing but the target's address, and all bookkeeping
/// happens in the [`RefCounter`] embedded in the target itself. That is what
/// saves the separate control-block allocation a non-intrusive shared
/// pointer needs, and it is why every eligible type must implement this
/// trait.
///
/// Types that do not want to embed a counter by hand can use
/// [`Counted<T>`] instead, which wraps any payload next to a counter in a
/// single allocation.
///
/// # Examples
///
/// ```
/// use intrc::{IntrusivePtr, RefCounted, RefCounter};
///
/// struct Connection {
///     peer: String,
///     counter: RefCounter,
/// }
///
/// impl RefCounted for Connection {
///     fn ref_counter(&self) -> &RefCounter {
///         &self.counter
///     }
///
///     fn release_resources(&self) {
///         // tear down whatever must not outlive the last strong pointer
///     }
/// }
///
/// let conn = IntrusivePtr::new(Connection {
///     peer: "10.0.0.7:4433".into(),
///     counter: RefCounter::new(),
/// });
/// assert_eq!(conn.peer, "10.0.0.7:4433");
/// ```
pub trait RefCounted {
    /// Access to the counter embedded in this target. Must always return the
    /// same counter for the same target.
    fn ref_counter(&self) -> &RefCounter;

    /// Hook invoked exactly once, on the thread that drops the last strong
    /// pointer, before the target may be freed.
    ///
    /// When weak pointers outlive the strong side they keep the allocation
    /// (and the target value) alive, so [`Drop`] does not run until the last
    /// weak pointer goes away. Override this to give up expensive resources
    /// at the moment the last strong pointer disappears instead of waiting
    /// for stragglers. The default does nothing, which is correct for
    /// targets whose `Drop` timing does not matter.
    ///
    /// The hook runs while the strong count is zero. Creating new strong
    /// pointers to the target from inside the hook is not supported:
    /// [`Weak::upgrade`][`crate::Weak::upgrade`] already fails at this point,
    /// and calling
    /// [`IntrusivePtr::from_ref`][`crate::IntrusivePtr::from_ref`] here
    /// violates its contract and is undefined behavior.
    fn release_resources(&self) {}
}

/// A payload bundled with a [`RefCounter`] in one allocation.
///
/// This is the composition alternative to embedding a counter in your own
/// type: `Counted<T>` implements [`RefCounted`] for any `T`, so
/// `IntrusivePtr::new(Counted::new(value))` works without `T` knowing
/// anything about reference counting. The counter still lives next to the
/// payload, so the single-allocation property of intrusive counting is kept.
///
/// # Examples
///
/// ```
/// use intrc::{Counted, IntrusivePtr};
///
/// let p = IntrusivePtr::new(Counted::new(5));
/// let q = p.clone();
/// assert_eq!(**q, 5);
/// assert_eq!(p.strong_count(), 2);
/// ```
#[repr(C)]
pub struct Counted<T> {
    data: T,
    counter: RefCounter,
}

impl<T> Counted<T> {
    /// Wraps a payload next to a fresh counter.
    #[inline]
    pub fn new(data: T) -> Counted<T> {
        Counted {
            data,
            counter: RefCounter::new(),
        }
    }
}

impl<T> RefCounted for Counted<T> {
    #[inline(always)]
    fn ref_counter(&self) -> &RefCounter {
        &self.counter
    }
}

impl<T> Deref for Counted<T> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T> DerefMut for Counted<T> {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.data
    }
}

impl<T> From<T> for Counted<T> {
    #[inline]
    fn from(data: T) -> Counted<T> {
        Counted::new(data)
    }
}

impl<T: Default> Default for Counted<T> {
    #[inline]
    fn default() -> Counted<T> {
        Counted::new(T::default())
    }
}

impl<T: Clone> Clone for Counted<T> {
    /// Clones the payload; the copy starts unowned, with zeroed counts.
    #[inline]
    fn clone(&self) -> Counted<T> {
        Counted::new(self.data.clone())
    }
}

impl<T: fmt::Debug> fmt::Debug for Counted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.data, f)
    }
}

impl<T: fmt::Display> fmt::Display for Counted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.data, f)
    }
}

impl<T: PartialEq> PartialEq for Counted<T> {
    #[inline]
    fn eq(&self, other: &Counted<T>) -> bool {
        self.data == other.data
    }
}

impl<T: Eq> Eq for Counted<T> {}

impl<T: PartialOrd> PartialOrd for Counted<T> {
    #[inline]
    fn partial_cmp(&self, other: &Counted<T>) -> Option<Ordering> {
        self.data.partial_cmp(&other.data)
    }
}

impl<T: Ord> Ord for Counted<T> {
    #[inline]
    fn cmp(&self, other: &Counted<T>) -> Ordering {
        self.data.cmp(&other.data)
    }
}

impl<T: Hash> Hash for Counted<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.data.hash(state);
    }
}
