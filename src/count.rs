use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

// The two counts live in one 64-bit word so a single read-modify-write
// observes and updates both consistently: strong count in the low 32 bits,
// weak count in the high 32 bits.
pub(crate) const STRONG_ONE: u64 = 1;
pub(crate) const WEAK_ONE: u64 = 1 << 32;

/// Combined value of a target owned by exactly one strong pointer and no
/// weak pointers: strong = 1 plus the implicit weak unit.
pub(crate) const UNIQUE: u64 = STRONG_ONE | WEAK_ONE;

#[inline(always)]
pub(crate) fn strong_of(combined: u64) -> u32 {
    combined as u32
}

#[inline(always)]
pub(crate) fn weak_of(combined: u64) -> u32 {
    (combined >> 32) as u32
}

/// The reference counts of an intrusively counted target, packed into a
/// single atomic 64-bit word.
///
/// Embed one of these in your type and hand it out through
/// [`RefCounted::ref_counter`][`crate::RefCounted::ref_counter`] to make the
/// type usable with [`IntrusivePtr<T>`][`crate::IntrusivePtr`]. The counter
/// of a target that is not yet owned by any pointer must read zero;
/// [`RefCounter::new`] is the only way to produce one, so this holds by
/// construction.
///
/// The low 32 bits count strong pointers. The high 32 bits count weak
/// pointers, plus one implicit unit held on behalf of the strong side as a
/// whole while at least one strong pointer exists. Neither sub-count is
/// checked for overflow; more than `u32::MAX` simultaneous references to one
/// target is outside the supported range.
///
/// # Examples
///
/// ```
/// use intrc::{RefCounted, RefCounter};
///
/// struct Node {
///     value: u32,
///     counter: RefCounter,
/// }
///
/// impl RefCounted for Node {
///     fn ref_counter(&self) -> &RefCounter {
///         &self.counter
///     }
/// }
/// ```
pub struct RefCounter {
    combined: AtomicU64,
}

impl RefCounter {
    /// Creates a counter in the unowned state (both counts zero).
    #[inline]
    pub const fn new() -> RefCounter {
        RefCounter {
            combined: AtomicU64::new(0),
        }
    }

    /// Transitions a fresh target to strong = 1, weak = 1 in a single store.
    ///
    /// Two separate increments would open a window in which a concurrent
    /// upgrade attempt observes weak > 0 with strong = 0 and wrongly
    /// concludes the target already died.
    #[inline]
    pub(crate) fn make_unique(&self) {
        debug_assert_eq!(
            self.combined.load(Ordering::Relaxed),
            0,
            "target is already owned by a pointer"
        );
        self.combined.store(UNIQUE, Ordering::Relaxed);
    }

    /// Adds one strong reference. Relaxed is enough: an increment can only
    /// happen while the caller already holds a reference, so visibility of
    /// the target is established by whatever published that reference.
    #[inline]
    pub(crate) fn increment_strong(&self) -> u64 {
        let old = self.combined.fetch_add(STRONG_ONE, Ordering::Relaxed);
        debug_assert_ne!(strong_of(old), 0, "strong increment on a dead target");
        old
    }

    /// Adds one strong reference only if the strong count is currently
    /// nonzero. This is the whole upgrade protocol: once the strong count
    /// reaches zero it can never become nonzero again, because this is the
    /// only conditional path back up.
    #[inline]
    pub(crate) fn try_increment_strong(&self) -> bool {
        let mut cur = self.combined.load(Ordering::Relaxed);
        while strong_of(cur) != 0 {
            match self.combined.compare_exchange_weak(
                cur,
                cur + STRONG_ONE,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => cur = actual,
            }
        }
        false
    }

    /// Adds one weak reference.
    #[inline]
    pub(crate) fn increment_weak(&self) -> u64 {
        let old = self.combined.fetch_add(WEAK_ONE, Ordering::Relaxed);
        debug_assert_ne!(weak_of(old), 0, "weak increment on a freed target");
        old
    }

    /// Removes one strong reference and returns the previous combined value.
    ///
    /// Release ordering keeps every prior access to the target from being
    /// reordered past the point where another thread may free it. The caller
    /// that observes the 1 -> 0 transition must issue an Acquire fence before
    /// touching the target, pairing with the Release of every other
    /// decrement.
    #[inline]
    pub(crate) fn decrement_strong(&self) -> u64 {
        let old = self.combined.fetch_sub(STRONG_ONE, Ordering::Release);
        debug_assert_ne!(strong_of(old), 0, "strong count underflow");
        old
    }

    /// Removes one weak reference and returns the previous combined value.
    /// Same ordering contract as [`decrement_strong`][`Self::decrement_strong`].
    #[inline]
    pub(crate) fn decrement_weak(&self) -> u64 {
        let old = self.combined.fetch_sub(WEAK_ONE, Ordering::Release);
        debug_assert_ne!(weak_of(old), 0, "weak count underflow");
        old
    }

    /// Relaxed snapshot of the combined word. Diagnostic only: the value may
    /// be stale the instant it is returned, so it never gates a destructive
    /// decision on its own.
    #[inline]
    pub(crate) fn load(&self) -> u64 {
        self.combined.load(Ordering::Relaxed)
    }
}

impl Default for RefCounter {
    #[inline]
    fn default() -> RefCounter {
        RefCounter::new()
    }
}

/// Cloning a counted target produces an unowned value, so the copy starts
/// with a fresh zero counter rather than inheriting the original's counts.
impl Clone for RefCounter {
    #[inline]
    fn clone(&self) -> RefCounter {
        RefCounter::new()
    }
}

impl fmt::Debug for RefCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let combined = self.load();
        f.debug_struct("RefCounter")
            .field("strong", &strong_of(combined))
            .field("weak", &weak_of(combined))
            .finish()
    }
}
