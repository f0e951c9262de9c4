#![no_std]
//! # intrc: intrusive reference counting
//!
//! intrc is a reference-counting smart-pointer library where the counts live
//! inside the pointed-to object instead of a separately allocated control
//! block. A type opts in by embedding a [`RefCounter`] and implementing the
//! [`RefCounted`] trait (or by being wrapped in [`Counted<T>`]); in exchange,
//! [`IntrusivePtr<T>`] gets shared ownership with one allocation, one-word
//! pointers, and no second indirection, plus [`Weak<T>`] references that can
//! try to upgrade for as long as the target is strongly referenced.
//!
//! ## Why use intrc?
//!
//! - One allocation per target: the counts are fields of the target itself
//! - Strong and weak pointers are each a single machine word
//! - Strong and weak counts are packed into one 64-bit atomic, so every
//!   count update is a single lock-free read-modify-write
//! - A borrowed `&T` can be turned back into an owning pointer
//!   ([`IntrusivePtr::from_ref`]), which non-intrusive designs cannot do
//! - Deterministic teardown: the
//!   [`release_resources`][`RefCounted::release_resources`] hook runs on the
//!   exact drop of the last strong pointer, even when weak pointers keep the
//!   storage pinned
//! - It supports `no_std` with extern alloc
//!
//! ## Why not use intrc?
//!
//! - Target types must opt in through [`RefCounted`]; arbitrary types need
//!   the [`Counted<T>`] wrapper
//! - It does not support DSTs as targets
//! - The sub-counts are 32 bits and unchecked: more than `u32::MAX`
//!   simultaneous strong (or weak) references to a single target is outside
//!   the supported range and will misbehave. Four billion pointers to one
//!   object take around 32GB just to store, so this is a documented
//!   limitation rather than a practical hazard
//! - Reference cycles are never reclaimed. Intrusive counting has no cycle
//!   detector; break cycles with [`Weak<T>`]
//! - It needs 64-bit atomics (`AtomicU64`) on the platform
//!
//! ## Comparison
//!
//! |                          | intrc::IntrusivePtr | std::sync::Arc |
//! | ------------------------ | :-----------------: | :------------: |
//! | Allocations per object   |          1          |       1        |
//! | Count storage            |  inside the target  | control block  |
//! | Count updates per clone  |      1 atomic       |    1 atomic    |
//! | Weak references          |         ✅          |       ✅       |
//! | Pointer from plain `&T`  |         ✅          |       ❌       |
//! | Works with any `T`       | via [`Counted<T>`]  |       ✅       |
//! | DST support              |         ❌          |       ✅       |
//!
//! ## Counting protocol
//!
//! The combined counter packs the strong count into the low 32 bits and the
//! weak count into the high 32 bits of one `AtomicU64`. The weak count also
//! carries one implicit unit on behalf of "at least one strong pointer
//! exists", so a live strong reference always implies a nonzero weak count
//! and the storage can never be freed under a thread that is still running
//! the release hook. The first strong pointer writes strong = 1, weak = 1 in
//! a single store; clones cost one relaxed increment; the drop that takes
//! the strong count to zero runs the release hook, then hands back the
//! implicit weak unit, and whoever takes the weak count to zero frees the
//! target. A drop that observes it held the only reference of any kind skips
//! the weak handoff and frees directly.
//!
//! Only the counts are synchronized. The target's own data is shared as
//! plain `&T`, and making that safe under concurrent mutation is the
//! caller's business, same as with `std::sync::Arc`.

#![warn(missing_docs, missing_debug_implementations)]
extern crate alloc;

mod count;
mod ptr;
mod target;
mod weak;

pub use count::RefCounter;
pub use ptr::IntrusivePtr;
pub use target::{Counted, RefCounted};
pub use weak::Weak;
