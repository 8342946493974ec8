//! Scratch storage for completion reads.
//!
//! This module is the ONLY place where unsafe memory manipulation is
//! allowed. All invariants are enforced here so the rest of the system
//! can remain 100% safe.
//!
//! Completion reads need owned storage: the kernel writes into the
//! buffer while the operation is in flight, so the region must stay
//! alive and unaliased until the completion resolves. Each session
//! reserves one slot of scratch storage for exactly this. While a
//! previous read's bytes are still being consumed the next read falls
//! back to a one-off heap buffer, so in the steady state of one
//! in-flight read per session the read path allocates nothing.

#![allow(unsafe_code)]

use std::cell::UnsafeCell;
use std::sync::Arc;

use bytes::Bytes;
use compio::buf::{IoBuf, IoBufMut, SetBufInit};

/// Size of one scratch read, matching the session read chunk.
pub const SCRATCH_SIZE: usize = 1024;

/// The reserved storage of one session.
///
/// Exclusivity is tracked through the `Arc` count: the arena hands the
/// slot out only while it holds the sole reference, and the slot stays
/// borrowed until the last `Bytes` frozen from it is dropped.
struct Slot {
    bytes: UnsafeCell<[u8; SCRATCH_SIZE]>,
}

// SAFETY: access to `bytes` is serialised by the handout protocol above;
// two live references to the cell contents never coexist.
unsafe impl Send for Slot {}
unsafe impl Sync for Slot {}

impl Slot {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bytes: UnsafeCell::new([0u8; SCRATCH_SIZE]),
        })
    }
}

/// Keeps the slot borrowed for as long as the frozen `Bytes` lives.
struct SlotOwner {
    slot: Arc<Slot>,
}

impl AsRef<[u8]> for SlotOwner {
    fn as_ref(&self) -> &[u8] {
        // SAFETY: no `ScratchMut` for this slot exists while an owner is
        // alive, so the contents are frozen.
        unsafe { &*self.slot.bytes.get() }
    }
}

enum Backing {
    Reserved(Arc<Slot>),
    Heap(Vec<u8>),
}

/// Mutable scratch handed to the kernel for a single read.
///
/// Implements `IoBufMut` so compio can write into it, then freezes into
/// immutable [`Bytes`] once the completion resolves. Never exposed to
/// user code.
pub struct ScratchMut {
    backing: Backing,
    len: usize,
}

// SAFETY: both backings are stable for the scratch's lifetime - the slot
// sits behind its `Arc` and the heap vector is never resized - and the
// whole `SCRATCH_SIZE` region is initialised storage owned exclusively
// by this value.
unsafe impl IoBuf for ScratchMut {
    #[inline]
    fn as_buf_ptr(&self) -> *const u8 {
        match &self.backing {
            Backing::Reserved(slot) => slot.bytes.get().cast_const().cast(),
            Backing::Heap(buf) => buf.as_ptr(),
        }
    }

    #[inline]
    fn buf_len(&self) -> usize {
        self.len
    }

    #[inline]
    fn buf_capacity(&self) -> usize {
        SCRATCH_SIZE
    }
}

// SAFETY: see the IoBuf impl; mutable access is exclusive by the handout
// protocol.
unsafe impl IoBufMut for ScratchMut {
    #[inline]
    fn as_buf_mut_ptr(&mut self) -> *mut u8 {
        match &mut self.backing {
            Backing::Reserved(slot) => slot.bytes.get().cast(),
            Backing::Heap(buf) => buf.as_mut_ptr(),
        }
    }
}

impl SetBufInit for ScratchMut {
    #[inline]
    unsafe fn set_buf_init(&mut self, len: usize) {
        debug_assert!(len <= SCRATCH_SIZE);
        self.len = len;
    }
}

impl ScratchMut {
    /// Freeze the initialised prefix into immutable `Bytes`.
    ///
    /// A reserved scratch keeps borrowing its slot through the returned
    /// `Bytes`; a heap scratch gives its vector away outright. Either
    /// way no mutable access remains after this call.
    #[must_use]
    pub fn freeze(self) -> Bytes {
        let len = self.len;
        match self.backing {
            Backing::Reserved(slot) => Bytes::from_owner(SlotOwner { slot }).slice(..len),
            Backing::Heap(mut buf) => {
                buf.truncate(len);
                Bytes::from(buf)
            }
        }
    }
}

/// Per-session scratch allocator.
///
/// Not thread-safe by design: one arena lives inside one read pump.
pub struct ReadArena {
    slot: Arc<Slot>,
}

impl Default for ReadArena {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadArena {
    #[must_use]
    pub fn new() -> Self {
        Self { slot: Slot::new() }
    }

    /// Hand out storage for one socket read.
    ///
    /// Prefers the reserved slot. If a previous read's bytes still
    /// borrow it, this read gets a one-off heap buffer instead; the slot
    /// is picked up again once those bytes drop.
    pub fn scratch(&mut self) -> ScratchMut {
        let backing = if Arc::strong_count(&self.slot) == 1 {
            Backing::Reserved(self.slot.clone())
        } else {
            Backing::Heap(vec![0u8; SCRATCH_SIZE])
        };
        ScratchMut { backing, len: 0 }
    }
}
