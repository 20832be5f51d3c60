//! Zero-copy packet arena
//!
//! Encoder and decoder draw every packet buffer from one fixed region. The
//! region is lent out as an [`ArenaLease`] that owns the memory until it is
//! dropped, so "one buffer in flight at a time" is checked on every
//! checkout instead of assumed:
//!
//! ```text
//!  0       4                                       4 + capacity
//!  +-------+---------------------------------------+
//!  | rsvd  | lease data (len <= capacity)           |
//!  +-------+---------------------------------------+
//!      ^
//!      lower-layer prefix written in place (start code, record length)
//! ```
//!
//! The arena is single-threaded; it is shared through `Rc`.

use std::cell::{Cell, RefCell};
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use crate::error::ArenaError;

/// Bytes reserved in front of every lease for an in-place prefix
pub const RESERVED_PREFIX: usize = 4;

/// Default usable capacity (2MB)
pub const DEFAULT_ARENA_CAPACITY: usize = 2 * 1024 * 1024;

/// Single-slot packet arena
#[derive(Debug)]
pub struct PacketArena {
    slot: RefCell<Option<Box<[u8]>>>,
    capacity: usize,
    checkouts: Cell<u64>,
}

impl PacketArena {
    /// Create an arena with `capacity` usable bytes plus the reserved prefix
    pub fn new(capacity: usize) -> Rc<Self> {
        let region = vec![0u8; capacity + RESERVED_PREFIX].into_boxed_slice();
        Rc::new(Self {
            slot: RefCell::new(Some(region)),
            capacity,
            checkouts: Cell::new(0),
        })
    }

    /// Usable bytes per lease
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether a lease is currently outstanding
    pub fn is_checked_out(&self) -> bool {
        self.slot.borrow().is_none()
    }

    /// Total successful checkouts
    pub fn checkouts(&self) -> u64 {
        self.checkouts.get()
    }

    /// Check out the region for a unit of up to `size_hint` bytes
    ///
    /// Fails if the hint cannot fit or if a previous lease has not been
    /// returned yet.
    pub fn checkout(self: &Rc<Self>, size_hint: usize) -> Result<ArenaLease, ArenaError> {
        if size_hint > self.capacity {
            return Err(ArenaError::Oversize {
                requested: size_hint,
                capacity: self.capacity,
            });
        }

        let buf = self.slot.borrow_mut().take().ok_or(ArenaError::Busy)?;
        self.checkouts.set(self.checkouts.get() + 1);

        Ok(ArenaLease {
            arena: Rc::clone(self),
            buf: Some(buf),
            len: 0,
        })
    }

    fn give_back(&self, buf: Box<[u8]>) {
        *self.slot.borrow_mut() = Some(buf);
    }
}

/// A checked-out arena buffer
///
/// Dropping the lease returns the region to the arena.
#[derive(Debug)]
pub struct ArenaLease {
    arena: Rc<PacketArena>,
    buf: Option<Box<[u8]>>,
    len: usize,
}

impl ArenaLease {
    fn region(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or(&[])
    }

    fn region_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or(&mut [])
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum length of this lease
    pub fn capacity(&self) -> usize {
        self.arena.capacity
    }

    /// Append bytes, failing if the arena capacity would be exceeded
    pub fn extend_from_slice(&mut self, data: &[u8]) -> Result<(), ArenaError> {
        let end = self.len + data.len();
        if end > self.arena.capacity {
            return Err(ArenaError::Oversize {
                requested: end,
                capacity: self.arena.capacity,
            });
        }
        let start = RESERVED_PREFIX + self.len;
        self.region_mut()[start..start + data.len()].copy_from_slice(data);
        self.len = end;
        Ok(())
    }

    /// Discard the contents, keeping the lease
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Write `prefix` into the reserved space in front of the data and
    /// return prefix and data as one contiguous slice
    pub fn prefixed(&mut self, prefix: &[u8]) -> Result<&[u8], ArenaError> {
        if prefix.len() > RESERVED_PREFIX {
            return Err(ArenaError::PrefixTooLong {
                requested: prefix.len(),
                reserved: RESERVED_PREFIX,
            });
        }
        let start = RESERVED_PREFIX - prefix.len();
        let end = RESERVED_PREFIX + self.len;
        let region = self.region_mut();
        region[start..RESERVED_PREFIX].copy_from_slice(prefix);
        Ok(&region[start..end])
    }
}

impl Deref for ArenaLease {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.region()[RESERVED_PREFIX..RESERVED_PREFIX + self.len]
    }
}

impl DerefMut for ArenaLease {
    fn deref_mut(&mut self) -> &mut [u8] {
        let end = RESERVED_PREFIX + self.len;
        &mut self.region_mut()[RESERVED_PREFIX..end]
    }
}

impl Drop for ArenaLease {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.arena.give_back(buf);
        }
    }
}
