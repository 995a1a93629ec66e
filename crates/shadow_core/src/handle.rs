//! Generation-checked handles
//!
//! A [`Handle`] is a non-owning reference into an [`Arena`]. Freeing a slot
//! bumps its generation, so every handle issued for the old occupant stops
//! resolving instead of silently pointing at whatever reuses the slot.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// A typed, generation-checked index into an [`Arena<T>`]
#[repr(transparent)]
pub struct Handle<T> {
    /// Lower 32 bits: index, Upper 32 bits: generation
    bits: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    #[inline]
    const fn new(index: u32, generation: u32) -> Self {
        Self {
            bits: (generation as u64) << 32 | index as u64,
            _marker: PhantomData,
        }
    }

    /// Create an invalid/null handle
    #[inline]
    pub const fn null() -> Self {
        Self {
            bits: u64::MAX,
            _marker: PhantomData,
        }
    }

    /// Check if this handle is null
    #[inline]
    pub const fn is_null(&self) -> bool {
        self.bits == u64::MAX
    }

    /// Get the slot index
    #[inline]
    pub const fn index(&self) -> u32 {
        self.bits as u32
    }

    /// Get the generation the slot had when this handle was issued
    #[inline]
    pub const fn generation(&self) -> u32 {
        (self.bits >> 32) as u32
    }
}

impl<T> Clone for Handle<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Handle(null)")
        } else {
            write!(f, "Handle({}v{})", self.index(), self.generation())
        }
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::null()
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage addressed by [`Handle`]s
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    len: usize,
}

impl<T> Arena<T> {
    /// Create an empty arena
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Store a value and return the handle that reaches it
    pub fn insert(&mut self, value: T) -> Handle<T> {
        self.len += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return Handle::new(index, slot.generation);
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        Handle::new(index, 0)
    }

    /// Remove the value behind `handle`, invalidating every copy of it
    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        let slot = self.live_slot_mut(handle)?;
        let value = slot.value.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index());
        self.len -= 1;
        value
    }

    /// Resolve a handle, `None` when it is null or stale
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        if handle.is_null() {
            return None;
        }
        let slot = self.slots.get(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_ref()
    }

    /// Resolve a handle mutably
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.live_slot_mut(handle)?.value.as_mut()
    }

    /// Liveness check
    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    /// Number of live values
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over live handles and values
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value
                .as_ref()
                .map(|v| (Handle::new(i as u32, slot.generation), v))
        })
    }

    /// Remove every value, yielding them in slot order
    pub fn drain(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len);
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if let Some(value) = slot.value.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free_list.push(i as u32);
                out.push(value);
            }
        }
        self.len = 0;
        out
    }

    fn live_slot_mut(&mut self, handle: Handle<T>) -> Option<&mut Slot<T>> {
        if handle.is_null() {
            return None;
        }
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() || slot.value.is_none() {
            return None;
        }
        Some(slot)
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}
