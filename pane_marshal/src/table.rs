use crate::*;
use fxhash::*;

/// Maps module-visible handles to host objects.
///
/// Objects live in an index-addressed arena of slots, reused through a free
/// list. Handles are drawn from a counter that only moves forward, so a
/// numeric handle is never issued twice and a handle captured before a
/// removal can never resolve to a newer object. Each slot records the
/// handle it was last filled under, which acts as its generation: a lookup
/// succeeds only if the slot still holds that handle. The number of live
/// objects is bounded by memory alone; the table is exhausted only once all
/// non-zero `u32` values have been handed out.
pub struct ReferenceTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    index: FxHashMap<Handle, u32>,
    next: u32
}

impl<T> ReferenceTable<T> {
    /// Creates a new, empty table.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            index: FxHashMap::default(),
            next: 1
        }
    }

    /// The number of live handles.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the table holds no live handles.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Stores the object and returns a fresh, non-zero handle for it.
    pub fn insert(&mut self, value: T) -> Result<Handle, BridgeError> {
        if self.next == 0 {
            return Err(BridgeError::HandleSpaceExhausted);
        }

        let handle = Handle::from_raw(self.next);
        self.next = self.next.wrapping_add(1);

        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Slot { handle, value: Some(value) };
                index
            },
            None => {
                let index = u32::try_from(self.slots.len()).map_err(|_| BridgeError::HandleSpaceExhausted)?;
                self.slots.push(Slot { handle, value: Some(value) });
                index
            }
        };

        self.index.insert(handle, index);
        Ok(handle)
    }

    /// Whether the handle currently refers to an object.
    pub fn contains(&self, handle: Handle) -> bool {
        self.index.contains_key(&handle)
    }

    /// Gets the object that the handle refers to.
    pub fn resolve(&self, handle: Handle) -> Result<&T, BridgeError> {
        self.index.get(&handle)
            .and_then(|&index| self.slots.get(index as usize))
            .filter(|slot| slot.handle == handle)
            .and_then(|slot| slot.value.as_ref())
            .ok_or(BridgeError::InvalidHandle(handle))
    }

    /// Mutably gets the object that the handle refers to.
    pub fn resolve_mut(&mut self, handle: Handle) -> Result<&mut T, BridgeError> {
        self.index.get(&handle)
            .and_then(|&index| self.slots.get_mut(index as usize))
            .filter(|slot| slot.handle == handle)
            .and_then(|slot| slot.value.as_mut())
            .ok_or(BridgeError::InvalidHandle(handle))
    }

    /// Retires the handle and returns the object it referred to. Removing
    /// a handle that is not live is an error.
    pub fn remove(&mut self, handle: Handle) -> Result<T, BridgeError> {
        let index = self.index.remove(&handle).ok_or(BridgeError::InvalidHandle(handle))?;
        let value = self.slots.get_mut(index as usize)
            .filter(|slot| slot.handle == handle)
            .and_then(|slot| slot.value.take())
            .ok_or(BridgeError::InvalidHandle(handle))?;

        self.free.push(index);
        Ok(value)
    }

    /// Iterates over all live handles and their objects, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots.iter().filter_map(|slot| slot.value.as_ref().map(|value| (slot.handle, value)))
    }
}

impl<T> Default for ReferenceTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ReferenceTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

struct Slot<T> {
    /// The handle the slot was last filled under.
    handle: Handle,
    value: Option<T>
}
