//! Order arena with a freelist and stable indices

/// Sentinel for "no index" in intrusive links
pub const INVALID_INDEX: u32 = u32::MAX;

#[derive(Debug, Clone)]
enum Slot<T> {
    Used(T),
    Free { next_free: u32 },
}

/// Freelist pool. Indices stay valid until the item is freed.
#[derive(Debug, Clone)]
pub struct Pool<T> {
    items: Vec<Slot<T>>,
    /// Freelist head (index of first free item)
    free_head: u32,
    /// Number of used items
    used_count: u32,
}

impl<T> Pool<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            free_head: INVALID_INDEX,
            used_count: 0,
        }
    }

    /// Allocate a slot for `item`, reusing freed slots first
    pub fn alloc(&mut self, item: T) -> Option<u32> {
        let idx = if self.free_head != INVALID_INDEX {
            let idx = self.free_head;
            match self.items.get(idx as usize) {
                Some(Slot::Free { next_free }) => self.free_head = *next_free,
                _ => return None,
            }
            self.items[idx as usize] = Slot::Used(item);
            idx
        } else {
            let idx = u32::try_from(self.items.len()).ok()?;
            if idx == INVALID_INDEX {
                return None;
            }
            self.items.push(Slot::Used(item));
            idx
        };
        self.used_count += 1;
        Some(idx)
    }

    /// Free an item back to the pool, returning it
    pub fn free(&mut self, idx: u32) -> Option<T> {
        let slot = self.items.get_mut(idx as usize)?;
        if matches!(slot, Slot::Free { .. }) {
            return None;
        }
        let old = std::mem::replace(
            slot,
            Slot::Free {
                next_free: self.free_head,
            },
        );
        self.free_head = idx;
        self.used_count = self.used_count.saturating_sub(1);
        match old {
            Slot::Used(item) => Some(item),
            Slot::Free { .. } => None,
        }
    }

    /// Get item by index
    pub fn get(&self, idx: u32) -> Option<&T> {
        match self.items.get(idx as usize)? {
            Slot::Used(item) => Some(item),
            Slot::Free { .. } => None,
        }
    }

    /// Get mutable item by index
    pub fn get_mut(&mut self, idx: u32) -> Option<&mut T> {
        match self.items.get_mut(idx as usize)? {
            Slot::Used(item) => Some(item),
            Slot::Free { .. } => None,
        }
    }

    /// Get usage count
    pub fn used(&self) -> u32 {
        self.used_count
    }
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}
