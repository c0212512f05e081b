use std::fmt;

/// Opaque ticket identifying one live node of an adapter.
///
/// A handle is minted when its node is first materialized and stops
/// resolving the moment the node is freed. Slots are reused, but every
/// reuse bumps the slot's generation, so a stale ticket keeps failing
/// softly instead of aliasing whatever occupies the slot later.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    index: u32,
    generation: u32,
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeHandle({}.{})", self.index, self.generation)
    }
}

/// Generation-checked slot map backing the node arena.
pub(crate) struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

struct Slot<T> {
    generation: u32,
    entry: Option<T>,
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self { slots: Vec::new(), free: Vec::new(), live: 0 }
    }

    pub fn mint(&mut self, entry: T) -> NodeHandle {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            return NodeHandle { index, generation: slot.generation };
        }
        let index = u32::try_from(self.slots.len()).expect("node arena exceeds u32 slots");
        self.slots.push(Slot { generation: 0, entry: Some(entry) });
        NodeHandle { index, generation: 0 }
    }

    pub fn get(&self, handle: NodeHandle) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    pub fn release(&mut self, handle: NodeHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        Some(entry)
    }

    pub fn len(&self) -> usize {
        self.live
    }
}
