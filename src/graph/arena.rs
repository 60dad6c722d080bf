use serde::{Deserialize, Serialize};

/// Slot address inside an [`Arena`].
///
/// The generation is bumped every time a slot is freed, so an id taken from a
/// since-deleted entry never resolves to whatever reuses the slot later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArenaId {
    index: u32,
    generation: u32,
}

impl ArenaId {
    pub const NULL: ArenaId = ArenaId {
        index: u32::MAX,
        generation: 0,
    };

    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }

    pub fn is_null(self) -> bool {
        self.index == u32::MAX
    }
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Generational slot arena with a free list, in the spirit of a small GC heap:
/// entries never move, freed slots are recycled, stale ids fail to resolve.
#[derive(Debug, Clone)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    live: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live: 0,
        }
    }

    /// Inserts a value built from its own id.
    pub fn insert_with(&mut self, make: impl FnOnce(ArenaId) -> T) -> ArenaId {
        self.live += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            let id = ArenaId {
                index,
                generation: slot.generation,
            };
            slot.value = Some(make(id));
            return id;
        }

        let index = self.slots.len() as u32;
        let id = ArenaId {
            index,
            generation: 0,
        };
        self.slots.push(Slot {
            generation: 0,
            value: Some(make(id)),
        });
        id
    }

    pub fn remove(&mut self, id: ArenaId) -> Option<T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(id.index);
        self.live -= 1;
        Some(value)
    }

    pub fn get(&self, id: ArenaId) -> Option<&T> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.value.as_ref()
    }

    pub fn get_mut(&mut self, id: ArenaId) -> Option<&mut T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.value.as_mut()
    }

    pub fn contains(&self, id: ArenaId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (ArenaId, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|value| {
                (
                    ArenaId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    value,
                )
            })
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ArenaId, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.value.as_mut().map(|value| {
                (
                    ArenaId {
                        index: index as u32,
                        generation,
                    },
                    value,
                )
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut arena = Arena::new();
        let a = arena.insert_with(|_| "a");
        let b = arena.insert_with(|_| "b");
        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn insert_with_sees_own_id() {
        let mut arena = Arena::new();
        let id = arena.insert_with(|id| id);
        assert_eq!(arena.get(id), Some(&id));
    }

    #[test]
    fn stale_id_does_not_resolve_after_reuse() {
        let mut arena = Arena::new();
        let old = arena.insert_with(|_| 1);
        assert_eq!(arena.remove(old), Some(1));
        let new = arena.insert_with(|_| 2);

        assert_eq!(old.index(), new.index());
        assert_ne!(old.generation(), new.generation());
        assert_eq!(arena.get(old), None);
        assert_eq!(arena.get(new), Some(&2));
        assert_eq!(arena.remove(old), None);
    }

    #[test]
    fn null_never_resolves() {
        let mut arena = Arena::new();
        arena.insert_with(|_| 0);
        assert!(ArenaId::NULL.is_null());
        assert!(!arena.contains(ArenaId::NULL));
    }

    #[test]
    fn iter_skips_free_slots() {
        let mut arena = Arena::new();
        let a = arena.insert_with(|_| 'a');
        arena.insert_with(|_| 'b');
        arena.remove(a);
        let values: Vec<char> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec!['b']);
        assert!(!arena.is_empty());
    }
}
