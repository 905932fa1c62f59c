use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Slot index paired with the generation it was issued under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct GenerationalIndex {
    pub index: usize,
    pub generation: u32,
}

/// Opaque handle the host hands out for bodies, manifolds and ropes.
///
/// The rope never dereferences a handle itself; it only passes it back to the
/// [`CollisionWorld`](crate::world::CollisionWorld) that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Handle(pub GenerationalIndex);

impl Handle {
    pub fn new(index: usize, generation: u32) -> Self {
        Self(GenerationalIndex { index, generation })
    }

    pub fn from_index(index: u32) -> Self {
        Self::new(index as usize, 0)
    }

    pub fn index(&self) -> usize {
        self.0.index
    }

    pub fn generation(&self) -> u32 {
        self.0.generation
    }

    pub fn is_null(&self) -> bool {
        self.0.index == usize::MAX
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::new(usize::MAX, 0)
    }
}

/// Generational slot map; stale handles resolve to `None` after removal.
pub struct Arena<T> {
    items: Vec<Option<T>>,
    generations: Vec<u32>,
    free_list: VecDeque<usize>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            generations: Vec::new(),
            free_list: VecDeque::new(),
        }
    }

    pub fn insert(&mut self, item: T) -> Handle {
        if let Some(index) = self.free_list.pop_front() {
            self.items[index] = Some(item);
            return Handle::new(index, self.generations[index]);
        }

        let index = self.items.len();
        self.items.push(Some(item));
        self.generations.push(0);
        Handle::new(index, 0)
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        if self.is_live(handle) {
            self.items.get(handle.index()).and_then(|slot| slot.as_ref())
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        if self.is_live(handle) {
            self.items
                .get_mut(handle.index())
                .and_then(|slot| slot.as_mut())
        } else {
            None
        }
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        if !self.is_live(handle) {
            return None;
        }
        let slot = self.items.get_mut(handle.index())?;
        let item = slot.take()?;
        self.generations[handle.index()] = self.generations[handle.index()].wrapping_add(1);
        self.free_list.push_back(handle.index());
        Some(item)
    }

    /// Live entries together with the handle that currently addresses them.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> + '_ {
        self.items.iter().enumerate().filter_map(|(index, slot)| {
            slot.as_ref()
                .map(|item| (Handle::new(index, self.generations[index]), item))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle, &mut T)> + '_ {
        let generations = &self.generations;
        self.items
            .iter_mut()
            .enumerate()
            .filter_map(move |(index, slot)| {
                slot.as_mut()
                    .map(|item| (Handle::new(index, generations[index]), item))
            })
    }

    pub fn len(&self) -> usize {
        self.items.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_live(&self, handle: Handle) -> bool {
        self.generations
            .get(handle.index())
            .is_some_and(|generation| *generation == handle.generation())
    }
}
