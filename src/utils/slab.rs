/// Position of an occupied slot, tagged with the generation it was filled in.
///
/// A key stops resolving once its slot is vacated, even if the index is
/// later reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Key {
    pub(crate) index: usize,
    pub(crate) generation: u32,
}

struct Entry<T> {
    generation: u32,
    value: Option<T>,
}

impl<T> Entry<T> {
    fn vacant() -> Self {
        Self {
            generation: 0,
            value: None,
        }
    }
}

/// A generational slab allocator.
///
/// A `Slab` stores values in a contiguous array and hands out [`Key`]s
/// whose indices are recycled after removal. Each slot carries a
/// generation counter that is bumped on removal, so stale keys are
/// rejected instead of aliasing the slot's next occupant.
///
/// Growth is exponential, like a `Vec`: when no free slot is left the
/// backing array doubles.
pub(crate) struct Slab<T> {
    /// Slot storage; vacant slots hold `None`.
    entries: Vec<Entry<T>>,
    /// Stack of vacant indices, lowest index on top.
    free: Vec<usize>,
    /// Number of occupied slots.
    len: usize,
}

impl<T> Slab<T> {
    /// Creates a slab with `size` vacant slots.
    pub(crate) fn with_capacity(size: usize) -> Self {
        let entries = (0..size).map(|_| Entry::vacant()).collect();
        let free = (0..size).rev().collect();

        Self {
            entries,
            free,
            len: 0,
        }
    }

    /// Fills a vacant slot with the value built by `make`.
    ///
    /// `make` receives the key of the slot being filled, so the stored
    /// value can know its own key. Any extra output of `make` is handed
    /// back to the caller alongside the key.
    pub(crate) fn insert_with<R>(&mut self, make: impl FnOnce(Key) -> (T, R)) -> (Key, R) {
        let index = match self.free.pop() {
            Some(index) => index,
            None => self.grow(),
        };

        let entry = &mut self.entries[index];
        let key = Key {
            index,
            generation: entry.generation,
        };

        let (value, out) = make(key);
        entry.value = Some(value);
        self.len += 1;

        (key, out)
    }

    /// Removes and returns the value behind `key`.
    ///
    /// Returns `None` if the key is stale or the slot is vacant.
    pub(crate) fn remove(&mut self, key: Key) -> Option<T> {
        let entry = self.entries.get_mut(key.index)?;
        if entry.generation != key.generation {
            return None;
        }

        let value = entry.value.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(key.index);
        self.len -= 1;

        Some(value)
    }

    pub(crate) fn get_mut(&mut self, key: Key) -> Option<&mut T> {
        self.entries
            .get_mut(key.index)
            .filter(|entry| entry.generation == key.generation)
            .and_then(|entry| entry.value.as_mut())
    }

    pub(crate) fn contains(&self, key: Key) -> bool {
        self.entries
            .get(key.index)
            .is_some_and(|entry| entry.generation == key.generation && entry.value.is_some())
    }

    /// Snapshot of every occupied key, in index order.
    pub(crate) fn keys(&self) -> Vec<Key> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.value.is_some())
            .map(|(index, entry)| Key {
                index,
                generation: entry.generation,
            })
            .collect()
    }

    /// Removes every value, bumping generations as [`remove`](Self::remove) does.
    pub(crate) fn drain(&mut self) -> Vec<T> {
        self.keys()
            .into_iter()
            .filter_map(|key| self.remove(key))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Doubles the backing storage and returns the first new index.
    fn grow(&mut self) -> usize {
        let len = self.entries.len();
        let new_len = if len == 0 { 1 } else { 2 * len };

        self.entries.extend((len..new_len).map(|_| Entry::vacant()));
        self.free.extend(((len + 1)..new_len).rev());

        len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_freed_indices_with_a_new_generation() {
        let mut slab = Slab::with_capacity(1);

        let (first, ()) = slab.insert_with(|_| ("a", ()));
        assert_eq!(slab.remove(first), Some("a"));

        let (second, ()) = slab.insert_with(|_| ("b", ()));
        assert_eq!(second.index, first.index);
        assert_ne!(second.generation, first.generation);

        assert!(!slab.contains(first));
        assert_eq!(slab.remove(first), None);
        assert_eq!(slab.get_mut(second).copied(), Some("b"));
    }

    #[test]
    fn grows_when_full() {
        let mut slab = Slab::with_capacity(1);

        let keys: Vec<_> = (0..5).map(|n| slab.insert_with(|_| (n, ())).0).collect();

        assert_eq!(slab.len(), 5);
        assert_eq!(
            keys.iter().map(|key| key.index).collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4]
        );
        assert_eq!(slab.keys(), keys);
    }

    #[test]
    fn insert_with_sees_its_own_key() {
        let mut slab = Slab::with_capacity(0);

        let (key, seen) = slab.insert_with(|key| (key.index, key));

        assert_eq!(key, seen);
        assert_eq!(slab.get_mut(key).copied(), Some(0));
    }

    #[test]
    fn drain_empties_the_slab() {
        let mut slab = Slab::with_capacity(4);
        let (key, ()) = slab.insert_with(|_| (1, ()));
        slab.insert_with(|_| (2, ()));

        let mut drained = slab.drain();
        drained.sort_unstable();

        assert_eq!(drained, vec![1, 2]);
        assert_eq!(slab.len(), 0);
        assert!(!slab.contains(key));
    }
}
