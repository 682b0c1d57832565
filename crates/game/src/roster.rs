/// Slot arena keyed by stable join index. Departed entries become explicit
/// `None` tombstones; a slot index is never handed out twice while any live
/// entry remains, and the arena compacts only when the last live entry
/// leaves. Insertion order is join order.
#[derive(Debug)]
pub struct Roster<T> {
    slots: Vec<Option<T>>,
    live: usize,
}

impl<T> Default for Roster<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Roster<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            live: 0,
        }
    }

    /// Appends at the next index. Indices below the returned one are never
    /// reused while this entry (or any other) is live.
    pub fn push(&mut self, entry: T) -> u32 {
        let index = self.slots.len() as u32;
        self.slots.push(Some(entry));
        self.live += 1;
        index
    }

    /// Places an entry at a specific index, padding with tombstones as
    /// needed. Used by peers mirroring the relay's assignments.
    pub fn insert_at(&mut self, index: u32, entry: T) {
        let index = index as usize;
        while self.slots.len() <= index {
            self.slots.push(None);
        }
        if self.slots[index].is_none() {
            self.live += 1;
        }
        self.slots[index] = Some(entry);
    }

    /// Tombstones a slot. When the last live entry leaves, the whole arena
    /// clears and index 0 becomes assignable again.
    pub fn tombstone(&mut self, index: u32) -> Option<T> {
        let entry = self.slots.get_mut(index as usize)?.take()?;
        self.live -= 1;
        if self.live == 0 {
            self.slots.clear();
        }
        Some(entry)
    }

    pub fn get(&self, index: u32) -> Option<&T> {
        self.slots.get(index as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.slots.get_mut(index as usize)?.as_mut()
    }

    /// Mutable access to two distinct slots at once.
    pub fn pair_mut(&mut self, a: u32, b: u32) -> Option<(&mut T, &mut T)> {
        let (a, b) = (a as usize, b as usize);
        if a == b || a >= self.slots.len() || b >= self.slots.len() {
            return None;
        }
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let (head, tail) = self.slots.split_at_mut(hi);
        let lo_entry = head[lo].as_mut()?;
        let hi_entry = tail[0].as_mut()?;
        if a < b {
            Some((lo_entry, hi_entry))
        } else {
            Some((hi_entry, lo_entry))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|entry| (i as u32, entry)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u32, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|entry| (i as u32, entry)))
    }

    /// All slots in join order, tombstones included.
    pub fn slots(&self) -> &[Option<T>] {
        &self.slots
    }

    pub fn live(&self) -> usize {
        self.live
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}
