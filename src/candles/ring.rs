//! Fixed-capacity circular store of resident buckets.
//!
//! Slots are preallocated once; a bucket never moves after it has been assigned a slot.
//! The write cursor always points at the oldest resident slot once the ring is full, so
//! eviction is a single step: clear the slot under the cursor, hand it out, advance.

use super::Candle;

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    /// Bucket identity; `None` means the slot is empty.
    key: Option<i64>,
    /// `None` until the first trade of the bucket has been folded in.
    candle: Option<Candle>,
}

/// How a bucket came to occupy the slot returned by [`CandleRing::find_or_allocate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlotKind {
    /// The bucket was already resident.
    Resident,
    /// An empty slot was assigned to the bucket.
    Vacant,
    /// The ring was full; the oldest bucket was evicted to make room.
    Evicted { key: i64, candle: Option<Candle> },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotHandle {
    pub index: usize,
    pub kind: SlotKind,
}

#[derive(Debug, Clone)]
pub struct CandleRing {
    slots: Box<[Slot]>,
    write_cursor: usize,
    resident: usize,
}

impl CandleRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: vec![Slot::default(); capacity].into_boxed_slice(),
            write_cursor: 0,
            resident: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of buckets currently holding a slot.
    pub fn len(&self) -> usize {
        self.resident
    }

    pub fn is_empty(&self) -> bool {
        self.resident == 0
    }

    pub fn has_vacancy(&self) -> bool {
        self.resident < self.slots.len()
    }

    /// Slot index holding `key`, if resident. Linear in capacity.
    pub fn position(&self, key: i64) -> Option<usize> {
        self.slots.iter().position(|s| s.key == Some(key))
    }

    pub fn contains(&self, key: i64) -> bool {
        self.position(key).is_some()
    }

    /// Candle for `key`, if resident and at least one trade has been folded in.
    pub fn get(&self, key: i64) -> Option<&Candle> {
        self.slots
            .iter()
            .find(|s| s.key == Some(key))
            .and_then(|s| s.candle.as_ref())
    }

    /// Key of the oldest resident bucket (the next eviction victim when full).
    pub fn oldest_resident_key(&self) -> Option<i64> {
        let cap = self.slots.len();
        (0..cap)
            .map(|off| &self.slots[(self.write_cursor + off) % cap])
            .find_map(|s| s.key)
    }

    /// Look up `key`, or assign it a slot (empty first, else evict the oldest).
    ///
    /// Allocated slots start with no candle; the caller opens it with the first trade.
    pub fn find_or_allocate(&mut self, key: i64) -> SlotHandle {
        if let Some(index) = self.position(key) {
            return SlotHandle {
                index,
                kind: SlotKind::Resident,
            };
        }

        let cap = self.slots.len();
        let vacant = (0..cap)
            .map(|off| (self.write_cursor + off) % cap)
            .find(|&i| self.slots[i].key.is_none());

        if let Some(index) = vacant {
            self.slots[index] = Slot {
                key: Some(key),
                candle: None,
            };
            self.resident += 1;
            return SlotHandle {
                index,
                kind: SlotKind::Vacant,
            };
        }

        let index = self.write_cursor;
        let old = std::mem::replace(
            &mut self.slots[index],
            Slot {
                key: Some(key),
                candle: None,
            },
        );
        self.write_cursor = (self.write_cursor + 1) % cap;
        SlotHandle {
            index,
            kind: SlotKind::Evicted {
                // Full ring: every slot carries a key.
                key: old.key.unwrap_or_default(),
                candle: old.candle,
            },
        }
    }

    /// Mutable access to the candle stored in a slot handed out by [`Self::find_or_allocate`].
    pub fn candle_mut(&mut self, index: usize) -> &mut Option<Candle> {
        &mut self.slots[index].candle
    }

    /// Resident candles in slot order starting at the oldest.
    pub fn iter(&self) -> impl Iterator<Item = &Candle> + '_ {
        let cap = self.slots.len();
        (0..cap)
            .map(move |off| &self.slots[(self.write_cursor + off) % cap])
            .filter_map(|s| s.candle.as_ref())
    }

    /// Resident candles ordered by bucket start.
    pub fn snapshot(&self) -> Vec<Candle> {
        let mut out: Vec<Candle> = self.iter().copied().collect();
        out.sort_by_key(|c| c.bucket_ms);
        out
    }
}
