//! Bins: the id sets stored under one `(slot, key)` pair.

use smallvec::SmallVec;

/// Neighborhood bin: insertion-ordered distinct ids, or the overflow marker.
///
/// Once a bin would grow past its cap its ids are dropped for good; the bin
/// only signals a collision from then on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bin {
    Ids(SmallVec<[u32; 8]>),
    Overflow,
}

impl Bin {
    pub fn single(id: u32) -> Self {
        let mut ids = SmallVec::new();
        ids.push(id);
        Bin::Ids(ids)
    }

    /// Add `id`. Returns `true` if this insert poisoned the bin.
    pub fn insert(&mut self, id: u32, cap: usize) -> bool {
        match self {
            Bin::Overflow => false,
            Bin::Ids(ids) => {
                if ids.contains(&id) {
                    return false;
                }
                if ids.len() < cap {
                    ids.push(id);
                    false
                } else {
                    *self = Bin::Overflow;
                    true
                }
            }
        }
    }

    pub fn ids(&self) -> &[u32] {
        match self {
            Bin::Ids(ids) => ids.as_slice(),
            Bin::Overflow => &[],
        }
    }

    pub fn is_overflow(&self) -> bool {
        matches!(self, Bin::Overflow)
    }

    pub fn len(&self) -> usize {
        self.ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids().is_empty()
    }
}

/// Histogram bin: strictly increasing category ids.
///
/// Small bins live inline; growth past the inline capacity reserves exactly
/// one more cell per new id, keeping millions of mostly tiny bins compact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortedBin {
    ids: SmallVec<[u32; 4]>,
    poisoned: bool,
}

impl SortedBin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poisoned() -> Self {
        Self {
            ids: SmallVec::new(),
            poisoned: true,
        }
    }

    /// Build from already sorted, distinct ids. Returns `None` otherwise.
    pub fn from_sorted(ids: &[u32]) -> Option<Self> {
        if ids.windows(2).any(|w| w[0] >= w[1]) {
            return None;
        }
        Some(Self {
            ids: SmallVec::from_slice(ids),
            poisoned: false,
        })
    }

    /// Insert keeping order. Duplicates are a no-op; exceeding `cap` poisons.
    /// Returns `true` if this insert poisoned the bin.
    pub fn insert(&mut self, id: u32, cap: usize) -> bool {
        if self.poisoned {
            return false;
        }
        // Scan from the tail: ids mostly arrive in increasing order.
        let mut pos = self.ids.len();
        while pos > 0 && self.ids[pos - 1] > id {
            pos -= 1;
        }
        if pos > 0 && self.ids[pos - 1] == id {
            return false;
        }
        if self.ids.len() >= cap {
            self.ids = SmallVec::new();
            self.poisoned = true;
            return true;
        }
        if self.ids.len() == self.ids.capacity() {
            self.ids.reserve_exact(1);
        }
        self.ids.insert(pos, id);
        false
    }

    pub fn contains(&self, id: u32) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bin_poisons_past_cap() {
        let mut bin = Bin::single(1);
        assert!(!bin.insert(2, 3));
        assert!(!bin.insert(3, 3));
        assert_eq!(bin.ids(), &[1, 2, 3]);
        assert!(bin.insert(4, 3));
        assert!(bin.is_overflow());
        assert!(bin.ids().is_empty());
        assert!(!bin.insert(5, 3));
        assert!(bin.is_overflow());
    }

    #[test]
    fn bin_ignores_duplicates() {
        let mut bin = Bin::single(7);
        bin.insert(7, 1);
        assert_eq!(bin.ids(), &[7]);
    }

    #[test]
    fn sorted_bin_keeps_order() {
        let mut bin = SortedBin::new();
        for id in [5, 1, 9, 3, 5, 1, 12] {
            bin.insert(id, 100);
        }
        assert_eq!(bin.ids(), &[1, 3, 5, 9, 12]);
        assert!(bin.contains(9));
        assert!(!bin.contains(4));
    }

    #[test]
    fn sorted_bin_poisons_past_cap() {
        let mut bin = SortedBin::new();
        assert!(!bin.insert(1, 2));
        assert!(!bin.insert(2, 2));
        assert!(!bin.insert(2, 2));
        assert!(bin.insert(3, 2));
        assert!(bin.is_poisoned());
        assert!(bin.is_empty());
    }

    #[test]
    fn from_sorted_validates() {
        assert!(SortedBin::from_sorted(&[1, 2, 3]).is_some());
        assert!(SortedBin::from_sorted(&[1, 1]).is_none());
        assert!(SortedBin::from_sorted(&[3, 2]).is_none());
    }
}
