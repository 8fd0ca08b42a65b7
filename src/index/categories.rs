//! Bijection between category names and dense ids `1..=N`.

use std::collections::HashMap;

/// Category names keyed by id.
///
/// Ids are handed out in first-seen order by [`CategoryTable::get_or_insert`];
/// [`CategoryTable::insert_with_id`] registers an id chosen elsewhere, which
/// may arrive out of order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryTable {
    by_name: HashMap<String, u32>,
    names: Vec<Option<String>>,
}

impl CategoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `name`, allocating the next one if unseen. The flag is `true`
    /// for a fresh id.
    pub fn get_or_insert(&mut self, name: &str) -> (u32, bool) {
        if let Some(&id) = self.by_name.get(name) {
            return (id, false);
        }
        let id = self.names.len() as u32 + 1;
        self.names.push(Some(name.to_string()));
        self.by_name.insert(name.to_string(), id);
        (id, true)
    }

    /// Register `name` under a fixed id. Returns `false` if either side is
    /// already bound to something else.
    pub fn insert_with_id(&mut self, id: u32, name: &str) -> bool {
        if id == 0 {
            return false;
        }
        let idx = id as usize - 1;
        match self.by_name.get(name) {
            Some(&existing) => return existing == id,
            None => {
                if self.names.get(idx).is_some_and(|slot| slot.is_some()) {
                    return false;
                }
            }
        }
        if self.names.len() <= idx {
            self.names.resize(idx + 1, None);
        }
        self.names[idx] = Some(name.to_string());
        self.by_name.insert(name.to_string(), id);
        true
    }

    /// Keep ids up to `last` out of [`Self::get_or_insert`]'s reach, for ids
    /// already used without a name.
    pub fn reserve_through(&mut self, last: u32) {
        if self.names.len() < last as usize {
            self.names.resize(last as usize, None);
        }
    }

    pub fn id(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: u32) -> Option<&str> {
        if id == 0 {
            return None;
        }
        self.names.get(id as usize - 1)?.as_deref()
    }

    /// Highest id ever registered.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// `(id, name)` in ascending id order, skipping unregistered gaps.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.names
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_deref().map(|n| (i as u32 + 1, n)))
    }
}
