//! The working set of a run.
//!
//! Grouping depends on seeing entries in processing order (most recent
//! period first, then ascending core): that is what makes the first entries
//! inserted into each group its most recent ones. [`Candidates`] carries that
//! precondition in its type, so only [`Candidates<Ordered>`] can be grouped.

use crate::entry::Entry;
use std::cmp::Ordering;
use std::marker::PhantomData;

/// Entries in discovery order.
#[derive(Debug, Clone, Copy)]
pub struct Unordered;
/// Entries in processing order.
#[derive(Debug, Clone, Copy)]
pub struct Ordered;

#[derive(Debug, Clone)]
pub struct Candidates<S> {
    entries: Vec<Entry>,
    _state: PhantomData<S>,
}

/// Processing order: descending period, ties broken by ascending core.
pub(crate) fn processing_order(a: &Entry, b: &Entry) -> Ordering {
    b.name.period.cmp(&a.name.period).then_with(|| a.core.cmp(&b.core))
}

impl Default for Candidates<Unordered> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
impl Candidates<Unordered> {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries, _state: PhantomData }
    }

    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    pub fn into_ordered(mut self) -> Candidates<Ordered> {
        self.entries.sort_by(processing_order);
        Candidates { entries: self.entries, _state: PhantomData }
    }
}
impl FromIterator<Entry> for Candidates<Unordered> {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
impl<S> Candidates<S> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    /// Keeps only the entries matching `keep`. Relative order is preserved,
    /// so ordered candidates stay ordered.
    pub fn retain(&mut self, keep: impl FnMut(&Entry) -> bool) {
        self.entries.retain(keep);
    }

    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }
}
