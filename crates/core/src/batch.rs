//! Batches of records.

use serde::{Deserialize, Serialize};

use crate::record::Record;

/// An ordered group of records read, processed or written together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Batch<P> {
    records: Vec<Record<P>>,
}

impl<P> Batch<P> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, record: Record<P>) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Record<P>> {
        self.records.iter()
    }

    pub fn records(&self) -> &[Record<P>] {
        &self.records
    }

    /// Borrow the payloads in batch order.
    pub fn payloads(&self) -> impl Iterator<Item = &P> {
        self.records.iter().map(Record::payload)
    }

    /// Header numbers in batch order (handy for logs and assertions).
    pub fn numbers(&self) -> Vec<u64> {
        self.records.iter().map(|r| r.header().number()).collect()
    }
}

impl<P> Default for Batch<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> From<Vec<Record<P>>> for Batch<P> {
    fn from(records: Vec<Record<P>>) -> Self {
        Self { records }
    }
}

impl<P> From<Record<P>> for Batch<P> {
    fn from(record: Record<P>) -> Self {
        Self {
            records: vec![record],
        }
    }
}

impl<P> FromIterator<Record<P>> for Batch<P> {
    fn from_iter<T: IntoIterator<Item = Record<P>>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl<P> IntoIterator for Batch<P> {
    type Item = Record<P>;
    type IntoIter = std::vec::IntoIter<Record<P>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a, P> IntoIterator for &'a Batch<P> {
    type Item = &'a Record<P>;
    type IntoIter = core::slice::Iter<'a, Record<P>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
