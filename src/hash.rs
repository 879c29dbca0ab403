//! Content-derived identifiers.
//!
//! Filters, subfilters and conditions are identified by a seeded xxHash64 of
//! their canonical serialization, so equal content always yields equal ids.

use std::fmt;
use xxhash_rust::xxh64::Xxh64;

const CONDITION_TAG: u8 = 0x01;
const SUBFILTER_TAG: u8 = 0x02;
const FILTER_TAG: u8 = 0x03;

/// Identifier of a registered filter.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd, Debug)]
pub struct FilterId(u64);

impl FilterId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for FilterId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd, Debug)]
pub(crate) struct SubfilterId(u64);

#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd, Debug)]
pub(crate) struct ConditionId(u64);

#[cfg(test)]
impl From<u64> for ConditionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
impl From<ConditionId> for u64 {
    fn from(ConditionId(value): ConditionId) -> Self {
        value
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct ContentHasher {
    seed: u64,
}

impl ContentHasher {
    pub(crate) fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub(crate) fn condition(&self, canonical: &[u8]) -> ConditionId {
        let mut hasher = self.start(CONDITION_TAG);
        update_prefixed(&mut hasher, canonical);
        ConditionId(hasher.digest())
    }

    pub(crate) fn subfilter<'a, I>(&self, conditions: I) -> SubfilterId
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut hasher = self.start(SUBFILTER_TAG);
        for canonical in conditions {
            update_prefixed(&mut hasher, canonical);
        }
        SubfilterId(hasher.digest())
    }

    pub(crate) fn filter<I>(&self, namespace: &str, subfilters: I) -> FilterId
    where
        I: IntoIterator<Item = SubfilterId>,
    {
        let mut hasher = self.start(FILTER_TAG);
        update_prefixed(&mut hasher, namespace.as_bytes());
        for SubfilterId(id) in subfilters {
            hasher.update(&id.to_le_bytes());
        }
        FilterId(hasher.digest())
    }

    fn start(&self, tag: u8) -> Xxh64 {
        let mut hasher = Xxh64::new(self.seed);
        hasher.update(&[tag]);
        hasher
    }
}

fn update_prefixed(hasher: &mut Xxh64, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}
