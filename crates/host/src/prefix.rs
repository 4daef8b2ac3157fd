//! Exact-or-longest prefix lookup over mount paths.
//!
//! Mount paths are plain string prefixes: `/api` matches `/api`, `/api/v1`
//! and also `/apis`. Lookup probes the distinct prefix lengths from the
//! longest down, so its cost is bounded by the number of distinct lengths
//! rather than the number of mounts.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct PrefixIndex {
    prefixes: HashMap<String, usize>,
    // distinct prefix lengths, longest first
    lengths: Vec<usize>,
}

impl PrefixIndex {
    /// Builds the index; returns the first duplicated prefix as the error.
    pub fn new<I, S>(prefixes: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut index = Self::default();
        for (position, prefix) in prefixes.into_iter().enumerate() {
            let prefix = prefix.into();
            if index.prefixes.contains_key(&prefix) {
                return Err(prefix);
            }
            index.lengths.push(prefix.len());
            index.prefixes.insert(prefix, position);
        }

        index.lengths.sort_unstable_by(|a, b| b.cmp(a));
        index.lengths.dedup();
        Ok(index)
    }

    /// Position of the most specific prefix of `path`, if any.
    pub fn lookup(&self, path: &str) -> Option<usize> {
        self.lengths
            .iter()
            .filter(|&&len| len <= path.len())
            .filter_map(|&len| path.get(..len))
            .find_map(|candidate| self.prefixes.get(candidate).copied())
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}
