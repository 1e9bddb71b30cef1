use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::name::Name;

/// Name prefixes advertised by a router, kept sorted and unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamePrefixList {
    names: BTreeSet<Name>,
}

impl NamePrefixList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the prefix was already present.
    pub fn insert(&mut self, name: Name) -> bool {
        self.names.insert(name)
    }

    pub fn remove(&mut self, name: &Name) -> bool {
        self.names.remove(name)
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Name> {
        self.names.iter()
    }

    /// Prefixes present in `self` but not in `other`, in sorted order.
    pub fn difference<'a>(&'a self, other: &'a NamePrefixList) -> impl Iterator<Item = &'a Name> {
        self.names.difference(&other.names)
    }
}

impl FromIterator<Name> for NamePrefixList {
    fn from_iter<I: IntoIterator<Item = Name>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a NamePrefixList {
    type Item = &'a Name;
    type IntoIter = std::collections::btree_set::Iter<'a, Name>;

    fn into_iter(self) -> Self::IntoIter {
        self.names.iter()
    }
}

impl fmt::Display for NamePrefixList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.names.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(names: &[&str]) -> NamePrefixList {
        names.iter().map(|n| Name::from(*n)).collect()
    }

    #[test]
    fn test_uniqueness() {
        let mut prefixes = NamePrefixList::new();
        assert!(prefixes.insert(Name::from("/a")));
        assert!(!prefixes.insert(Name::from("/a")));
        assert_eq!(prefixes.len(), 1);
        assert!(prefixes.remove(&Name::from("/a")));
        assert!(prefixes.is_empty());
    }

    #[test]
    fn test_difference_both_ways() {
        let old = list(&["/a", "/b"]);
        let new = list(&["/a", "/c"]);
        let added: Vec<&Name> = new.difference(&old).collect();
        let removed: Vec<&Name> = old.difference(&new).collect();
        assert_eq!(added, vec![&Name::from("/c")]);
        assert_eq!(removed, vec![&Name::from("/b")]);
    }

    #[test]
    fn test_display() {
        assert_eq!(list(&["/b", "/a"]).to_string(), "[/a, /b]");
    }
}
