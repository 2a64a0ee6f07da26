//! Property repository
//!
//! Maps sets of key/value pairs to small integer ids. Id 0 always stands for
//! "no properties". Ids are stable: they are the insertion order of the sets.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub type PropertiesId = usize;

/// A single property value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Str(v.to_string())
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

/// An ordered set of named values
pub type PropertySet = BTreeMap<String, PropertyValue>;

#[derive(Debug, Default, Clone)]
pub struct PropertiesRepository {
    sets: IndexSet<PropertySet>,
}

impl PropertiesRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for a property set, registering it if needed
    pub fn properties_id(&mut self, set: &PropertySet) -> PropertiesId {
        if set.is_empty() {
            return 0;
        }
        if let Some(i) = self.sets.get_index_of(set) {
            return i + 1;
        }
        let (i, _) = self.sets.insert_full(set.clone());
        i + 1
    }

    /// Lookup without registering
    pub fn find(&self, set: &PropertySet) -> Option<PropertiesId> {
        if set.is_empty() {
            return Some(0);
        }
        self.sets.get_index_of(set).map(|i| i + 1)
    }

    pub fn properties(&self, id: PropertiesId) -> Option<&PropertySet> {
        if id == 0 {
            return None;
        }
        self.sets.get_index(id - 1)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// Translates property ids of one repository into another one
#[derive(Debug, Default, Clone)]
pub struct PropertyMapper {
    map: HashMap<PropertiesId, PropertiesId>,
}

impl PropertyMapper {
    /// Register every set of `source` in `target` and remember the id mapping
    pub fn new(source: &PropertiesRepository, target: &mut PropertiesRepository) -> Self {
        let map = source
            .sets
            .iter()
            .enumerate()
            .map(|(i, set)| (i + 1, target.properties_id(set)))
            .collect();
        Self { map }
    }

    /// Mapped id; ids unknown to the source map to 0
    pub fn map(&self, id: PropertiesId) -> PropertiesId {
        if id == 0 {
            return 0;
        }
        self.map.get(&id).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(pairs: &[(&str, i64)]) -> PropertySet {
        pairs.iter().map(|(k, v)| (k.to_string(), PropertyValue::from(*v))).collect()
    }

    #[test]
    fn test_ids_are_stable() {
        let mut repo = PropertiesRepository::new();
        assert_eq!(repo.properties_id(&PropertySet::new()), 0);
        let a = repo.properties_id(&set(&[("net", 1)]));
        let b = repo.properties_id(&set(&[("net", 2)]));
        assert_eq!((a, b), (1, 2));
        assert_eq!(repo.properties_id(&set(&[("net", 1)])), 1);
        assert_eq!(repo.properties(2), Some(&set(&[("net", 2)])));
        assert_eq!(repo.properties(0), None);
    }

    #[test]
    fn test_mapper() {
        let mut src = PropertiesRepository::new();
        let mut dst = PropertiesRepository::new();
        dst.properties_id(&set(&[("other", 7)]));
        let id = src.properties_id(&set(&[("net", 3)]));

        let mapper = PropertyMapper::new(&src, &mut dst);
        let mapped = mapper.map(id);
        assert_eq!(mapped, 2);
        assert_eq!(dst.properties(mapped), src.properties(id));
        assert_eq!(mapper.map(0), 0);
    }
}
