use std::collections::HashMap;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DictionaryError {
    #[error("duplicate sequence name: {0}")]
    DuplicateName(String),
}

/// Insertion-ordered mapping between sequence names and dense integer ids.
///
/// Ids are assigned in first-seen order and always form a contiguous range
/// `[0, n)`: the forward map hands out ids, the reverse array recovers names
/// for persistence. The reverse array is the authority on id order, so the
/// no-gap invariant holds by construction.
#[derive(Debug, Default, Clone)]
pub struct SequenceDictionary {
    ids: HashMap<String, usize>,
    names: Vec<String>,
}

impl SequenceDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for `name`, assigning the next free id on first sight.
    pub fn get_or_create_id(&mut self, name: &str) -> usize {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len();
        self.ids.insert(name.to_string(), id);
        self.names.push(name.to_string());
        id
    }

    /// Id for `name` without mutating the dictionary.
    pub fn lookup_id(&self, name: &str) -> Option<usize> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// All names in id order. A name's position in this slice is its id.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Rebuild a dictionary from names already in id order, e.g. as read
    /// back from a persisted index. Duplicates are rejected because they
    /// would leave an unreachable id behind.
    pub fn from_names<I>(names: I) -> Result<Self, DictionaryError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut dict = SequenceDictionary::new();
        for name in names {
            if dict.ids.contains_key(&name) {
                return Err(DictionaryError::DuplicateName(name));
            }
            let id = dict.names.len();
            dict.ids.insert(name.clone(), id);
            dict.names.push(name);
        }
        Ok(dict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_first_seen_order() {
        let mut dict = SequenceDictionary::new();
        assert_eq!(dict.get_or_create_id("chr2"), 0);
        assert_eq!(dict.get_or_create_id("chr1"), 1);
        assert_eq!(dict.get_or_create_id("chr2"), 0);
        assert_eq!(dict.names(), &["chr2".to_string(), "chr1".to_string()]);
    }

    #[test]
    fn test_lookup_does_not_mutate() {
        let dict = SequenceDictionary::new();
        assert_eq!(dict.lookup_id("chr1"), None);
        assert_eq!(dict.len(), 0);
    }

    #[test]
    fn test_from_names_rejects_duplicates() {
        let names = vec!["chr1".to_string(), "chr1".to_string()];
        assert!(SequenceDictionary::from_names(names).is_err());
    }

    #[test]
    fn test_from_names_round_trip() {
        let mut dict = SequenceDictionary::new();
        dict.get_or_create_id("1");
        dict.get_or_create_id("HLA-DRB1*12:17");
        let rebuilt = SequenceDictionary::from_names(dict.names().to_vec()).unwrap();
        assert_eq!(rebuilt.lookup_id("HLA-DRB1*12:17"), Some(1));
    }
}
