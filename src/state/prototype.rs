use crate::state::{ApplyError, StateMachine};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// PrototypeStateMachine is a string to string key-value store.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrototypeStateMachine {
    store: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum PrototypeLogEntry {
    Insert { entries: BTreeMap<String, String> },
    Remove { keys: BTreeSet<String> },
}

impl PrototypeLogEntry {
    /// Builds an insert entry. If a key repeats, the last value wins.
    pub fn insert<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        PrototypeLogEntry::Insert {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn remove<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        PrototypeLogEntry::Remove {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

impl PrototypeStateMachine {
    pub fn get(&self, key: &str) -> Option<&String> {
        self.store.get(key)
    }

    /// get_many omits absent keys.
    pub fn get_many<'a, I: IntoIterator<Item = &'a str>>(&self, keys: I) -> BTreeMap<String, String> {
        keys.into_iter()
            .filter_map(|key| self.store.get(key).map(|value| (key.to_string(), value.clone())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl StateMachine for PrototypeStateMachine {
    type Entry = PrototypeLogEntry;
    type Snapshot = BTreeMap<String, String>;

    fn apply(&mut self, entry: PrototypeLogEntry) -> Result<(), ApplyError> {
        match entry {
            PrototypeLogEntry::Insert { entries } => self.store.extend(entries),
            PrototypeLogEntry::Remove { keys } => {
                for key in keys.iter() {
                    self.store.remove(key);
                }
            }
        }

        Ok(())
    }

    fn snapshot(&self) -> Self::Snapshot {
        self.store.clone()
    }

    fn install(&mut self, snapshot: Self::Snapshot) {
        self.store = snapshot;
    }
}
