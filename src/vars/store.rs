use tracing::debug;

use super::VarMap;

/// Live variable table for the active environment.
///
/// Seeded wholesale from an environment and written to by captures between
/// requests. Nothing invalidates single entries; switching environments
/// goes through [`VariableStore::reset`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableStore {
    values: VarMap,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Stores `value`, returning the previous value if there was one.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let name = name.into();
        let value = value.into();
        debug!(variable = %name, "setting variable");
        self.values.insert(name, value)
    }

    pub fn reset(&mut self, initial: VarMap) {
        debug!(count = initial.len(), "rebuilding variable store");
        self.values = initial;
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<VarMap> for VariableStore {
    fn from(values: VarMap) -> Self {
        Self { values }
    }
}

impl<K, V> FromIterator<(K, V)> for VariableStore
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
