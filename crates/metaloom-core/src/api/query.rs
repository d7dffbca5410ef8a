///
/// QueryParams
///
/// Ordered list of query parameters. Most keys are single-valued and are
/// replaced on re-set; `filter` is repeatable and appends. Order is
/// preserved so issued requests are reproducible in tests and logs.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Single `fields` selection parameter.
    #[must_use]
    pub fn with_fields(fields: impl Into<String>) -> Self {
        let mut params = Self::new();
        params.set("fields", fields);
        params
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Set a single-valued parameter, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();

        if let Some(entry) = self.0.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value.into();
        } else {
            self.0.push((key, value.into()));
        }
    }

    /// Append a parameter without replacing earlier occurrences.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// Append one `filter` expression.
    pub fn add_filter(&mut self, expression: impl Into<String>) {
        self.append("filter", expression);
    }

    /// First value for `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Remove every occurrence of `key`, returning the first removed value.
    pub fn take(&mut self, key: &str) -> Option<String> {
        let first = self
            .0
            .iter()
            .position(|(k, _)| k == key)
            .map(|index| self.0.remove(index).1);
        self.0.retain(|(k, _)| k != key);

        first
    }

    /// All values recorded for `key`, in order.
    pub fn all(&self, key: &str) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
