//! Cache keys and selectors.

use std::borrow::Cow;
use std::fmt;

/// One component of a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    Name(Cow<'static, str>),
    Id(i64),
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Name(name) => write!(f, "{}", name),
            KeyPart::Id(id) => write!(f, "{}", id),
        }
    }
}

/// Ordered tuple naming one synchronized view, e.g. `("vitals", 3)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    pub fn new(root: &'static str) -> Self {
        Self(vec![KeyPart::Name(Cow::Borrowed(root))])
    }

    pub fn name(mut self, part: impl Into<Cow<'static, str>>) -> Self {
        self.0.push(KeyPart::Name(part.into()));
        self
    }

    pub fn id(mut self, id: i64) -> Self {
        self.0.push(KeyPart::Id(id));
        self
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

/// Which keys an invalidation touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySelector {
    Exact(QueryKey),
    /// Every instantiated key starting with this one
    Prefix(QueryKey),
}

impl KeySelector {
    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            KeySelector::Exact(exact) => exact == key,
            KeySelector::Prefix(prefix) => key.starts_with(prefix),
        }
    }
}

impl From<QueryKey> for KeySelector {
    fn from(key: QueryKey) -> Self {
        KeySelector::Exact(key)
    }
}
