//! Outcomes for operations where absence is a normal answer
//!
//! Reads, replaces and deletes on a missing item are not failures; they
//! return [`Lookup::NotFound`] and let the caller decide what absence means.

/// Result of an operation addressed to a single item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    /// The item existed
    Found(T),
    /// The service reported no item for the id and partition key
    NotFound,
}

impl<T> Lookup<T> {
    /// Whether the item was found
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    /// Whether the item was missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Lookup::NotFound)
    }

    /// Converts into an `Option`
    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }

    /// Borrows the found value
    pub fn as_ref(&self) -> Lookup<&T> {
        match self {
            Lookup::Found(value) => Lookup::Found(value),
            Lookup::NotFound => Lookup::NotFound,
        }
    }

    /// Maps the found value
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::NotFound => Lookup::NotFound,
        }
    }
}

impl<T: Default> Lookup<T> {
    /// Returns the found value or `T::default()` when missing
    pub fn unwrap_or_default(self) -> T {
        self.into_option().unwrap_or_default()
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Lookup::Found(v),
            None => Lookup::NotFound,
        }
    }
}

/// Result of [`create_item`](crate::core::repository::DocumentRepository::create_item)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A new item was written
    Created,
    /// An item with the same id and partition key already existed; it was left untouched
    AlreadyExists,
}
