//! Identifier types with validation
//!
//! Newtype wrappers for the identifiers the repository passes to Cosmos DB.
//! Each one rejects empty or whitespace-only input so a blank id never
//! reaches the service.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a new `", stringify!($name), "`")]
            ///
            /// # Errors
            ///
            /// Returns an error message if the value is empty or whitespace.
            pub fn new(value: impl Into<String>) -> Result<Self, String> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(concat!($label, " cannot be empty").to_string());
                }
                Ok(Self(value))
            }

            /// Returns the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes self and returns the inner String
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = String;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Cosmos DB database identifier
    ///
    /// # Examples
    ///
    /// ```
    /// use cosmos_repository::domain::ids::DatabaseId;
    ///
    /// let id = DatabaseId::new("inventory").unwrap();
    /// assert_eq!(id.as_str(), "inventory");
    /// assert!(DatabaseId::new("  ").is_err());
    /// ```
    DatabaseId,
    "Database ID"
);

string_id!(
    /// Cosmos DB container identifier
    ContainerId,
    "Container ID"
);

string_id!(
    /// Item (document) identifier, the `id` property of a stored document
    ItemId,
    "Item ID"
);

string_id!(
    /// Value of an item's partition key property
    ///
    /// Only string partition keys are supported; this matches the `/pk`
    /// default path where callers store a string.
    PartitionKeyValue,
    "Partition key"
);
