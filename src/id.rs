//! Identifier types.
//!
//! Items, actors and statistics are all addressed by short strings.
//! Each gets its own newtype over `Arc<str>` so they cannot be mixed up
//! and clone cheaply when copied into breakdowns, plans and edge tables.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

macro_rules! interned_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
        pub struct $name(Arc<str>);

        impl $name {
            /// Create a new identifier from a string slice.
            pub fn new(s: &str) -> Self {
                Self(Arc::from(s))
            }

            /// Get the string representation of this identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(Arc::from(s))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                self.0.as_ref().serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Ok(Self::from(s))
            }
        }
    };
}

interned_id! {
    /// Identifier of an item owned by an actor.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use modstack::ItemId;
    ///
    /// let sword = ItemId::new("item-sword");
    /// let again: ItemId = "item-sword".into();
    /// assert_eq!(sword, again);
    /// assert_eq!(sword.as_str(), "item-sword");
    /// ```
    ItemId
}

interned_id! {
    /// Identifier of an actor (a character, NPC, familiar, ...).
    ActorId
}

interned_id! {
    /// Slug of a statistic such as `athletics`, `ac` or `strike-attack`.
    StatId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id_creation() {
        let a = ItemId::new("abc");
        let b: ItemId = String::from("abc").into();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "abc");
    }

    #[test]
    fn test_id_ordering() {
        let ac = StatId::new("ac");
        let athletics = StatId::new("athletics");
        assert!(ac < athletics);
    }

    #[test]
    fn test_id_serde_is_plain_string() {
        let id = ActorId::new("actor-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"actor-1\"");
        let back: ActorId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
