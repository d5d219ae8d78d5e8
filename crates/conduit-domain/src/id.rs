//! Entity id newtypes
//!
//! Every primary row is keyed by a uuid; the newtypes keep the store
//! and pipeline from mixing up which uuid belongs to which collection.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random id
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parse from string form
            ///
            /// # Errors
            /// Returns the underlying uuid parse error for malformed input.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Unique user identifier
    UserId
);
entity_id!(
    /// Unique article identifier
    ArticleId
);
entity_id!(
    /// Unique comment identifier
    CommentId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let id1 = ArticleId::new();
        let id2 = ArticleId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn id_display_roundtrip() {
        let id = UserId::new();
        let parsed = UserId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn id_parse_rejects_garbage() {
        assert!(CommentId::parse("not-a-uuid").is_err());
    }
}
