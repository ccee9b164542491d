//! Identity tokens for rows and columns.
//!
//! `ColumnId` and `RowId` decouple logical identity from display name and
//! position. They are allocated from the UUID v7 space, so concurrent
//! replicas never collide, and they are never regenerated for an existing
//! entity, so a deleted id can never be resurrected by a later insert.

use std::fmt;
use std::sync::Arc;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_token {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Arc<str>);

        impl $name {
            /// Allocate a fresh, globally unique id.
            pub fn generate() -> Self {
                Self(Uuid::now_v7().simple().to_string().into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.into())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s.into())
            }
        }

        // On the wire an id is a bare string.
        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                String::deserialize(deserializer).map(Self::from)
            }
        }
    };
}

id_token! {
    /// Opaque identity of a column, stable across renames and reorders.
    ColumnId
}

id_token! {
    /// Opaque identity of a row, stable across inserts, deletes and moves
    /// of other rows.
    RowId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = ColumnId::generate();
        let b = ColumnId::generate();
        assert_ne!(a, b);
        assert!(!a.as_str().is_empty());
    }

    #[test]
    fn test_id_roundtrip_through_string() {
        let id = RowId::generate();
        let restored = RowId::from(id.as_str());
        assert_eq!(id, restored);
    }

    #[test]
    fn test_id_serde_is_transparent() {
        let id = ColumnId::from("col-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"col-1\"");
        let back: ColumnId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
