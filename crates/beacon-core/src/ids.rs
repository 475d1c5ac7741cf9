//! Branded ID newtypes.
//!
//! [`AccountId`] identifies the authenticated account whose notifications are
//! streamed. It is assigned by the server, so it has no generator. The
//! empty string and `"0"` both mean "not authenticated".
//!
//! [`ContextId`] identifies one observing context (a tab, a window, a worker)
//! inside a hub. It is a UUID v7 generated locally.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Server-assigned account identifier scoping a notification stream.
    AccountId
}

branded_id! {
    /// Locally generated identifier for one observing context.
    ContextId
}

impl AccountId {
    /// Whether this id refers to an authenticated account.
    ///
    /// Empty ids and the numeric sentinel `0` are treated as anonymous.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        let trimmed = self.0.trim();
        !trimmed.is_empty() && trimmed != "0"
    }

    /// Name of the account-scoped relay channel (`notifications-{id}`).
    #[must_use]
    pub fn channel_name(&self) -> String {
        format!("notifications-{}", self.0)
    }
}

impl From<u64> for AccountId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl ContextId {
    /// Create a new random ID (UUID v7, time-ordered).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_id_new_is_uuid_v7() {
        let id = ContextId::new();
        let parsed = Uuid::parse_str(id.as_str()).expect("should be valid UUID");
        assert_eq!(parsed.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn context_ids_are_unique() {
        assert_ne!(ContextId::new(), ContextId::new());
    }

    #[test]
    fn account_id_from_number() {
        let id = AccountId::from(42u64);
        assert_eq!(id.as_str(), "42");
        assert!(id.is_authenticated());
    }

    #[test]
    fn anonymous_account_ids() {
        assert!(!AccountId::from("").is_authenticated());
        assert!(!AccountId::from("  ").is_authenticated());
        assert!(!AccountId::from(0u64).is_authenticated());
    }

    #[test]
    fn channel_name_is_account_scoped() {
        assert_eq!(AccountId::from(7u64).channel_name(), "notifications-7");
    }

    #[test]
    fn serde_is_transparent() {
        let id = AccountId::from("acct-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"acct-1\"");
        let back: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
