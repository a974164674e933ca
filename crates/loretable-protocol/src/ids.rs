//! Identifier newtypes.
//!
//! Every entity that crosses the wire gets its own id type wrapping a
//! `u64`. The wrappers cost nothing at runtime but keep a `TokenId` from
//! ever being passed where a `ChannelId` is expected, and each has a
//! short `Display` prefix so log lines stay readable.
//!
//! `#[serde(transparent)]` makes each id serialize as a plain number, so
//! `SessionId(7)` is just `7` in JSON.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

id_type!(
    /// A live session (one running instance of an adventure).
    SessionId,
    "S-"
);

id_type!(
    /// A user account, as resolved by the external identity seam.
    UserId,
    "U-"
);

id_type!(
    /// A map record within a session's adventure.
    MapId,
    "M-"
);

id_type!(
    /// A backdrop image shown when no map is active.
    BackdropId,
    "B-"
);

id_type!(
    /// A character / NPC / monster record a token or player may link to.
    CharacterId,
    "C-"
);

id_type!(
    /// A token placed on a map.
    TokenId,
    "T-"
);

id_type!(
    /// A chat channel.
    ChannelId,
    "CH-"
);

id_type!(
    /// A chat message. Ids are allocated monotonically, so ordering by
    /// creation time with an id tie-break is a plain id comparison.
    MessageId,
    "MSG-"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_as_plain_numbers() {
        assert_eq!(serde_json::to_string(&SessionId(42)).unwrap(), "42");
        assert_eq!(serde_json::to_string(&TokenId(7)).unwrap(), "7");
        let id: ChannelId = serde_json::from_str("9").unwrap();
        assert_eq!(id, ChannelId(9));
    }

    #[test]
    fn test_display_prefixes() {
        assert_eq!(SessionId(1).to_string(), "S-1");
        assert_eq!(UserId(2).to_string(), "U-2");
        assert_eq!(MapId(3).to_string(), "M-3");
        assert_eq!(ChannelId(4).to_string(), "CH-4");
        assert_eq!(MessageId(5).to_string(), "MSG-5");
    }

    #[test]
    fn test_message_id_ordering_is_numeric() {
        assert!(MessageId(9) < MessageId(10));
    }
}
