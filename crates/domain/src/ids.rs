use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

macro_rules! define_id {
    ($name:ident, $label:literal) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            pub fn to_uuid(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| DomainError::invalid_id(format!("{} '{}'", $label, s)))
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

define_id!(ConversationId, "conversation id");
define_id!(NpcId, "npc id");
define_id!(UserId, "user id");
define_id!(MessageId, "message id");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hyphenated_uuid_with_surrounding_whitespace() {
        let id: NpcId = " 123e4567-e89b-12d3-a456-426614174000 ".parse().expect("should succeed");
        assert_eq!(id.to_string(), "123e4567-e89b-12d3-a456-426614174000");
    }

    #[test]
    fn rejects_non_uuid_text_with_labelled_error() {
        let err = "A".parse::<NpcId>().expect_err("should fail");
        assert!(matches!(err, DomainError::InvalidId(_)));
        assert!(err.to_string().contains("npc id 'A'"));
    }

    #[test]
    fn serializes_as_bare_uuid_string() {
        let id = UserId::from_uuid(Uuid::nil());
        let json = serde_json::to_string(&id).expect("should succeed");
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000000\"");
    }
}
