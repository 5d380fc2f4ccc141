//! Identifier newtypes. Every identifier is a random UUID v4 rendered as text.

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Generate a new unique identifier.
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
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

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

define_id!(
    /// Unique identifier of a detected trend.
    TrendId
);
define_id!(
    /// Unique identifier of a trend pattern.
    PatternId
);
define_id!(
    /// Unique identifier of a trend forecast.
    ForecastId
);
define_id!(
    /// Unique identifier of a trend alert.
    AlertId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(TrendId::new(), TrendId::new());
        assert_ne!(AlertId::new(), AlertId::new());
    }

    #[test]
    fn id_from_str_roundtrips_through_display() {
        let id = TrendId::from("abc-123");
        assert_eq!(id.to_string(), "abc-123");
        assert_eq!(id.as_str(), "abc-123");
    }

    #[test]
    fn id_serializes_as_plain_string() {
        let id = ForecastId::from("f-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"f-1\"");
    }
}
