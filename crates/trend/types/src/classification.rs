//! Classification labels attached to trends, patterns and alerts.
//!
//! `TrendStrength` and `TrendImpact` are ordinal: their derived `Ord` follows
//! declaration order, which the consolidator relies on for element-wise maxima.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypesError;

macro_rules! labelled_enum {
    (
        $(#[$doc:meta])*
        $name:ident, $kind:literal, [$($variant:ident => $label:literal),+ $(,)?]
    ) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = TypesError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($label => Ok(Self::$variant),)+
                    other => Err(TypesError::UnknownLabel {
                        kind: $kind,
                        label: other.to_string(),
                    }),
                }
            }
        }
    };
}

labelled_enum!(
    /// Business domain a trend is attributed to.
    TrendType, "trend type", [
        Market => "market",
        Technology => "technology",
        Business => "business",
        Financial => "financial",
        Operational => "operational",
        Strategic => "strategic",
        Competitive => "competitive",
        Regulatory => "regulatory",
        Social => "social",
        Environmental => "environmental",
    ]
);

labelled_enum!(
    /// Shape of the movement a trend describes.
    TrendDirection, "direction", [
        Increasing => "increasing",
        Decreasing => "decreasing",
        Stable => "stable",
        Volatile => "volatile",
        Cyclical => "cyclical",
        Seasonal => "seasonal",
    ]
);

labelled_enum!(
    /// Ordinal strength of a trend.
    TrendStrength, "strength", [
        Weak => "weak",
        Moderate => "moderate",
        Strong => "strong",
        VeryStrong => "very_strong",
    ]
);

labelled_enum!(
    /// Ordinal business impact of a trend. Also used as alert severity.
    TrendImpact, "impact", [
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    ]
);

labelled_enum!(
    /// Secondary sub-pattern found inside a trend's span.
    PatternType, "pattern type", [
        Acceleration => "acceleration",
        Stabilization => "stabilization",
        Recurrence => "recurrence",
    ]
);

labelled_enum!(
    /// Rule that produced an alert.
    AlertType, "alert type", [
        CriticalImpact => "critical_impact",
        StrongTrend => "strong_trend",
    ]
);

impl TrendStrength {
    /// Strong and very strong trends warrant a `strong_trend` alert.
    pub fn is_strong(&self) -> bool {
        matches!(self, Self::Strong | Self::VeryStrong)
    }
}
