//! Shared domain types
//!
//! MetricType enumerates the measurable performance dimensions; Tier and
//! TypeBand are the qualitative bands derived from normalized percent scores.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Performance dimension a metric observation measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricType {
    Attendance,
    Velocity,
    Quality,
    Productivity,
    Efficiency,
}

impl MetricType {
    /// All metric types in declared order (used for deterministic iteration)
    pub const ALL: [MetricType; 5] = [
        MetricType::Attendance,
        MetricType::Velocity,
        MetricType::Quality,
        MetricType::Productivity,
        MetricType::Efficiency,
    ];

    /// Storage representation (matches the `metric_type` column)
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Attendance => "ATTENDANCE",
            MetricType::Velocity => "VELOCITY",
            MetricType::Quality => "QUALITY",
            MetricType::Productivity => "PRODUCTIVITY",
            MetricType::Efficiency => "EFFICIENCY",
        }
    }

    /// Human-readable label for narratives
    pub fn label(&self) -> &'static str {
        match self {
            MetricType::Attendance => "Attendance",
            MetricType::Velocity => "Velocity",
            MetricType::Quality => "Quality",
            MetricType::Productivity => "Productivity",
            MetricType::Efficiency => "Efficiency",
        }
    }

    /// Parse the storage representation
    pub fn parse(s: &str) -> Option<MetricType> {
        match s {
            "ATTENDANCE" => Some(MetricType::Attendance),
            "VELOCITY" => Some(MetricType::Velocity),
            "QUALITY" => Some(MetricType::Quality),
            "PRODUCTIVITY" => Some(MetricType::Productivity),
            "EFFICIENCY" => Some(MetricType::Efficiency),
            _ => None,
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall qualitative tier for a subject's aggregate score
///
/// Boundaries are closed-below: exactly 85.0 is Exceptional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Exceptional,
    Solid,
    Moderate,
    NeedsAttention,
}

impl Tier {
    /// Classify an overall percent score
    pub fn from_percent(percent: f64) -> Tier {
        if percent >= 85.0 {
            Tier::Exceptional
        } else if percent >= 70.0 {
            Tier::Solid
        } else if percent >= 55.0 {
            Tier::Moderate
        } else {
            Tier::NeedsAttention
        }
    }

    /// Narrative phrase for the overall assessment line
    pub fn phrase(&self) -> &'static str {
        match self {
            Tier::Exceptional => {
                "Exceptional performance. The subject exceeds expectations across the board."
            }
            Tier::Solid => {
                "Solid performance. The subject meets expectations with some clear strengths."
            }
            Tier::Moderate => {
                "Average performance. Improvements are needed in some areas."
            }
            Tier::NeedsAttention => {
                "Performance requires immediate attention. An improvement plan is recommended."
            }
        }
    }
}

/// Per-metric-type qualitative band
///
/// Separate scale from [`Tier`]: exactly 90.0 is Excellent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeBand {
    Excellent,
    Good,
    Acceptable,
    BelowExpectations,
}

impl TypeBand {
    /// Classify a per-type average percent score
    pub fn from_percent(percent: f64) -> TypeBand {
        if percent >= 90.0 {
            TypeBand::Excellent
        } else if percent >= 75.0 {
            TypeBand::Good
        } else if percent >= 60.0 {
            TypeBand::Acceptable
        } else {
            TypeBand::BelowExpectations
        }
    }

    /// Narrative phrase for the per-type line
    pub fn phrase(&self) -> &'static str {
        match self {
            TypeBand::Excellent => "Excellent level of performance.",
            TypeBand::Good => "Good level of performance.",
            TypeBand::Acceptable => "Acceptable performance, with room for improvement.",
            TypeBand::BelowExpectations => "Performance below expectations, needs attention.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_type_roundtrip() {
        for ty in MetricType::ALL {
            assert_eq!(MetricType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(MetricType::parse("BOGUS"), None);
    }

    #[test]
    fn test_tier_boundaries_closed_below() {
        assert_eq!(Tier::from_percent(85.0), Tier::Exceptional);
        assert_eq!(Tier::from_percent(84.999), Tier::Solid);
        assert_eq!(Tier::from_percent(70.0), Tier::Solid);
        assert_eq!(Tier::from_percent(69.999), Tier::Moderate);
        assert_eq!(Tier::from_percent(55.0), Tier::Moderate);
        assert_eq!(Tier::from_percent(54.999), Tier::NeedsAttention);
    }

    #[test]
    fn test_type_band_boundaries() {
        assert_eq!(TypeBand::from_percent(90.0), TypeBand::Excellent);
        assert_eq!(TypeBand::from_percent(89.999), TypeBand::Good);
        assert_eq!(TypeBand::from_percent(75.0), TypeBand::Good);
        assert_eq!(TypeBand::from_percent(60.0), TypeBand::Acceptable);
        assert_eq!(TypeBand::from_percent(59.999), TypeBand::BelowExpectations);
    }
}
