//! Scoring engine
//!
//! Pure functions over metric observations: target-based percentage
//! normalization, per-type and overall averaging, tier classification, and
//! the deterministic narrative/recommendation renderers used when the remote
//! model is unavailable.

use crate::db::observations::MetricObservation;
use crate::models::{MetricType, Tier, TypeBand};
use std::collections::HashMap;

/// Fixed remediation advice per metric type (used for sub-70% averages)
const TYPE_ADVICE: &[(MetricType, &str)] = &[
    (
        MetricType::Attendance,
        "Improve punctuality and presence. Consider flexible scheduling where appropriate.",
    ),
    (
        MetricType::Velocity,
        "Increase execution speed. Identify bottlenecks and streamline processes.",
    ),
    (
        MetricType::Quality,
        "Strengthen quality control. Provide additional training on quality standards.",
    ),
    (
        MetricType::Productivity,
        "Improve productivity. Review tools and working methods to optimize output.",
    ),
    (
        MetricType::Efficiency,
        "Optimize efficiency. Reduce wasted resources and improve time management.",
    ),
];

/// Generic managerial actions appended when the overall average drops below 60%
const GENERAL_ADVICE: &[&str] = &[
    "Schedule a follow-up meeting to discuss objectives and obstacles.",
    "Put a personalized improvement plan in place.",
    "Provide additional training resources where needed.",
];

/// Normalize one observation to a percent score
///
/// `(value / target) * 100` when a target is present and > 0; a target of
/// zero or less is ignored and the value is treated as already a percentage.
pub fn normalize(obs: &MetricObservation) -> f64 {
    match obs.target {
        Some(target) if target > 0.0 => (obs.value / target) * 100.0,
        _ => obs.value,
    }
}

/// Average normalized percent per metric type present in the observations
pub fn score_by_type(observations: &[MetricObservation]) -> HashMap<MetricType, f64> {
    let mut sums: HashMap<MetricType, (f64, usize)> = HashMap::new();
    for obs in observations {
        let entry = sums.entry(obs.metric_type).or_insert((0.0, 0));
        entry.0 += normalize(obs);
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(ty, (sum, n))| (ty, sum / n as f64))
        .collect()
}

/// Flat average of normalized values across all observations
///
/// Deliberately not an average of type averages: a type with more rows
/// weighs more.
pub fn overall_score(observations: &[MetricObservation]) -> f64 {
    if observations.is_empty() {
        return 0.0;
    }
    let sum: f64 = observations.iter().map(normalize).sum();
    sum / observations.len() as f64
}

/// Deterministic narrative assessment, rendered without any remote call
///
/// One line per metric type present (in declared type order), then the
/// overall average and its tier phrase.
pub fn render_analysis(observations: &[MetricObservation]) -> String {
    let by_type = score_by_type(observations);

    let mut out = String::from("Performance analysis\n\n");
    for ty in MetricType::ALL {
        if let Some(score) = by_type.get(&ty) {
            let band = TypeBand::from_percent(*score);
            out.push_str(&format!("{}: {:.2}% - {}\n", ty.label(), score, band.phrase()));
        }
    }

    let type_average = if by_type.is_empty() {
        0.0
    } else {
        by_type.values().sum::<f64>() / by_type.len() as f64
    };
    out.push_str(&format!("\nOverall average score: {:.2}%", type_average));

    let tier = Tier::from_percent(type_average);
    out.push_str(&format!("\n\nOverall assessment: {}", tier.phrase()));

    out
}

/// Deterministic recommendations, rendered without any remote call
///
/// A bulleted remediation line per metric type averaging below 70%, a
/// generic managerial block when the overall average is below 60%, and a
/// single "no specific recommendation" line when neither applies.
pub fn render_recommendations(observations: &[MetricObservation]) -> String {
    let by_type = score_by_type(observations);

    let mut out = String::from("Recommendations\n\n");
    let mut emitted = false;

    for ty in MetricType::ALL {
        if let Some(score) = by_type.get(&ty) {
            if *score < 70.0 {
                let advice = TYPE_ADVICE
                    .iter()
                    .find(|(t, _)| *t == ty)
                    .map(|(_, a)| *a)
                    .unwrap_or_default();
                out.push_str(&format!("- {} ({:.1}%): {}\n", ty.label(), score, advice));
                emitted = true;
            }
        }
    }

    if overall_score(observations) < 60.0 {
        out.push_str("\nGeneral recommendations:\n");
        for line in GENERAL_ADVICE {
            out.push_str(&format!("- {}\n", line));
        }
        emitted = true;
    }

    if !emitted {
        out.push_str("No specific recommendation. Overall performance is satisfactory.");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn obs(metric_type: MetricType, value: f64, target: Option<f64>) -> MetricObservation {
        MetricObservation::new(Uuid::new_v4(), metric_type, value, target, None)
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(&obs(MetricType::Quality, 45.0, Some(50.0))), 90.0);
        assert_eq!(normalize(&obs(MetricType::Quality, 45.0, None)), 45.0);
        // Target <= 0 degrades to treating value as already a percentage
        assert_eq!(normalize(&obs(MetricType::Quality, 10.0, Some(0.0))), 10.0);
        assert_eq!(normalize(&obs(MetricType::Quality, 10.0, Some(-5.0))), 10.0);
    }

    #[test]
    fn test_score_by_type_groups_and_averages() {
        let observations = vec![
            obs(MetricType::Quality, 80.0, None),
            obs(MetricType::Quality, 60.0, None),
            obs(MetricType::Velocity, 50.0, Some(100.0)),
        ];
        let by_type = score_by_type(&observations);
        assert_eq!(by_type[&MetricType::Quality], 70.0);
        assert_eq!(by_type[&MetricType::Velocity], 50.0);
    }

    #[test]
    fn test_overall_is_flat_average() {
        // Two quality rows, one velocity row: quality weighs double
        let observations = vec![
            obs(MetricType::Quality, 90.0, None),
            obs(MetricType::Quality, 90.0, None),
            obs(MetricType::Velocity, 30.0, None),
        ];
        assert_eq!(overall_score(&observations), 70.0);
        assert_eq!(overall_score(&[]), 0.0);
    }

    #[test]
    fn test_analysis_narrative_contents() {
        let observations = vec![obs(MetricType::Quality, 72.0, Some(80.0))];
        let text = render_analysis(&observations);
        assert!(text.contains("Quality: 90.00%"));
        assert!(text.contains("Excellent level of performance."));
        assert!(text.contains("Overall average score: 90.00%"));
        assert!(text.contains("Exceptional performance."));
    }

    #[test]
    fn test_recommendations_below_threshold() {
        let observations = vec![
            obs(MetricType::Velocity, 50.0, None),
            obs(MetricType::Quality, 95.0, None),
        ];
        let text = render_recommendations(&observations);
        assert!(text.contains("- Velocity (50.0%):"));
        assert!(!text.contains("- Quality"));
    }

    #[test]
    fn test_recommendations_generic_block_below_60() {
        let observations = vec![obs(MetricType::Efficiency, 40.0, None)];
        let text = render_recommendations(&observations);
        assert!(text.contains("- Efficiency (40.0%):"));
        assert!(text.contains("General recommendations:"));
        assert!(text.contains("Schedule a follow-up meeting"));
    }

    #[test]
    fn test_recommendations_none_needed() {
        let observations = vec![obs(MetricType::Quality, 95.0, None)];
        let text = render_recommendations(&observations);
        assert!(text.contains("No specific recommendation"));
        assert!(!text.contains("General recommendations"));
    }
}
