use std::time::SystemTime;

use chrono::{DateTime, Local};

use crate::{
    analysis::{AnalysisResult, MetricValue},
    classify::{
        ELBOW_ANGLE, FormQuality, KNEE_ANGLE, SHOOTING_ARC, WRIST_ABOVE_ELBOW, classify_metrics,
    },
    feedback::compose_feedback,
    history::HistoryEntry,
};

pub const NOT_AVAILABLE: &str = "N/A";

/// Local wall-clock display string for a capture time
pub fn format_timestamp(at: SystemTime) -> String {
    let local: DateTime<Local> = at.into();
    local.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn metric_label(name: &str) -> String {
    match name {
        ELBOW_ANGLE => "Elbow Angle".to_string(),
        KNEE_ANGLE => "Knee Angle".to_string(),
        SHOOTING_ARC => "Shooting Arc".to_string(),
        WRIST_ABOVE_ELBOW => "Wrist Position".to_string(),
        other => other
            .split('_')
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" "),
    }
}

pub fn format_angle(value: MetricValue) -> String {
    match value.as_angle() {
        Some(v) if v.is_finite() => format!("{:.1}°", v),
        _ => NOT_AVAILABLE.to_string(),
    }
}

pub fn format_flag(value: MetricValue) -> String {
    match value {
        MetricValue::Flag(true) => "Good".to_string(),
        MetricValue::Flag(false) => "Needs Improvement".to_string(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

pub fn format_metric_value(name: &str, value: MetricValue) -> String {
    match (name, value) {
        (WRIST_ABOVE_ELBOW, _) | (_, MetricValue::Flag(_)) => format_flag(value),
        _ => format_angle(value),
    }
}

/// Score line, or `None` when there is no valid pose to score
pub fn format_score(analysis: &AnalysisResult) -> Option<String> {
    analysis
        .valid_pose
        .then(|| format!("Form Score: {}%", analysis.score.round() as i64))
}

pub fn format_analysis_readable(analysis: &AnalysisResult) -> String {
    let mut output = String::new();

    match format_score(analysis) {
        Some(score) => {
            let tier = match FormQuality::for_analysis(analysis) {
                FormQuality::Good => "good",
                FormQuality::NeedsImprovement => "needs improvement",
                FormQuality::Bad => "bad",
            };
            output.push_str(&format!("{} ({})\n\n", score, tier));
        }
        None => output.push_str("No valid pose detected\n\n"),
    }

    output.push_str("Form Metrics:\n");
    for reading in classify_metrics(analysis) {
        let mark = if reading.judgement.is_good() { "✓" } else { "·" };
        output.push_str(&format!(
            "  {} {}: {}\n",
            mark, reading.label, reading.display
        ));
    }
    output.push('\n');

    output.push_str("Form Feedback:\n");
    for item in compose_feedback(&analysis.feedback) {
        output.push_str(&format!("  {} {}\n", item.sentiment.icon(), item.text));
    }

    output
}

/// One-line form of [`format_analysis_readable`] for live output.
pub fn format_analysis_summary(analysis: &AnalysisResult) -> String {
    let mut parts = vec![format_score(analysis).unwrap_or_else(|| "No valid pose".to_string())];
    parts.extend(classify_metrics(analysis).into_iter().map(|r| {
        let mark = if r.judgement.is_good() { "✓" } else { "·" };
        format!("{} {} {}", r.label, r.display, mark)
    }));
    parts.join(" | ")
}

pub fn format_history_entry(entry: &HistoryEntry) -> String {
    let score = format_score(&entry.analysis).unwrap_or_else(|| "No valid pose".to_string());
    format!(
        "#{} [{}] {} | {} feedback item(s) | snapshot {} bytes",
        entry.id,
        entry.timestamp,
        score,
        entry.analysis.feedback.len(),
        entry.screenshot.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_line() {
        let mut metrics = std::collections::BTreeMap::new();
        metrics.insert(ELBOW_ANGLE.to_string(), MetricValue::Angle(90.0));
        let analysis = AnalysisResult {
            valid_pose: true,
            score: 84.6,
            metrics,
            feedback: Vec::new(),
        };
        let line = format_analysis_summary(&analysis);
        assert!(line.starts_with("Form Score: 85% | Elbow Angle 90.0° ✓"));
        assert!(line.contains("Knee Angle N/A ·"));
    }

    #[test]
    fn test_labels() {
        assert_eq!(metric_label(ELBOW_ANGLE), "Elbow Angle");
        assert_eq!(metric_label(WRIST_ABOVE_ELBOW), "Wrist Position");
        assert_eq!(metric_label("hip_turn_rate"), "Hip Turn Rate");
    }

    #[test]
    fn test_angle_and_flag_display() {
        assert_eq!(format_angle(MetricValue::Angle(87.26)), "87.3°");
        assert_eq!(format_angle(MetricValue::Angle(f64::NAN)), NOT_AVAILABLE);
        assert_eq!(format_angle(MetricValue::Flag(true)), NOT_AVAILABLE);
        assert_eq!(format_flag(MetricValue::Flag(false)), "Needs Improvement");
        assert_eq!(
            format_metric_value(WRIST_ABOVE_ELBOW, MetricValue::Absent),
            NOT_AVAILABLE
        );
    }

    #[test]
    fn test_score_hidden_without_valid_pose() {
        let mut analysis = AnalysisResult {
            valid_pose: true,
            score: 74.6,
            metrics: Default::default(),
            feedback: vec!["Good knee bend".to_string()],
        };
        assert_eq!(format_score(&analysis).as_deref(), Some("Form Score: 75%"));

        analysis.valid_pose = false;
        assert_eq!(format_score(&analysis), None);
        assert!(format_analysis_readable(&analysis).starts_with("No valid pose"));
    }

    #[test]
    fn test_readable_lists_feedback_with_icons() {
        let analysis = AnalysisResult {
            valid_pose: true,
            score: 50.0,
            metrics: Default::default(),
            feedback: vec![
                "Good knee bend".to_string(),
                "Elbow angle too small".to_string(),
            ],
        };
        let text = format_analysis_readable(&analysis);
        assert!(text.contains("(bad)"));
        assert!(text.contains("✓ Good knee bend"));
        assert!(text.contains("✗ Elbow angle too small"));
        assert!(text.contains("Elbow Angle: N/A"));
    }
}
