//! Per-metric pass/fail judging against fixed shooting-form ranges.
//!
//! The aggregate score comes from the pose service and is only interpreted here (tiers and
//! colors), never recomputed.

use serde::Serialize;

use crate::{
    analysis::{AnalysisResult, MetricValue},
    format::{format_metric_value, metric_label},
    render::Rgb,
};

pub const ELBOW_ANGLE: &str = "elbow_angle";
pub const KNEE_ANGLE: &str = "knee_angle";
pub const SHOOTING_ARC: &str = "shooting_arc";
pub const WRIST_ABOVE_ELBOW: &str = "wrist_above_elbow";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Acceptable {
    /// Inclusive range in degrees.
    Range { min: f64, max: f64 },
    Expect(bool),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricThreshold {
    pub name: &'static str,
    pub acceptable: Acceptable,
}

pub const METRIC_THRESHOLDS: [MetricThreshold; 4] = [
    MetricThreshold {
        name: ELBOW_ANGLE,
        acceptable: Acceptable::Range {
            min: 80.0,
            max: 100.0,
        },
    },
    MetricThreshold {
        name: KNEE_ANGLE,
        acceptable: Acceptable::Range {
            min: 120.0,
            max: 150.0,
        },
    },
    MetricThreshold {
        name: SHOOTING_ARC,
        acceptable: Acceptable::Range {
            min: 45.0,
            max: 60.0,
        },
    },
    MetricThreshold {
        name: WRIST_ABOVE_ELBOW,
        acceptable: Acceptable::Expect(true),
    },
];

pub fn threshold_for(name: &str) -> Option<&'static MetricThreshold> {
    METRIC_THRESHOLDS.iter().find(|t| t.name == name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Judgement {
    Good,
    NotGood,
    /// Value missing or of the wrong kind; shown as "N/A".
    Unavailable,
    /// No threshold entry for this metric name.
    Unclassifiable,
}

impl Judgement {
    pub fn is_good(self) -> bool {
        self == Judgement::Good
    }
}

pub fn classify_metric(name: &str, value: MetricValue) -> Judgement {
    let Some(threshold) = threshold_for(name) else {
        return Judgement::Unclassifiable;
    };

    match (threshold.acceptable, value) {
        (Acceptable::Range { min, max }, MetricValue::Angle(v)) => {
            if (min..=max).contains(&v) {
                Judgement::Good
            } else {
                Judgement::NotGood
            }
        }
        (Acceptable::Expect(expected), MetricValue::Flag(b)) => {
            if b == expected {
                Judgement::Good
            } else {
                Judgement::NotGood
            }
        }
        _ => Judgement::Unavailable,
    }
}

/// One metric ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricReading {
    pub name: String,
    pub label: String,
    pub display: String,
    pub judgement: Judgement,
}

/// Known metrics in table order (absent ones as "N/A"), then any extra names the service sent.
pub fn classify_metrics(analysis: &AnalysisResult) -> Vec<MetricReading> {
    let mut names: Vec<&str> = METRIC_THRESHOLDS.iter().map(|t| t.name).collect();
    names.extend(
        analysis
            .metrics
            .keys()
            .map(String::as_str)
            .filter(|name| threshold_for(name).is_none()),
    );

    names
        .into_iter()
        .map(|name| {
            let value = analysis.metric(name);
            MetricReading {
                name: name.to_string(),
                label: metric_label(name),
                display: format_metric_value(name, value),
                judgement: classify_metric(name, value),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormQuality {
    Good,
    NeedsImprovement,
    Bad,
}

impl FormQuality {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            FormQuality::Good
        } else if score >= 60.0 {
            FormQuality::NeedsImprovement
        } else {
            FormQuality::Bad
        }
    }

    /// Without a valid pose the overlay stays in the neutral "needs improvement" tier.
    pub fn for_analysis(analysis: &AnalysisResult) -> Self {
        if analysis.valid_pose {
            Self::from_score(analysis.score)
        } else {
            FormQuality::NeedsImprovement
        }
    }

    pub fn color(self) -> Rgb {
        match self {
            FormQuality::Good => Rgb::new(39, 174, 96),
            FormQuality::NeedsImprovement => Rgb::new(243, 156, 18),
            FormQuality::Bad => Rgb::new(231, 76, 60),
        }
    }
}

pub fn score_color(score: f64) -> Rgb {
    FormQuality::from_score(score).color()
}
