//! Typed analysis payloads.
//!
//! The pose service is loosely typed: scores arrive as numbers or strings, metrics may be
//! missing or null, feedback may be a bare string. Everything is converted here, once, at
//! the network boundary so render and classifier code only ever sees validated values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{FormCheckError, Result},
    feedback::normalize_feedback,
    types::{KeypointIndex, Point, Pose},
};

/// A single metric as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// Angle in degrees.
    Angle(f64),
    Flag(bool),
    /// Missing, null, or not coercible.
    Absent,
}

impl MetricValue {
    /// Numbers and numeric strings become angles, booleans stay booleans, anything else is absent.
    pub fn coerce(value: &Value) -> Self {
        match value {
            Value::Bool(b) => MetricValue::Flag(*b),
            Value::Number(n) => n
                .as_f64()
                .filter(|v| v.is_finite())
                .map_or(MetricValue::Absent, MetricValue::Angle),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map_or(MetricValue::Absent, MetricValue::Angle),
            _ => MetricValue::Absent,
        }
    }

    pub fn as_angle(&self) -> Option<f64> {
        match self {
            MetricValue::Angle(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, MetricValue::Absent)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub valid_pose: bool,
    /// Always within [0, 100].
    pub score: f64,
    pub metrics: BTreeMap<String, MetricValue>,
    pub feedback: Vec<String>,
}

impl AnalysisResult {
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| FormCheckError::malformed("analysis is not an object"))?;

        let valid_pose = obj
            .get("valid_pose")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let score = obj.get("score").map(coerce_score).unwrap_or(0.0);

        let metrics = match obj.get("metrics") {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(name, v)| (name.clone(), MetricValue::coerce(v)))
                .collect(),
            _ => BTreeMap::new(),
        };

        let feedback = normalize_feedback(obj.get("feedback").unwrap_or(&Value::Null));

        Ok(Self {
            valid_pose,
            score,
            metrics,
            feedback,
        })
    }

    pub fn metric(&self, name: &str) -> MetricValue {
        self.metrics
            .get(name)
            .copied()
            .unwrap_or(MetricValue::Absent)
    }
}

/// Numeric or numeric-string score clamped into [0, 100]; anything else is 0.
pub fn coerce_score(value: &Value) -> f64 {
    let raw = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    raw.filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 100.0))
        .unwrap_or(0.0)
}

/// One decoded `/api/analyze-frame` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameAnalysis {
    pub pose: Pose,
    pub analysis: AnalysisResult,
}

impl FrameAnalysis {
    pub fn from_response(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| FormCheckError::malformed("response is not an object"))?;

        if let Some(err) = obj.get("error") {
            let message = err
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            return Err(FormCheckError::Service { message });
        }

        let pose = match obj.get("keypoints") {
            None | Some(Value::Null) => Pose::default(),
            Some(Value::Array(items)) => parse_keypoints(items),
            Some(_) => return Err(FormCheckError::malformed("keypoints is not a list")),
        };

        let analysis = obj
            .get("analysis")
            .ok_or_else(|| FormCheckError::malformed("missing analysis"))
            .and_then(AnalysisResult::from_value)?;

        Ok(Self { pose, analysis })
    }
}

fn parse_keypoints(items: &[Value]) -> Pose {
    let mut pose = Pose::default();
    for (slot, item) in pose
        .keypoints
        .iter_mut()
        .zip(items.iter().take(KeypointIndex::COUNT))
    {
        *slot = parse_point(item);
    }
    pose
}

/// Keypoints further than this from the frame origin, in pixels, read as undetected.
pub const MAX_KEYPOINT_COORDINATE: f64 = 100_000.0;

fn parse_point(item: &Value) -> Option<Point> {
    let pair = item.as_array()?;
    let x = pair.first()?.as_f64()?;
    let y = pair.get(1)?.as_f64()?;
    Some(Point::new(x, y)).filter(|p| {
        p.is_finite() && p.x.abs() <= MAX_KEYPOINT_COORDINATE && p.y.abs() <= MAX_KEYPOINT_COORDINATE
    })
}
