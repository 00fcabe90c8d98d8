use serde::Serialize;
use serde_json::Value;

pub const ANALYZING_PLACEHOLDER: &str = "Analyzing your form...";
pub const NO_FEEDBACK_PLACEHOLDER: &str = "No specific feedback at this moment";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn icon(self) -> &'static str {
        match self {
            Sentiment::Positive => "✓",
            Sentiment::Negative => "✗",
            Sentiment::Neutral => "ℹ",
        }
    }
}

/// A feedback line with its display sentiment. Recomputed per render, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackItem<'a> {
    pub text: &'a str,
    pub sentiment: Sentiment,
}

/// Lexical heuristic over backend-authored text; a miss only changes the icon.
pub fn classify_feedback(text: &str) -> Sentiment {
    if text.starts_with("Good") {
        Sentiment::Positive
    } else if ["too", "more", "should"]
        .iter()
        .any(|needle| text.contains(needle))
    {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

pub fn compose_feedback(lines: &[String]) -> Vec<FeedbackItem<'_>> {
    lines
        .iter()
        .map(|text| FeedbackItem {
            text,
            sentiment: classify_feedback(text),
        })
        .collect()
}

/// Feedback as the service sends it: a list, a bare string, or garbage.
pub fn normalize_feedback(value: &Value) -> Vec<String> {
    let lines: Vec<String> = match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Value::Null => Vec::new(),
        _ => vec![ANALYZING_PLACEHOLDER.to_string()],
    };

    if lines.is_empty() {
        vec![NO_FEEDBACK_PLACEHOLDER.to_string()]
    } else {
        lines
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_classify_feedback() {
        assert_eq!(classify_feedback("Good knee bend"), Sentiment::Positive);
        assert_eq!(
            classify_feedback("Elbow angle too wide (120.0°). Bring your forearm closer to vertical."),
            Sentiment::Negative
        );
        assert_eq!(
            classify_feedback("Bend your knees more for better balance and power"),
            Sentiment::Negative
        );
        assert_eq!(
            classify_feedback("Raise your shooting hand higher, wrist should be above elbow"),
            Sentiment::Negative
        );
        assert_eq!(
            classify_feedback("Increase your shooting arc for better trajectory"),
            Sentiment::Neutral
        );
    }

    #[test]
    fn test_starts_with_good_wins_over_negative_words() {
        assert_eq!(
            classify_feedback("Good wrist position, keep it there more often"),
            Sentiment::Positive
        );
        // case sensitive, like the backend's phrasing
        assert_eq!(classify_feedback("good elbow"), Sentiment::Neutral);
    }

    #[test]
    fn test_compose_keeps_order() {
        let lines = vec!["Good shooting arc".to_string(), "Lower it".to_string()];
        let items = compose_feedback(&lines);
        assert_eq!(items[0].sentiment, Sentiment::Positive);
        assert_eq!(items[1].text, "Lower it");
        assert_eq!(items[1].sentiment.icon(), "ℹ");
    }

    #[test]
    fn test_normalize_feedback_shapes() {
        assert_eq!(normalize_feedback(&json!("single")), vec!["single"]);
        assert_eq!(normalize_feedback(&json!(["a", null, "b"])), vec!["a", "b"]);
        assert_eq!(normalize_feedback(&json!([])), vec![NO_FEEDBACK_PLACEHOLDER]);
        assert_eq!(normalize_feedback(&json!(null)), vec![NO_FEEDBACK_PLACEHOLDER]);
        assert_eq!(normalize_feedback(&json!(42)), vec![ANALYZING_PLACEHOLDER]);
    }
}
