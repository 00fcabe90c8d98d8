use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    analysis::FrameAnalysis,
    config::FormCheckConfig,
    error::{FormCheckError, Result},
    session::ConnectionStatus,
};

pub const HEALTH_PATH: &str = "/api/health";
pub const ANALYZE_FRAME_PATH: &str = "/api/analyze-frame";

/// The remote pose estimator, as seen by the scheduler.
#[async_trait]
pub trait PoseService: Send + Sync + 'static {
    /// Submit one JPEG data URL and return the validated pose and analysis.
    async fn analyze_frame(&self, image: String) -> Result<FrameAnalysis>;

    async fn check_health(&self) -> ConnectionStatus;
}

pub struct AnalysisClient {
    http: reqwest::Client,
    base_url: String,
    min_keypoints: usize,
}

impl AnalysisClient {
    pub fn new(config: &FormCheckConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.backend_url.trim_end_matches('/').to_string(),
            min_keypoints: config.min_keypoints,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Reject detections too sparse to draw without flicker.
pub fn validate_detection(result: FrameAnalysis, min_keypoints: usize) -> Result<FrameAnalysis> {
    let present = result.pose.present_count();
    if present < min_keypoints {
        return Err(FormCheckError::malformed(format!(
            "only {} of {} keypoints detected",
            present, min_keypoints
        )));
    }
    Ok(result)
}

/// Turn a health body into an indicator state.
pub fn health_status(body: &Value, base_url: &str) -> ConnectionStatus {
    match body.get("status").and_then(Value::as_str) {
        Some("ok") => ConnectionStatus::Connected,
        Some(other) => ConnectionStatus::Unhealthy(other.to_string()),
        None if body.is_object() => ConnectionStatus::Unhealthy(body.to_string()),
        None => ConnectionStatus::Unreachable(base_url.to_string()),
    }
}

#[async_trait]
impl PoseService for AnalysisClient {
    async fn analyze_frame(&self, image: String) -> Result<FrameAnalysis> {
        debug!(bytes = image.len(), "submitting frame");

        let response = self
            .http
            .post(self.url(ANALYZE_FRAME_PATH))
            .json(&serde_json::json!({ "image": image }))
            .send()
            .await?;

        let status = response.status();
        let body = response.json::<Value>().await;

        let body = match body {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(FormCheckError::Service {
                    message: format!("HTTP {}", status),
                });
            }
            Err(e) => return Err(e.into()),
        };

        if !status.is_success() && body.get("error").is_none() {
            return Err(FormCheckError::Service {
                message: format!("HTTP {}", status),
            });
        }

        let result = FrameAnalysis::from_response(&body)?;
        validate_detection(result, self.min_keypoints)
    }

    async fn check_health(&self) -> ConnectionStatus {
        let response = match self.http.get(self.url(HEALTH_PATH)).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "health check failed");
                return ConnectionStatus::Unreachable(self.base_url.clone());
            }
        };

        match response.json::<Value>().await {
            Ok(body) => health_status(&body, &self.base_url),
            Err(e) => {
                warn!(error = %e, "health response unreadable");
                ConnectionStatus::Unhealthy(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        analysis::AnalysisResult,
        types::{Point, Pose},
    };

    fn with_points(n: usize) -> FrameAnalysis {
        let mut pose = Pose::default();
        for slot in pose.keypoints.iter_mut().take(n) {
            *slot = Some(Point::new(1.0, 2.0));
        }
        FrameAnalysis {
            pose,
            analysis: AnalysisResult {
                valid_pose: true,
                score: 50.0,
                metrics: Default::default(),
                feedback: Vec::new(),
            },
        }
    }

    #[test]
    fn test_sparse_detection_is_malformed() {
        let err = validate_detection(with_points(9), 10).unwrap_err();
        assert!(matches!(err, FormCheckError::MalformedResult { .. }));
        assert!(!err.is_transient());

        assert!(validate_detection(with_points(10), 10).is_ok());
        assert!(validate_detection(with_points(17), 10).is_ok());
    }

    #[test]
    fn test_health_status_mapping() {
        let url = "http://localhost:5000";
        assert_eq!(
            health_status(&json!({"status": "ok"}), url),
            ConnectionStatus::Connected
        );
        assert_eq!(
            health_status(&json!({"status": "degraded"}), url),
            ConnectionStatus::Unhealthy("degraded".into())
        );
        assert_eq!(
            health_status(&json!("ok"), url),
            ConnectionStatus::Unreachable(url.into())
        );
    }

    #[test]
    fn test_base_url_is_normalized() {
        let config = FormCheckConfig {
            backend_url: "http://127.0.0.1:5000/".into(),
            ..Default::default()
        };
        let client = AnalysisClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:5000");
        assert_eq!(
            client.url(ANALYZE_FRAME_PATH),
            "http://127.0.0.1:5000/api/analyze-frame"
        );
    }
}
