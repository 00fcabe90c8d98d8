use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// A keypoint position in pixel space of whatever surface it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

/// COCO 17-keypoint scheme used by the pose service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum KeypointIndex {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl KeypointIndex {
    pub const COUNT: usize = 17;

    pub fn from_index(index: usize) -> Option<Self> {
        use KeypointIndex::*;
        const ALL: [KeypointIndex; KeypointIndex::COUNT] = [
            Nose,
            LeftEye,
            RightEye,
            LeftEar,
            RightEar,
            LeftShoulder,
            RightShoulder,
            LeftElbow,
            RightElbow,
            LeftWrist,
            RightWrist,
            LeftHip,
            RightHip,
            LeftKnee,
            RightKnee,
            LeftAnkle,
            RightAnkle,
        ];
        ALL.get(index).copied()
    }

    pub fn part(self) -> BodyPart {
        use KeypointIndex::*;
        match self {
            Nose => BodyPart::Nose,
            LeftShoulder | RightShoulder => BodyPart::Shoulder,
            LeftElbow | RightElbow => BodyPart::Elbow,
            LeftWrist | RightWrist => BodyPart::Wrist,
            LeftHip | RightHip => BodyPart::Hip,
            LeftKnee | RightKnee => BodyPart::Knee,
            LeftAnkle | RightAnkle => BodyPart::Ankle,
            LeftEye | RightEye | LeftEar | RightEar => BodyPart::Other,
        }
    }
}

/// Anatomical group used for keypoint coloring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyPart {
    Nose,
    Shoulder,
    Elbow,
    Wrist,
    Hip,
    Knee,
    Ankle,
    Other,
}

/// One detected person: 17 keypoints, `None` where the estimator lacked confidence.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pose {
    pub keypoints: [Option<Point>; KeypointIndex::COUNT],
}

impl Pose {
    pub fn new(keypoints: [Option<Point>; KeypointIndex::COUNT]) -> Self {
        Self { keypoints }
    }

    pub fn get(&self, index: KeypointIndex) -> Option<Point> {
        self.keypoints[index as usize]
    }

    /// Out-of-range indices read as absent.
    pub fn at(&self, index: usize) -> Option<Point> {
        self.keypoints.get(index).copied().flatten()
    }

    pub fn present_count(&self) -> usize {
        self.keypoints.iter().filter(|k| k.is_some()).count()
    }

    pub fn map(&self, f: impl Fn(Point) -> Point) -> Self {
        Self {
            keypoints: self.keypoints.map(|k| k.map(&f)),
        }
    }
}

/// Native resolution of a surface. Zero means unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDimensions {
    pub width: u32,
    pub height: u32,
}

impl FrameDimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_known(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn or(self, fallback: FrameDimensions) -> Self {
        if self.is_known() { self } else { fallback }
    }
}

/// The pose of the most recent accepted analysis, in source-video space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseFrame {
    pub pose: Pose,
    pub video: FrameDimensions,
    pub captured_at: SystemTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypoint_index_from_index() {
        assert_eq!(KeypointIndex::from_index(0), Some(KeypointIndex::Nose));
        assert_eq!(KeypointIndex::from_index(16), Some(KeypointIndex::RightAnkle));
        assert_eq!(KeypointIndex::from_index(17), None);
    }

    #[test]
    fn test_parts_follow_anatomy() {
        assert_eq!(KeypointIndex::RightElbow.part(), BodyPart::Elbow);
        assert_eq!(KeypointIndex::LeftHip.part(), BodyPart::Hip);
        assert_eq!(KeypointIndex::LeftEar.part(), BodyPart::Other);
    }

    #[test]
    fn test_pose_serializes_as_pairs_and_nulls() {
        let mut pose = Pose::default();
        pose.keypoints[0] = Some(Point::new(10.0, 20.5));

        let json = serde_json::to_value(pose).unwrap();
        assert_eq!(json[0], serde_json::json!([10.0, 20.5]));
        assert!(json[1].is_null());
        assert_eq!(json.as_array().unwrap().len(), KeypointIndex::COUNT);
    }

    #[test]
    fn test_pose_at_tolerates_bad_indices() {
        let pose = Pose::default();
        assert_eq!(pose.at(40), None);
        assert_eq!(pose.present_count(), 0);
    }

    #[test]
    fn test_unknown_dimensions_fall_back() {
        let fallback = FrameDimensions::new(640, 480);
        assert_eq!(FrameDimensions::new(0, 480).or(fallback), fallback);
        assert_eq!(
            FrameDimensions::new(1280, 720).or(fallback),
            FrameDimensions::new(1280, 720)
        );
    }
}
