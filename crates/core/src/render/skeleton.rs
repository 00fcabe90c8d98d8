//! Skeleton overlay: keypoint dots, bone chains and the shooting-elbow highlight.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::{
    analysis::{AnalysisResult, MetricValue},
    classify::{ELBOW_ANGLE, FormQuality, Judgement, classify_metric},
    render::{DrawSurface, Rgb},
    types::{BodyPart, KeypointIndex, Point, Pose},
};

use KeypointIndex::*;

/// Bone chains. A missing keypoint breaks only the segments touching it.
pub const SKELETON_CHAINS: [&[KeypointIndex]; 6] = [
    &[LeftShoulder, LeftElbow, LeftWrist],
    &[RightShoulder, RightElbow, RightWrist],
    &[LeftShoulder, LeftHip, LeftKnee, LeftAnkle],
    &[RightShoulder, RightHip, RightKnee, RightAnkle],
    &[LeftShoulder, RightShoulder],
    &[LeftHip, RightHip],
];

/// Number of bones a pose will get, i.e. chain-adjacent pairs with both ends present.
pub fn drawable_segments(pose: &Pose) -> usize {
    SKELETON_CHAINS
        .iter()
        .flat_map(|chain| chain.windows(2))
        .filter(|pair| pose.get(pair[0]).is_some() && pose.get(pair[1]).is_some())
        .count()
}

mod colors {
    use crate::render::Rgb;

    pub const NOSE: Rgb = Rgb::new(0xFF, 0x00, 0x00);
    pub const SHOULDER: Rgb = Rgb::new(0x00, 0xFF, 0x00);
    pub const ELBOW: Rgb = Rgb::new(0x00, 0x00, 0xFF);
    pub const WRIST: Rgb = Rgb::new(0xFF, 0xA5, 0x00);
    pub const HIP: Rgb = Rgb::new(0x80, 0x00, 0x80);
    pub const KNEE: Rgb = Rgb::new(0xFF, 0xFF, 0x00);
    pub const ANKLE: Rgb = Rgb::new(0x00, 0xFF, 0xFF);
    pub const NEUTRAL: Rgb = Rgb::WHITE;
    pub const BONE: Rgb = Rgb::WHITE;
    /// Skeleton-only view background (#1a1a1a)
    pub const SKELETON_VIEW_BACKGROUND: Rgb = Rgb::new(0x1A, 0x1A, 0x1A);
}

pub fn part_color(part: BodyPart) -> Rgb {
    match part {
        BodyPart::Nose => colors::NOSE,
        BodyPart::Shoulder => colors::SHOULDER,
        BodyPart::Elbow => colors::ELBOW,
        BodyPart::Wrist => colors::WRIST,
        BodyPart::Hip => colors::HIP,
        BodyPart::Knee => colors::KNEE,
        BodyPart::Ankle => colors::ANKLE,
        BodyPart::Other => colors::NEUTRAL,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    /// Each keypoint colored by its body part, bones white.
    #[default]
    Anatomical,
    /// Everything in the form-quality color of the current analysis.
    FormQuality,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderStyle {
    pub point_radius: f64,
    pub line_width: f64,
    pub background: Option<Rgb>,
    pub color_mode: ColorMode,
}

/// What one render call paints. The pose must already be in surface space.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scene<'a> {
    pub backdrop: Option<&'a RgbaImage>,
    pub pose: Option<&'a Pose>,
    pub analysis: Option<&'a AnalysisResult>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub points: usize,
    pub segments: usize,
    pub elbow_highlighted: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SkeletonRenderer {
    style: RenderStyle,
}

impl SkeletonRenderer {
    pub fn new(style: RenderStyle) -> Self {
        Self { style }
    }

    /// Overlay on top of the live video.
    pub fn overlay() -> Self {
        Self::new(RenderStyle {
            point_radius: 6.0,
            line_width: 3.0,
            background: None,
            color_mode: ColorMode::Anatomical,
        })
    }

    /// Standalone skeleton panel on a dark background.
    pub fn skeleton_view() -> Self {
        Self::new(RenderStyle {
            point_radius: 6.0,
            line_width: 4.0,
            background: Some(colors::SKELETON_VIEW_BACKGROUND),
            color_mode: ColorMode::Anatomical,
        })
    }

    pub fn with_color_mode(mut self, mode: ColorMode) -> Self {
        self.style.color_mode = mode;
        self
    }

    pub fn style(&self) -> &RenderStyle {
        &self.style
    }

    /// Clears and repaints the whole surface. Never fails; absent data just draws less.
    pub fn render(&self, surface: &mut dyn DrawSurface, scene: Scene<'_>) -> RenderStats {
        surface.clear(self.style.background);
        if let Some(frame) = scene.backdrop {
            surface.blit(frame);
        }

        let mut stats = RenderStats::default();
        let Some(pose) = scene.pose else {
            return stats;
        };

        let quality_color = match (self.style.color_mode, scene.analysis) {
            (ColorMode::FormQuality, Some(analysis)) => {
                Some(FormQuality::for_analysis(analysis).color())
            }
            (ColorMode::FormQuality, None) => Some(FormQuality::NeedsImprovement.color()),
            (ColorMode::Anatomical, _) => None,
        };

        for (index, point) in pose.keypoints.iter().enumerate() {
            let Some(point) = point else { continue };
            let color = quality_color.unwrap_or_else(|| {
                KeypointIndex::from_index(index)
                    .map(|k| part_color(k.part()))
                    .unwrap_or(colors::NEUTRAL)
            });
            surface.fill_circle(*point, self.style.point_radius, color);
            stats.points += 1;
        }

        let bone_color = quality_color.unwrap_or(colors::BONE);
        for pair in SKELETON_CHAINS.iter().flat_map(|chain| chain.windows(2)) {
            if let (Some(from), Some(to)) = (pose.get(pair[0]), pose.get(pair[1])) {
                surface.stroke_line(from, to, self.style.line_width, bone_color);
                stats.segments += 1;
            }
        }

        if let Some(analysis) = scene.analysis {
            stats.elbow_highlighted = self.highlight_elbow(surface, pose, analysis);
        }

        stats
    }

    /// Ring and degree label on the shooting (right) elbow.
    fn highlight_elbow(
        &self,
        surface: &mut dyn DrawSurface,
        pose: &Pose,
        analysis: &AnalysisResult,
    ) -> bool {
        if !analysis.valid_pose {
            return false;
        }
        let value = analysis.metric(ELBOW_ANGLE);
        let MetricValue::Angle(angle) = value else {
            return false;
        };
        let (Some(_), Some(elbow), Some(_)) = (
            pose.get(RightShoulder),
            pose.get(RightElbow),
            pose.get(RightWrist),
        ) else {
            return false;
        };

        let color = match classify_metric(ELBOW_ANGLE, value) {
            Judgement::Good => FormQuality::Good.color(),
            _ => FormQuality::Bad.color(),
        };
        surface.stroke_ring(elbow, self.style.point_radius + 3.0, 3.0, color);

        let label_at = Point::new(elbow.x + 10.0, elbow.y);
        surface.draw_label(
            label_at,
            &format!("{}°", angle.round() as i64),
            Rgb::WHITE,
            Rgb::BLACK,
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeMap,
        time::{Duration, Instant},
    };

    use super::*;
    use crate::{
        render::{DrawCommand, DrawRecorder, RasterCanvas},
        types::FrameDimensions,
    };

    fn pose_from_mask(mask: u32) -> Pose {
        let mut pose = Pose::default();
        for i in 0..KeypointIndex::COUNT {
            if mask & (1 << i) != 0 {
                pose.keypoints[i] = Some(Point::new(i as f64 * 10.0, i as f64 * 5.0));
            }
        }
        pose
    }

    fn analysis(valid_pose: bool, score: f64, elbow: MetricValue) -> AnalysisResult {
        let mut metrics = BTreeMap::new();
        metrics.insert(ELBOW_ANGLE.to_string(), elbow);
        AnalysisResult {
            valid_pose,
            score,
            metrics,
            feedback: Vec::new(),
        }
    }

    #[test]
    fn test_segment_count_matches_present_pairs_for_every_mask() {
        let renderer = SkeletonRenderer::overlay();
        let mut surface = DrawRecorder::new(FrameDimensions::new(640, 480));

        for mask in 0..(1u32 << KeypointIndex::COUNT) {
            let pose = pose_from_mask(mask);
            let stats = renderer.render(
                &mut surface,
                Scene {
                    pose: Some(&pose),
                    ..Default::default()
                },
            );
            let expected = drawable_segments(&pose);
            assert_eq!(stats.segments, expected, "mask {mask:#019b}");
            assert_eq!(surface.lines().count(), expected, "mask {mask:#019b}");
            assert_eq!(stats.points, mask.count_ones() as usize);
        }
    }

    #[test]
    fn test_missing_point_breaks_only_its_segments() {
        let full = pose_from_mask((1 << KeypointIndex::COUNT) - 1);
        assert_eq!(drawable_segments(&full), 12);

        let mut gap = full;
        gap.keypoints[LeftHip as usize] = None;
        // shoulder-hip, hip-knee and hip-hip go; knee-ankle stays
        assert_eq!(drawable_segments(&gap), 9);
    }

    #[test]
    fn test_every_call_starts_from_a_clear_surface() {
        let renderer = SkeletonRenderer::skeleton_view();
        let mut surface = DrawRecorder::new(FrameDimensions::new(300, 400));
        let pose = pose_from_mask(u32::MAX);

        renderer.render(&mut surface, Scene { pose: Some(&pose), ..Default::default() });
        renderer.render(&mut surface, Scene::default());

        assert_eq!(
            surface.commands(),
            &[DrawCommand::Clear(Some(colors::SKELETON_VIEW_BACKGROUND))]
        );
    }

    #[test]
    fn test_anatomical_colors() {
        let renderer = SkeletonRenderer::overlay();
        let mut surface = DrawRecorder::new(FrameDimensions::new(640, 480));
        let pose = pose_from_mask((1 << Nose as u32) | (1 << LeftEye as u32) | (1 << RightKnee as u32));

        renderer.render(&mut surface, Scene { pose: Some(&pose), ..Default::default() });
        let colors: Vec<Rgb> = surface.circles().map(|(_, c)| c).collect();
        assert_eq!(colors, [colors::NOSE, colors::NEUTRAL, colors::KNEE]);
    }

    #[test]
    fn test_form_quality_mode_overrides_colors() {
        let renderer = SkeletonRenderer::overlay().with_color_mode(ColorMode::FormQuality);
        let mut surface = DrawRecorder::new(FrameDimensions::new(640, 480));
        let pose = pose_from_mask(u32::MAX);
        let good = analysis(true, 85.0, MetricValue::Absent);

        renderer.render(
            &mut surface,
            Scene {
                pose: Some(&pose),
                analysis: Some(&good),
                ..Default::default()
            },
        );
        assert!(surface.circles().all(|(_, c)| c == FormQuality::Good.color()));
        assert!(surface.commands().iter().all(|c| match c {
            DrawCommand::Line { color, .. } => *color == FormQuality::Good.color(),
            _ => true,
        }));
    }

    #[test]
    fn test_elbow_highlight_needs_angle_and_arm() {
        let renderer = SkeletonRenderer::overlay();
        let mut surface = DrawRecorder::new(FrameDimensions::new(640, 480));
        let pose = pose_from_mask(u32::MAX);

        let with_angle = analysis(true, 70.0, MetricValue::Angle(92.6));
        let stats = renderer.render(
            &mut surface,
            Scene {
                pose: Some(&pose),
                analysis: Some(&with_angle),
                ..Default::default()
            },
        );
        assert!(stats.elbow_highlighted);
        assert_eq!(surface.labels().collect::<Vec<_>>(), ["93°"]);
        assert!(surface.commands().iter().any(|c| matches!(
            c,
            DrawCommand::Ring { color, .. } if *color == FormQuality::Good.color()
        )));

        let absent = analysis(true, 70.0, MetricValue::Absent);
        let stats = renderer.render(
            &mut surface,
            Scene {
                pose: Some(&pose),
                analysis: Some(&absent),
                ..Default::default()
            },
        );
        assert!(!stats.elbow_highlighted);

        let mut no_wrist = pose;
        no_wrist.keypoints[RightWrist as usize] = None;
        let stats = renderer.render(
            &mut surface,
            Scene {
                pose: Some(&no_wrist),
                analysis: Some(&with_angle),
                ..Default::default()
            },
        );
        assert!(!stats.elbow_highlighted);
        assert_eq!(surface.labels().count(), 0);
    }

    #[test]
    fn test_bad_elbow_ring_is_red() {
        let renderer = SkeletonRenderer::overlay();
        let mut surface = DrawRecorder::new(FrameDimensions::new(640, 480));
        let pose = pose_from_mask(u32::MAX);
        let wide = analysis(true, 40.0, MetricValue::Angle(130.0));

        renderer.render(
            &mut surface,
            Scene {
                pose: Some(&pose),
                analysis: Some(&wide),
                ..Default::default()
            },
        );
        assert!(surface.commands().iter().any(|c| matches!(
            c,
            DrawCommand::Ring { color, .. } if *color == FormQuality::Bad.color()
        )));
    }

    #[test]
    fn test_far_keypoint_does_not_stall_a_raster_render() {
        let renderer = SkeletonRenderer::overlay();
        let mut canvas = RasterCanvas::new(FrameDimensions::new(640, 480));
        let mut pose = pose_from_mask(u32::MAX);
        pose.keypoints[RightShoulder as usize] = Some(Point::new(2.0e7, 100.0));
        pose.keypoints[LeftAnkle as usize] = Some(Point::new(5.0e9, -5.0e9));
        let with_angle = analysis(true, 85.0, MetricValue::Angle(95.0));

        let started = Instant::now();
        let stats = renderer.render(
            &mut canvas,
            Scene {
                pose: Some(&pose),
                analysis: Some(&with_angle),
                ..Default::default()
            },
        );

        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(stats.segments, drawable_segments(&pose));
        assert!(stats.elbow_highlighted);
        assert_eq!(canvas.labels().len(), 1);
    }
}
