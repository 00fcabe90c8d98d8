use std::{
    ops::{Deref, DerefMut},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use image::RgbaImage;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::{
    error::{FormCheckError, Result},
    types::FrameDimensions,
};

const SEQUENCE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// A camera-like device producing RGBA frames.
#[async_trait]
pub trait FrameSource: Send + 'static {
    /// Acquire the device. Failure here is fatal to starting a session.
    async fn open(&mut self) -> Result<FrameDimensions>;

    fn is_ready(&self) -> bool;

    fn dimensions(&self) -> FrameDimensions;

    /// Current frame. While paused this keeps returning the frozen frame.
    async fn grab(&mut self) -> Result<Arc<RgbaImage>>;

    fn pause(&mut self);

    fn resume(&mut self);

    /// Stop every track. Safe to call more than once.
    fn release(&mut self);
}

/// Owns an opened source and releases it on every exit path.
pub struct CaptureGuard<S: FrameSource> {
    source: S,
}

impl<S: FrameSource> CaptureGuard<S> {
    pub async fn open(mut source: S) -> Result<Self> {
        match source.open().await {
            Ok(dimensions) => {
                info!(
                    width = dimensions.width,
                    height = dimensions.height,
                    "capture opened"
                );
                Ok(Self { source })
            }
            Err(e) => {
                source.release();
                Err(e)
            }
        }
    }

    pub fn release(&mut self) {
        self.source.release();
    }
}

impl<S: FrameSource> Deref for CaptureGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.source
    }
}

impl<S: FrameSource> DerefMut for CaptureGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S: FrameSource> Drop for CaptureGuard<S> {
    fn drop(&mut self) {
        self.source.release();
    }
}

/// Replays a directory of still images as a looping camera.
pub struct ImageSequenceSource {
    dir: PathBuf,
    frame_interval: Duration,
    frames: Vec<Arc<RgbaImage>>,
    position: usize,
    last_advance: Option<Instant>,
    paused: bool,
    released: bool,
}

impl ImageSequenceSource {
    pub fn new(dir: impl Into<PathBuf>, frame_interval: Duration) -> Self {
        Self {
            dir: dir.into(),
            frame_interval,
            frames: Vec::new(),
            position: 0,
            last_advance: None,
            paused: false,
            released: false,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn advance(&mut self) {
        if self.paused || self.frames.len() < 2 || self.frame_interval.is_zero() {
            return;
        }
        let now = Instant::now();
        let last = *self.last_advance.get_or_insert(now);
        let steps = (now.duration_since(last).as_nanos() / self.frame_interval.as_nanos()) as usize;
        if steps > 0 {
            self.position = (self.position + steps) % self.frames.len();
            self.last_advance = Some(last + self.frame_interval * steps as u32);
        }
    }
}

async fn list_sequence(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| device(format!("{}: {}", dir.display(), e)))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let supported = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| SEQUENCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if supported {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn device(reason: String) -> FormCheckError {
    FormCheckError::Device { reason }
}

#[async_trait]
impl FrameSource for ImageSequenceSource {
    async fn open(&mut self) -> Result<FrameDimensions> {
        let paths = list_sequence(&self.dir).await?;
        if paths.is_empty() {
            return Err(device(format!("no frames in {}", self.dir.display())));
        }

        let frames = tokio::task::spawn_blocking(move || {
            paths
                .iter()
                .map(|path| {
                    image::open(path)
                        .map(|img| Arc::new(img.to_rgba8()))
                        .map_err(|e| device(format!("{}: {}", path.display(), e)))
                })
                .collect::<Result<Vec<_>>>()
        })
        .await
        .map_err(|e| device(e.to_string()))??;

        debug!(frames = frames.len(), dir = %self.dir.display(), "sequence loaded");
        self.frames = frames;
        self.position = 0;
        self.last_advance = None;
        self.paused = false;
        self.released = false;
        Ok(self.dimensions())
    }

    fn is_ready(&self) -> bool {
        !self.released && !self.frames.is_empty()
    }

    fn dimensions(&self) -> FrameDimensions {
        self.frames
            .get(self.position)
            .map(|f| FrameDimensions::new(f.width(), f.height()))
            .unwrap_or_default()
    }

    async fn grab(&mut self) -> Result<Arc<RgbaImage>> {
        if !self.is_ready() {
            return Err(FormCheckError::NotReady);
        }
        self.advance();
        self.frames
            .get(self.position)
            .cloned()
            .ok_or(FormCheckError::NotReady)
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.last_advance = Some(Instant::now());
        }
    }

    fn release(&mut self) {
        if !self.released {
            info!(dir = %self.dir.display(), "capture released");
        }
        self.released = true;
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use image::Rgba;
    use tempfile::TempDir;

    use super::*;

    fn write_sequence(dir: &Path, colors: &[[u8; 4]]) {
        for (i, color) in colors.iter().enumerate() {
            RgbaImage::from_pixel(4, 3, Rgba(*color))
                .save(dir.join(format!("frame_{i:02}.png")))
                .unwrap();
        }
    }

    fn frames_dir() -> TempDir {
        tempfile::Builder::new().prefix("formcheck-").tempdir().unwrap()
    }

    #[tokio::test]
    async fn test_empty_directory_is_device_error() {
        let dir = frames_dir();
        let err = CaptureGuard::open(ImageSequenceSource::new(dir.path(), Duration::from_millis(100)))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, FormCheckError::Device { .. }));
    }

    #[tokio::test]
    async fn test_missing_directory_is_device_error() {
        let mut source = ImageSequenceSource::new("/nonexistent/formcheck", Duration::ZERO);
        assert!(matches!(
            source.open().await,
            Err(FormCheckError::Device { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequence_loops_and_freezes_on_pause() {
        let dir = frames_dir();
        write_sequence(dir.path(), &[[255, 0, 0, 255], [0, 255, 0, 255]]);

        let mut source = ImageSequenceSource::new(dir.path(), Duration::from_millis(100));
        assert_eq!(source.open().await.unwrap(), FrameDimensions::new(4, 3));
        assert_eq!(source.frame_count(), 2);

        let first = source.grab().await.unwrap();
        tokio::time::advance(Duration::from_millis(100)).await;
        let second = source.grab().await.unwrap();
        assert_ne!(first.get_pixel(0, 0), second.get_pixel(0, 0));

        source.pause();
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(source.grab().await.unwrap().get_pixel(0, 0), second.get_pixel(0, 0));

        source.resume();
        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(source.grab().await.unwrap().get_pixel(0, 0), first.get_pixel(0, 0));
    }

    #[tokio::test]
    async fn test_guard_release_is_idempotent() {
        let dir = frames_dir();
        write_sequence(dir.path(), &[[1, 2, 3, 255]]);

        let mut guard = CaptureGuard::open(ImageSequenceSource::new(dir.path(), Duration::ZERO))
            .await
            .unwrap();
        assert!(guard.is_ready());
        guard.release();
        guard.release();
        assert!(guard.is_released());
        assert!(matches!(guard.grab().await, Err(FormCheckError::NotReady)));

        let path = dir.path().to_path_buf();
        drop(dir);
        assert!(!path.exists());
    }
}
