use std::{path::PathBuf, sync::Arc};

use formcheck_core::{FrameSink, PaintedFrame};
use image::RgbaImage;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, warn};

type Snapshot = Option<(u64, Arc<RgbaImage>)>;

/// Hands the overlay to a writer task each time a newer analysis is drawn. Only the newest
/// pending overlay is kept, so a slow disk never holds up painting.
pub struct OverlayFileSink {
    written: Option<u64>,
    frames: watch::Sender<Snapshot>,
}

impl OverlayFileSink {
    /// The writer exits once the sink is dropped, after flushing the last overlay it was given.
    pub fn spawn(path: PathBuf) -> (Self, JoinHandle<()>) {
        let (frames, rx) = watch::channel(None);
        let writer = tokio::spawn(write_overlays(path, rx));
        (
            Self {
                written: None,
                frames,
            },
            writer,
        )
    }
}

impl FrameSink for OverlayFileSink {
    fn present(&mut self, frame: &PaintedFrame<'_>) {
        let Some(generation) = frame.generation else {
            return;
        };
        if self.written == Some(generation) {
            return;
        }
        self.written = Some(generation);
        self.frames
            .send_replace(Some((generation, Arc::new(frame.overlay.image().clone()))));
    }
}

async fn write_overlays(path: PathBuf, mut rx: watch::Receiver<Snapshot>) {
    let mut saved = None;
    loop {
        let closed = rx.changed().await.is_err();
        let pending = rx.borrow_and_update().clone();

        if let Some((generation, image)) = pending {
            if saved != Some(generation) {
                let target = path.clone();
                match tokio::task::spawn_blocking(move || image.save(&target)).await {
                    Ok(Ok(())) => debug!(generation, path = %path.display(), "overlay written"),
                    Ok(Err(e)) => warn!(path = %path.display(), error = %e, "overlay not written"),
                    Err(e) => warn!(error = %e, "overlay writer task failed"),
                }
                saved = Some(generation);
            }
        }

        if closed {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use formcheck_core::{FrameDimensions, render::{RasterCanvas, RenderStats}};

    use super::*;

    fn painted<'a>(canvas: &'a RasterCanvas, generation: Option<u64>) -> PaintedFrame<'a> {
        PaintedFrame {
            tick: 1,
            overlay: canvas,
            skeleton: canvas,
            overlay_stats: RenderStats::default(),
            generation,
        }
    }

    #[tokio::test]
    async fn test_last_overlay_is_written_after_the_sink_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.png");
        let canvas = RasterCanvas::new(FrameDimensions::new(8, 6));

        let (mut sink, writer) = OverlayFileSink::spawn(path.clone());
        sink.present(&painted(&canvas, None));
        sink.present(&painted(&canvas, Some(1)));
        sink.present(&painted(&canvas, Some(1)));
        drop(sink);
        writer.await.unwrap();

        let written = image::open(&path).unwrap();
        assert_eq!((written.width(), written.height()), (8, 6));
    }

    #[tokio::test]
    async fn test_nothing_is_written_without_an_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.png");
        let canvas = RasterCanvas::new(FrameDimensions::new(8, 6));

        let (mut sink, writer) = OverlayFileSink::spawn(path.clone());
        sink.present(&painted(&canvas, None));
        drop(sink);
        writer.await.unwrap();

        assert!(!path.exists());
    }
}
