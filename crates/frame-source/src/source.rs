//! Push-triggered capture task feeding the frame slot

use std::sync::Arc;

use chrono::Utc;
use screenpilot_core_types::FrameId;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    convert::canonicalize, debug::DebugImageSink, errors::CaptureError, models::Frame,
    slot::FrameSlot, surface::CaptureSurface,
};

/// Adapts a capture surface into canonical frames published to a slot.
#[derive(Clone)]
pub struct FrameSource {
    surface: Arc<dyn CaptureSurface>,
    slot: Arc<FrameSlot>,
    debug_sink: Option<Arc<dyn DebugImageSink>>,
}

impl FrameSource {
    pub fn new(surface: Arc<dyn CaptureSurface>, slot: Arc<FrameSlot>) -> Self {
        Self {
            surface,
            slot,
            debug_sink: None,
        }
    }

    pub fn with_debug_sink(mut self, sink: Arc<dyn DebugImageSink>) -> Self {
        self.debug_sink = Some(sink);
        self
    }

    pub fn slot(&self) -> &Arc<FrameSlot> {
        &self.slot
    }

    /// Acquire, convert and publish the surface's latest buffer.
    ///
    /// `Ok(None)` means the surface had nothing new to hand out.
    pub fn capture_once(&self) -> Result<Option<FrameId>, CaptureError> {
        let raw = match self.surface.acquire_latest()? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let frame = Arc::new(canonicalize(&raw, Utc::now())?);
        let id = frame.id().clone();

        if let Some(sink) = &self.debug_sink {
            persist_detached(Arc::clone(sink), Arc::clone(&frame));
        }

        if self.slot.publish(frame) {
            debug!(frame_id = %id, "published frame over unconsumed predecessor");
        }
        Ok(Some(id))
    }

    /// Wait for the surface's next buffer, then capture it.
    pub async fn capture_next(&self) -> Result<Option<FrameId>, CaptureError> {
        self.surface.wait_ready().await?;
        self.capture_once()
    }

    /// Run the capture loop until cancelled or the surface closes.
    ///
    /// Transient buffer errors are skipped; a closed surface ends the task
    /// with `SurfaceUnavailable` so the supervisor can report it.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<Result<(), CaptureError>> {
        tokio::spawn(async move {
            info!("frame source started");
            loop {
                let captured = tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("frame source cancelled");
                        return Ok(());
                    }
                    captured = self.capture_next() => captured,
                };

                if let Err(err) = captured {
                    if err.is_transient() {
                        debug!(error = %err, "skipping unreadable capture buffer");
                        continue;
                    }
                    warn!(error = %err, "frame source stopping");
                    return Err(err);
                }
            }
        })
    }
}

/// Persist a debug copy without holding up publication.
fn persist_detached(sink: Arc<dyn DebugImageSink>, frame: Arc<Frame>) {
    let job = move || {
        if let Err(err) = sink.persist(&frame) {
            warn!(error = %err, frame_id = %frame.id(), "debug image not saved");
        }
    };
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(job);
        }
        Err(_) => job(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PixelFormat, RawBuffer};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Hands out scripted acquisitions, then reports the surface closed.
    struct ScriptedSurface {
        script: Mutex<VecDeque<Result<Option<RawBuffer>, CaptureError>>>,
    }

    impl ScriptedSurface {
        fn new(script: Vec<Result<Option<RawBuffer>, CaptureError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
            })
        }
    }

    #[async_trait]
    impl CaptureSurface for ScriptedSurface {
        async fn wait_ready(&self) -> Result<(), CaptureError> {
            if self.script.lock().unwrap().is_empty() {
                Err(CaptureError::SurfaceUnavailable("script finished".into()))
            } else {
                Ok(())
            }
        }

        fn acquire_latest(&self) -> Result<Option<RawBuffer>, CaptureError> {
            self.script.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }
    }

    fn rgb(value: u8) -> RawBuffer {
        RawBuffer::packed(1, 1, PixelFormat::Rgb888, vec![value; 3])
    }

    struct FailingSink(AtomicUsize);

    impl DebugImageSink for FailingSink {
        fn persist(&self, _frame: &Frame) -> Result<PathBuf, CaptureError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(CaptureError::Persist("disk full".into()))
        }
    }

    #[tokio::test]
    async fn skips_transient_errors_and_ends_on_closed_surface() {
        let surface = ScriptedSurface::new(vec![
            Ok(Some(rgb(1))),
            Err(CaptureError::Transient("torn buffer".into())),
            Ok(None),
            Ok(Some(rgb(2))),
        ]);
        let slot = Arc::new(FrameSlot::new());
        let source = FrameSource::new(surface, Arc::clone(&slot));

        let result = source.spawn(CancellationToken::new()).await.unwrap();
        assert!(matches!(result, Err(CaptureError::SurfaceUnavailable(_))));

        let latest = slot.take().unwrap();
        assert_eq!(latest.pixels(), &[2, 2, 2]);
        assert_eq!(slot.stats().overwritten, 1);
    }

    #[tokio::test]
    async fn capture_next_reports_a_closed_surface() {
        let slot = Arc::new(FrameSlot::new());
        let source = FrameSource::new(
            ScriptedSurface::new(vec![Ok(Some(rgb(7)))]),
            Arc::clone(&slot),
        );

        assert!(source.capture_next().await.unwrap().is_some());
        assert!(matches!(
            source.capture_next().await,
            Err(CaptureError::SurfaceUnavailable(_))
        ));
        assert_eq!(slot.take().unwrap().pixels(), &[7, 7, 7]);
    }

    #[tokio::test]
    async fn failing_debug_sink_does_not_block_publication() {
        let surface = ScriptedSurface::new(vec![Ok(Some(rgb(5)))]);
        let sink = Arc::new(FailingSink(AtomicUsize::new(0)));
        let slot = Arc::new(FrameSlot::new());
        let source =
            FrameSource::new(surface, Arc::clone(&slot)).with_debug_sink(sink.clone());

        let id = source.capture_once().unwrap().unwrap();
        assert_eq!(slot.peek().unwrap().id(), &id);

        tokio::task::yield_now().await;
        for _ in 0..50 {
            if sink.0.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_the_task() {
        struct NeverReady;

        #[async_trait]
        impl CaptureSurface for NeverReady {
            async fn wait_ready(&self) -> Result<(), CaptureError> {
                std::future::pending().await
            }

            fn acquire_latest(&self) -> Result<Option<RawBuffer>, CaptureError> {
                Ok(None)
            }
        }

        let cancel = CancellationToken::new();
        let handle =
            FrameSource::new(Arc::new(NeverReady), Arc::new(FrameSlot::new())).spawn(cancel.clone());
        cancel.cancel();
        assert_eq!(handle.await.unwrap(), Ok(()));
    }
}
