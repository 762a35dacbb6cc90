//! Agent wiring: capture task, inference engine and input surface.

use std::sync::Arc;
use std::time::Duration;

use action_primitives::{DefaultActionExecutor, InputSurface};
use frame_source::{
    CaptureError, CaptureSurface, DebugImageSink, FrameSlot, FrameSource, PngDirectorySink,
};
use inference_engine::{
    DenseRuntime, EngineOptions, FileModelProvider, InferenceEngine, ModelProvider, ModelRuntime,
    StatusEvent,
};
use parking_lot::Mutex;
use screenpilot_event_bus::EventBus;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::errors::AgentError;

struct CaptureSession {
    cancel: CancellationToken,
    supervisor: JoinHandle<()>,
}

/// One perceive-decide-act loop bound to a capture surface and an input
/// surface.
pub struct Agent {
    config: AgentConfig,
    capture: Arc<dyn CaptureSurface>,
    slot: Arc<FrameSlot>,
    engine: InferenceEngine,
    debug_sink: Option<Arc<dyn DebugImageSink>>,
    session: Mutex<Option<CaptureSession>>,
    control: tokio::sync::Mutex<()>,
}

impl Agent {
    /// Agent using the file-backed model provider and the dense runtime.
    pub fn new(
        config: AgentConfig,
        capture: Arc<dyn CaptureSurface>,
        input: Arc<dyn InputSurface>,
    ) -> Result<Self, AgentError> {
        let provider: Arc<dyn ModelProvider> = Arc::new(model_provider(&config));
        let runtime: Arc<dyn ModelRuntime> =
            Arc::new(DenseRuntime::new(config.tensor.mean, config.tensor.std));
        Self::with_runtime(config, capture, input, provider, runtime)
    }

    pub fn with_runtime(
        config: AgentConfig,
        capture: Arc<dyn CaptureSurface>,
        input: Arc<dyn InputSurface>,
        provider: Arc<dyn ModelProvider>,
        runtime: Arc<dyn ModelRuntime>,
    ) -> Result<Self, AgentError> {
        config.validate()?;

        let slot = Arc::new(FrameSlot::new());
        let executor = Arc::new(
            DefaultActionExecutor::new(input, config.screen.size())
                .with_click_duration(Duration::from_millis(config.screen.click_duration_ms)),
        );
        let engine = InferenceEngine::new(
            provider,
            runtime,
            slot.clone(),
            executor,
            EngineOptions {
                decoder: config.decoder.clone(),
                status_capacity: config.status_capacity,
            },
        );
        let debug_sink = config
            .capture
            .debug_dir
            .as_ref()
            .map(|dir| Arc::new(PngDirectorySink::new(dir)) as Arc<dyn DebugImageSink>);

        Ok(Self {
            config,
            capture,
            slot,
            engine,
            debug_sink,
            session: Mutex::new(None),
            control: tokio::sync::Mutex::new(()),
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn engine(&self) -> &InferenceEngine {
        &self.engine
    }

    pub fn slot(&self) -> &Arc<FrameSlot> {
        &self.slot
    }

    /// Load the model, start capturing and start ticking.
    ///
    /// A load failure or a surface that is already closed aborts the
    /// attempt before the loop ticks; the agent stays restartable.
    pub async fn start(&self) -> Result<(), AgentError> {
        let _control = self.control.lock().await;
        {
            let mut session = self.session.lock();
            let finished = session.as_ref().map(|s| s.supervisor.is_finished());
            match finished {
                Some(false) => return Err(AgentError::AlreadyRunning),
                Some(true) => *session = None,
                None => {}
            }
        }

        let model_id = self.engine.load().await?;
        info!(model_id = %model_id, "Model ready");

        let mut source = FrameSource::new(self.capture.clone(), self.slot.clone());
        if let Some(sink) = &self.debug_sink {
            source = source.with_debug_sink(sink.clone());
        }
        self.first_capture(&source).await?;

        let cancel = CancellationToken::new();
        let capture_task = source.spawn(cancel.child_token());
        if let Err(err) = self.engine.start(self.config.period()).await {
            cancel.cancel();
            if let Err(join) = capture_task.await {
                warn!(error = %join, "Capture task ended abnormally");
            }
            return Err(err.into());
        }

        // The supervisor's stop must come after the engine started.
        let supervisor = spawn_supervisor(capture_task, self.engine.clone());
        *self.session.lock() = Some(CaptureSession { cancel, supervisor });
        Ok(())
    }

    /// Wait briefly for the first buffer so a closed surface fails the
    /// start instead of leaving the loop ticking without frames.
    async fn first_capture(&self, source: &FrameSource) -> Result<(), AgentError> {
        let wait = Duration::from_millis(self.config.capture.startup_timeout_ms);
        match tokio::time::timeout(wait, source.capture_next()).await {
            Ok(Ok(Some(frame_id))) => debug!(frame_id = %frame_id, "First frame captured"),
            Ok(Ok(None)) => debug!("Capture surface ready without a new buffer"),
            Ok(Err(err)) if err.is_transient() => {
                debug!(error = %err, "First capture buffer unreadable")
            }
            Ok(Err(err)) => {
                warn!(error = %err, "Capture surface unavailable at start");
                report_capture_error(&self.engine, format!("capture surface unavailable: {err}"))
                    .await;
                return Err(err.into());
            }
            Err(_) => info!(
                timeout_ms = self.config.capture.startup_timeout_ms,
                "No frame yet, starting the loop anyway"
            ),
        }
        Ok(())
    }

    /// Stop ticking and capturing. The model stays loaded.
    pub async fn stop(&self) {
        let _control = self.control.lock().await;
        let session = self.session.lock().take();
        if let Some(session) = session {
            session.cancel.cancel();
            if let Err(err) = session.supervisor.await {
                warn!(error = %err, "Capture supervisor ended abnormally");
            }
        }
        self.engine.stop().await;
    }

    /// Stop everything and release the model handle.
    pub async fn shutdown(&self) {
        self.stop().await;
        self.engine.shutdown().await;
    }
}

pub fn model_provider(config: &AgentConfig) -> FileModelProvider {
    let mut provider = FileModelProvider::new(&config.model.dir, &config.model.file_name)
        .with_min_size(config.model.min_size_bytes);
    if let Some(digest) = &config.model.sha256 {
        provider = provider.with_expected_sha256(digest.clone());
    }
    provider
}

/// Watch the capture task; a closed surface is a startup-level failure:
/// report it and stop the loop so a later start can retry.
fn spawn_supervisor(
    capture_task: JoinHandle<Result<(), CaptureError>>,
    engine: InferenceEngine,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match capture_task.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(error = %err, "Capture surface lost, stopping loop");
                report_capture_error(&engine, format!("capture surface unavailable: {err}")).await;
                engine.stop().await;
            }
            Err(err) => {
                warn!(error = %err, "Capture task ended abnormally");
                report_capture_error(&engine, format!("capture task failed: {err}")).await;
                engine.stop().await;
            }
        }
    })
}

async fn report_capture_error(engine: &InferenceEngine, message: String) {
    if let Err(err) = engine.status_bus().publish(StatusEvent::error(message)).await {
        warn!(error = %err, "Capture failure reported with no status subscribers");
    }
}
