//! The periodic inference loop and its lifecycle.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use action_primitives::{Action, ActionDecoder, ActionExecutor, DecoderConfig, ExecutionOutcome};
use chrono::{DateTime, Utc};
use frame_source::FrameSlot;
use parking_lot::Mutex;
use screenpilot_core_types::{FrameId, ModelId};
use screenpilot_event_bus::{EventBus, InMemoryBus};
use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{EngineError, InferenceError, LoadError, TransformError};
use crate::metrics::{EngineMetrics, EngineMetricsSnapshot};
use crate::provider::ModelProvider;
use crate::runtime::{LoadedModel, ModelRuntime};
use crate::state::{LoopState, SuspendReason};
use crate::status::StatusEvent;
use crate::tensor::{to_tensor, TensorSpec};

/// Reference tick period.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub decoder: DecoderConfig,
    pub status_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            decoder: DecoderConfig::default(),
            status_capacity: 64,
        }
    }
}

/// Why a tick did no work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InFlight,
    NoModel,
    NoFrame,
    Closed,
    /// A scheduled tick that came due after its ticker was stopped.
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickFailure {
    Transform(TransformError),
    Inference(InferenceError),
}

#[derive(Debug)]
pub enum TickOutcome {
    Skipped(SkipReason),
    Failed(TickFailure),
    Completed {
        frame_id: FrameId,
        action: Action,
        outcome: ExecutionOutcome,
    },
}

impl TickOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TickOutcome::Completed { .. })
    }
}

/// Public description of the loaded model.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub id: ModelId,
    pub path: PathBuf,
    pub loaded_at: DateTime<Utc>,
    pub input_spec: TensorSpec,
    pub output_len: usize,
}

struct ModelHandle {
    id: ModelId,
    path: PathBuf,
    loaded_at: DateTime<Utc>,
    model: Arc<dyn LoadedModel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickSource {
    Scheduled,
    Manual,
}

struct Ticker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Cleared on drop so the next tick may start.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
    idle: &'a Notify,
}

impl<'a> InFlightGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool, idle: &'a Notify) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag, idle })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
        self.idle.notify_waiters();
    }
}

struct EngineInner {
    provider: Arc<dyn ModelProvider>,
    runtime: Arc<dyn ModelRuntime>,
    slot: Arc<FrameSlot>,
    decoder: ActionDecoder,
    executor: Arc<dyn ActionExecutor>,
    model: Mutex<Option<Arc<ModelHandle>>>,
    in_flight: AtomicBool,
    idle: Notify,
    closed: AtomicBool,
    /// Cleared before a stop waits for the in-flight tick.
    scheduling: AtomicBool,
    ticker: Mutex<Option<Ticker>>,
    control: tokio::sync::Mutex<()>,
    state_tx: watch::Sender<LoopState>,
    status: Arc<InMemoryBus<StatusEvent>>,
    metrics: EngineMetrics,
}

/// Owns the model handle and drives transform, forward pass, decode and
/// dispatch once per period.
///
/// At most one tick runs at a time; a tick that comes due while another is
/// executing is skipped, never queued. Cloning yields another handle to the
/// same engine.
#[derive(Clone)]
pub struct InferenceEngine {
    inner: Arc<EngineInner>,
}

impl InferenceEngine {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        runtime: Arc<dyn ModelRuntime>,
        slot: Arc<FrameSlot>,
        executor: Arc<dyn ActionExecutor>,
        options: EngineOptions,
    ) -> Self {
        let (state_tx, _) = watch::channel(LoopState::Idle);
        Self {
            inner: Arc::new(EngineInner {
                provider,
                runtime,
                slot,
                decoder: ActionDecoder::new(options.decoder),
                executor,
                model: Mutex::new(None),
                in_flight: AtomicBool::new(false),
                idle: Notify::new(),
                closed: AtomicBool::new(false),
                scheduling: AtomicBool::new(false),
                ticker: Mutex::new(None),
                control: tokio::sync::Mutex::new(()),
                state_tx,
                status: InMemoryBus::new(options.status_capacity),
                metrics: EngineMetrics::default(),
            }),
        }
    }

    /// Construct the model handle from the provider's artifact.
    ///
    /// A repeat call while a handle exists returns the existing id. Failure
    /// leaves the engine suspended and reports one error status per
    /// distinct failure; retrying is always allowed.
    pub async fn load(&self) -> Result<ModelId, EngineError> {
        let inner = &self.inner;
        let _control = inner.control.lock().await;
        if inner.closed.load(Ordering::SeqCst) {
            return Err(EngineError::ShutDown);
        }

        let existing = inner.model.lock().as_ref().map(|handle| handle.id.clone());
        if let Some(id) = existing {
            debug!(model_id = %id, "Model already loaded");
            return Ok(id);
        }

        let provider = inner.provider.clone();
        let runtime = inner.runtime.clone();
        let load_artifact = move || -> Result<(PathBuf, Box<dyn LoadedModel>), LoadError> {
            if !provider.is_ready() {
                return Err(LoadError::Unavailable(
                    "model provider reports the artifact is not ready".to_string(),
                ));
            }
            let path = provider.resolve_path();
            let model = runtime.load(&path)?;
            Ok((path, model))
        };
        let attempt = tokio::task::spawn_blocking(load_artifact)
            .await
            .unwrap_or_else(|err| {
                Err(LoadError::RuntimeInitFailure(format!(
                    "load task failed: {err}"
                )))
            });

        match attempt {
            Ok((path, model)) => {
                let handle = Arc::new(ModelHandle {
                    id: ModelId::new(),
                    path,
                    loaded_at: Utc::now(),
                    model: Arc::from(model),
                });
                info!(
                    model_id = %handle.id,
                    path = %handle.path.display(),
                    runtime = inner.runtime.name(),
                    outputs = handle.model.output_len(),
                    "Model loaded"
                );
                let id = handle.id.clone();
                *inner.model.lock() = Some(handle);

                let ticking = inner.ticker.lock().is_some();
                inner.set_state(if ticking {
                    LoopState::Running
                } else {
                    LoopState::Suspended(SuspendReason::AwaitingStart)
                });
                Ok(id)
            }
            Err(err) => {
                let reason = match &err {
                    LoadError::Unavailable(msg) => SuspendReason::ModelUnavailable(msg.clone()),
                    other => SuspendReason::LoadFailed(other.to_string()),
                };
                let next = LoopState::Suspended(reason);
                let repeated = *inner.state_tx.borrow() == next;
                warn!(error = %err, "Model load failed");
                inner.set_state(next);
                if !repeated {
                    inner.report(StatusEvent::error(format!("model load failed: {err}")));
                }
                Err(EngineError::Load(err))
            }
        }
    }

    /// Begin ticking every `period`. Requires a loaded model; a second call
    /// while ticking is a no-op.
    pub async fn start(&self, period: Duration) -> Result<(), EngineError> {
        let inner = &self.inner;
        let _control = inner.control.lock().await;
        if inner.closed.load(Ordering::SeqCst) {
            return Err(EngineError::ShutDown);
        }
        if period.is_zero() {
            return Err(EngineError::InvalidPeriod);
        }
        if inner.ticker.lock().is_some() {
            debug!("Inference loop already started");
            return Ok(());
        }
        if inner.model.lock().is_none() {
            warn!(state = %inner.state(), "Start requested without a loaded model");
            return Err(EngineError::NotLoaded);
        }

        let cancel = CancellationToken::new();
        inner.scheduling.store(true, Ordering::SeqCst);
        let handle = spawn_ticker(Arc::downgrade(&self.inner), period, cancel.clone());
        *inner.ticker.lock() = Some(Ticker { cancel, handle });

        info!(period_ms = period.as_millis() as u64, "Inference loop started");
        inner.set_state(LoopState::Running);
        inner.report(StatusEvent::started(format!(
            "inference loop started, period {} ms",
            period.as_millis()
        )));
        Ok(())
    }

    /// Stop ticking once the current tick, if any, has finished. The model
    /// stays loaded.
    pub async fn stop(&self) {
        let inner = &self.inner;
        let _control = inner.control.lock().await;
        if inner.stop_ticker().await {
            info!("Inference loop stopped");
            inner.set_state(LoopState::Idle);
            inner.report(StatusEvent::stopped("inference loop stopped"));
        }
    }

    /// Stop, wait for the in-flight tick, release the model handle.
    /// The engine cannot be restarted afterwards.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        let _control = inner.control.lock().await;
        if inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        inner.stop_ticker().await;
        inner.wait_idle().await;

        let released = inner.model.lock().take();
        if let Some(handle) = released {
            info!(model_id = %handle.id, "Model handle released");
        }
        inner.set_state(LoopState::Stopped);
        inner.report(StatusEvent::stopped("engine shut down"));
    }

    /// Run one guarded tick now, independent of the ticker.
    pub async fn tick_once(&self) -> TickOutcome {
        self.inner.tick(TickSource::Manual).await
    }

    pub fn state(&self) -> LoopState {
        self.inner.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LoopState> {
        self.inner.state_tx.subscribe()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusEvent> {
        self.inner.status.subscribe()
    }

    pub fn status_bus(&self) -> Arc<InMemoryBus<StatusEvent>> {
        self.inner.status.clone()
    }

    pub fn metrics(&self) -> EngineMetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    pub fn model_info(&self) -> Option<ModelInfo> {
        self.inner.model.lock().as_ref().map(|handle| ModelInfo {
            id: handle.id.clone(),
            path: handle.path.clone(),
            loaded_at: handle.loaded_at,
            input_spec: handle.model.input_spec(),
            output_len: handle.model.output_len(),
        })
    }

    pub fn is_ticking(&self) -> bool {
        self.inner.ticker.lock().is_some()
    }
}

impl EngineInner {
    fn state(&self) -> LoopState {
        self.state_tx.borrow().clone()
    }

    fn set_state(&self, next: LoopState) {
        let previous = self.state_tx.send_replace(next.clone());
        if previous != next {
            info!(from = %previous, to = %next, "Loop state changed");
        }
    }

    fn report(&self, event: StatusEvent) {
        let reached = self.status.publish_lossy(event);
        debug!(reached, "Status published");
    }

    /// Returns whether a ticker was running.
    async fn stop_ticker(&self) -> bool {
        let ticker = self.ticker.lock().take();
        let Some(ticker) = ticker else {
            return false;
        };
        self.scheduling.store(false, Ordering::SeqCst);
        ticker.cancel.cancel();
        if let Err(err) = ticker.handle.await {
            warn!(error = %err, "Ticker task ended abnormally");
        }
        self.wait_idle().await;
        true
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if !self.in_flight.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    async fn tick(&self, source: TickSource) -> TickOutcome {
        let Some(_guard) = InFlightGuard::try_acquire(&self.in_flight, &self.idle) else {
            self.metrics.record_skipped_in_flight();
            debug!("Previous tick still in flight, skipping");
            return TickOutcome::Skipped(SkipReason::InFlight);
        };
        if self.closed.load(Ordering::SeqCst) {
            return TickOutcome::Skipped(SkipReason::Closed);
        }
        // Pairs with the store in stop_ticker: either this sees the stop,
        // or the stop sees this guard and waits for it.
        if source == TickSource::Scheduled && !self.scheduling.load(Ordering::SeqCst) {
            debug!("Ticker stopped, dropping scheduled tick");
            return TickOutcome::Skipped(SkipReason::Stopped);
        }

        let handle = self.model.lock().clone();
        let Some(handle) = handle else {
            self.metrics.record_skipped_no_model();
            return TickOutcome::Skipped(SkipReason::NoModel);
        };
        let Some(frame) = self.slot.take() else {
            self.metrics.record_skipped_no_frame();
            return TickOutcome::Skipped(SkipReason::NoFrame);
        };

        self.metrics.record_started();
        let started = Instant::now();
        let frame_id = frame.id().clone();

        let model = handle.model.clone();
        let pass = tokio::task::spawn_blocking(move || -> Result<Vec<f32>, TickFailure> {
            let tensor = to_tensor(&frame, &model.input_spec()).map_err(TickFailure::Transform)?;
            model.forward(&tensor).map_err(TickFailure::Inference)
        })
        .await
        .unwrap_or_else(|err| {
            Err(TickFailure::Inference(InferenceError::Runtime(format!(
                "forward pass task failed: {err}"
            ))))
        });

        let scores = match pass {
            Ok(scores) => scores,
            Err(failure) => {
                self.record_failure(&handle, &frame_id, &failure);
                return TickOutcome::Failed(failure);
            }
        };

        let action = self.decoder.decode(&scores);
        let outcome = self.executor.execute(&action).await;
        self.metrics.record_action(outcome.ok);
        self.metrics.record_completed();

        debug!(
            frame_id = %frame_id,
            action = %action.kind(),
            confidence = action.confidence(),
            ok = outcome.ok,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Tick completed"
        );

        TickOutcome::Completed {
            frame_id,
            action,
            outcome,
        }
    }

    fn record_failure(&self, handle: &ModelHandle, frame_id: &FrameId, failure: &TickFailure) {
        match failure {
            TickFailure::Transform(err) => {
                self.metrics.record_transform_failure();
                warn!(frame_id = %frame_id, error = %err, "Frame transform failed, skipping tick");
            }
            TickFailure::Inference(InferenceError::Invalidated(reason)) => {
                self.metrics.record_inference_failure();
                {
                    let mut current = self.model.lock();
                    if current.as_ref().is_some_and(|h| h.id == handle.id) {
                        *current = None;
                    }
                }
                warn!(model_id = %handle.id, reason = %reason, "Model handle invalidated");
                self.set_state(LoopState::Suspended(SuspendReason::HandleInvalidated(
                    reason.clone(),
                )));
                self.report(StatusEvent::error(format!(
                    "model handle invalidated: {reason}"
                )));
            }
            TickFailure::Inference(err) => {
                self.metrics.record_inference_failure();
                warn!(frame_id = %frame_id, error = %err, "Forward pass failed, skipping tick");
            }
        }
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.get_mut().take() {
            ticker.cancel.cancel();
        }
    }
}

fn spawn_ticker(
    engine: Weak<EngineInner>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let Some(inner) = engine.upgrade() else {
                        break;
                    };
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        if cancel.is_cancelled() {
                            return;
                        }
                        inner.tick(TickSource::Scheduled).await;
                    });
                }
            }
        }
        debug!("Ticker exited");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusKind;
    use action_primitives::{ActionKind, DefaultActionExecutor, RecordingInputSurface};
    use frame_source::Frame;
    use screenpilot_core_types::ScreenSize;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone)]
    struct FakeModel {
        spec: TensorSpec,
        scores: Vec<f32>,
        delay: Duration,
        invalidate: bool,
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
    }

    impl FakeModel {
        fn new(scores: Vec<f32>) -> Self {
            Self {
                spec: TensorSpec {
                    side: 4,
                    ..TensorSpec::default()
                },
                scores,
                delay: Duration::ZERO,
                invalidate: false,
                active: Arc::new(AtomicUsize::new(0)),
                max_active: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl LoadedModel for FakeModel {
        fn input_spec(&self) -> TensorSpec {
            self.spec
        }

        fn output_len(&self) -> usize {
            self.scores.len()
        }

        fn forward(&self, _input: &crate::InputTensor) -> Result<Vec<f32>, InferenceError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.active.fetch_sub(1, Ordering::SeqCst);
            if self.invalidate {
                return Err(InferenceError::Invalidated("device lost".into()));
            }
            Ok(self.scores.clone())
        }
    }

    struct FakeRuntime {
        model: FakeModel,
        loads: AtomicUsize,
    }

    impl ModelRuntime for FakeRuntime {
        fn name(&self) -> &str {
            "fake"
        }

        fn load(&self, _path: &Path) -> Result<Box<dyn LoadedModel>, LoadError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(self.model.clone()))
        }
    }

    struct FakeProvider {
        ready: AtomicBool,
    }

    impl ModelProvider for FakeProvider {
        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        fn resolve_path(&self) -> PathBuf {
            PathBuf::from("/models/fake.spdn")
        }
    }

    struct Harness {
        engine: InferenceEngine,
        slot: Arc<FrameSlot>,
        provider: Arc<FakeProvider>,
        runtime: Arc<FakeRuntime>,
        surface: Arc<RecordingInputSurface>,
    }

    fn harness(model: FakeModel, ready: bool) -> Harness {
        let slot = Arc::new(FrameSlot::new());
        let provider = Arc::new(FakeProvider {
            ready: AtomicBool::new(ready),
        });
        let runtime = Arc::new(FakeRuntime {
            model,
            loads: AtomicUsize::new(0),
        });
        let surface = Arc::new(RecordingInputSurface::new());
        let executor = Arc::new(DefaultActionExecutor::new(
            surface.clone(),
            ScreenSize::new(1080, 1920),
        ));
        let engine = InferenceEngine::new(
            provider.clone(),
            runtime.clone(),
            slot.clone(),
            executor,
            EngineOptions::default(),
        );
        Harness {
            engine,
            slot,
            provider,
            runtime,
            surface,
        }
    }

    fn frame() -> Arc<Frame> {
        Arc::new(Frame::from_rgb(8, 8, vec![100; 8 * 8 * 3], Utc::now()).unwrap())
    }

    fn drain(rx: &mut broadcast::Receiver<StatusEvent>) -> Vec<StatusEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn unavailable_model_suspends_and_reports_once() {
        let h = harness(FakeModel::new(vec![1.0]), false);
        let mut status = h.engine.subscribe_status();

        let err = h.engine.load().await.unwrap_err();
        assert!(matches!(err, EngineError::Load(LoadError::Unavailable(_))));
        assert!(matches!(
            h.engine.state(),
            LoopState::Suspended(SuspendReason::ModelUnavailable(_))
        ));

        assert_eq!(
            h.engine.start(Duration::from_millis(5)).await,
            Err(EngineError::NotLoaded)
        );
        h.slot.publish(frame());
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(!h.engine.is_ticking());
        assert_eq!(h.engine.metrics().ticks_started, 0);
        assert_eq!(h.runtime.loads.load(Ordering::SeqCst), 0);
        let events = drain(&mut status);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, StatusKind::Error);
    }

    #[tokio::test]
    async fn retry_after_unavailable_succeeds() {
        let h = harness(FakeModel::new(vec![1.0]), false);
        assert!(h.engine.load().await.is_err());
        h.provider.ready.store(true, Ordering::SeqCst);
        h.engine.load().await.unwrap();
        assert_eq!(
            h.engine.state(),
            LoopState::Suspended(SuspendReason::AwaitingStart)
        );
    }

    #[tokio::test]
    async fn load_is_idempotent() {
        let h = harness(FakeModel::new(vec![1.0]), true);
        let first = h.engine.load().await.unwrap();
        let second = h.engine.load().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(h.runtime.loads.load(Ordering::SeqCst), 1);
        assert_eq!(h.engine.model_info().unwrap().output_len, 1);
    }

    #[tokio::test]
    async fn tick_consumes_latest_frame_only() {
        let h = harness(FakeModel::new(vec![0.9, 0.1, 0.05, 0.0]), true);
        h.engine.load().await.unwrap();

        let older = frame();
        let newer = frame();
        h.slot.publish(older.clone());
        h.slot.publish(newer.clone());

        match h.engine.tick_once().await {
            TickOutcome::Completed {
                frame_id,
                action,
                outcome,
            } => {
                assert_eq!(&frame_id, newer.id());
                assert_ne!(&frame_id, older.id());
                assert_eq!(action.kind(), ActionKind::Click);
                assert_eq!(action.confidence(), 0.9);
                assert!(outcome.ok);
            }
            other => panic!("unexpected tick outcome: {other:?}"),
        }
        assert!(matches!(
            h.engine.tick_once().await,
            TickOutcome::Skipped(SkipReason::NoFrame)
        ));
        assert_eq!(h.surface.strokes().len(), 1);
    }

    #[tokio::test]
    async fn overlapping_tick_is_skipped() {
        let mut model = FakeModel::new(vec![0.0, 0.0, 0.0, 1.0]);
        model.delay = Duration::from_millis(150);
        let max_active = model.max_active.clone();
        let h = harness(model, true);
        h.engine.load().await.unwrap();
        h.slot.publish(frame());

        let engine = h.engine.clone();
        let first = tokio::spawn(async move { engine.tick_once().await });
        tokio::time::sleep(Duration::from_millis(40)).await;

        h.slot.publish(frame());
        assert!(matches!(
            h.engine.tick_once().await,
            TickOutcome::Skipped(SkipReason::InFlight)
        ));
        assert!(first.await.unwrap().is_completed());

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        let metrics = h.engine.metrics();
        assert_eq!(metrics.skipped_in_flight, 1);
        assert_eq!(metrics.ticks_completed, 1);
        // the skipped tick did not consume the second frame
        assert!(!h.slot.is_empty());
    }

    #[tokio::test]
    async fn periodic_loop_never_overlaps_and_stops_to_idle() {
        let mut model = FakeModel::new(vec![0.1, 0.7, 0.2]);
        model.delay = Duration::from_millis(15);
        let max_active = model.max_active.clone();
        let h = harness(model, true);
        let mut status = h.engine.subscribe_status();
        h.engine.load().await.unwrap();
        h.engine.start(Duration::from_millis(5)).await.unwrap();
        assert_eq!(h.engine.state(), LoopState::Running);

        for _ in 0..20 {
            h.slot.publish(frame());
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        h.engine.stop().await;

        assert_eq!(h.engine.state(), LoopState::Idle);
        assert!(!h.engine.is_ticking());
        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert!(h.engine.metrics().ticks_completed > 0);
        assert!(h.engine.model_info().is_some());

        let kinds: Vec<StatusKind> = drain(&mut status).into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![StatusKind::Started, StatusKind::Stopped]);
    }

    #[tokio::test]
    async fn scheduled_tick_due_after_stop_does_no_work() {
        let h = harness(FakeModel::new(vec![0.2, 0.9]), true);
        h.engine.load().await.unwrap();
        h.engine.start(Duration::from_secs(3600)).await.unwrap();
        h.engine.stop().await;
        let started = h.engine.metrics().ticks_started;

        h.slot.publish(frame());
        assert!(matches!(
            h.engine.inner.tick(TickSource::Scheduled).await,
            TickOutcome::Skipped(SkipReason::Stopped)
        ));
        assert_eq!(h.engine.metrics().ticks_started, started);
        assert!(!h.slot.is_empty());

        // manual ticks are not tied to the ticker
        assert!(h.engine.tick_once().await.is_completed());
    }

    #[tokio::test]
    async fn invalidated_handle_suspends_until_reload() {
        let mut model = FakeModel::new(vec![1.0]);
        model.invalidate = true;
        let h = harness(model, true);
        let mut status = h.engine.subscribe_status();
        let first = h.engine.load().await.unwrap();
        h.slot.publish(frame());

        assert!(matches!(
            h.engine.tick_once().await,
            TickOutcome::Failed(TickFailure::Inference(InferenceError::Invalidated(_)))
        ));
        assert!(matches!(
            h.engine.state(),
            LoopState::Suspended(SuspendReason::HandleInvalidated(_))
        ));
        assert!(h.engine.model_info().is_none());

        h.slot.publish(frame());
        assert!(matches!(
            h.engine.tick_once().await,
            TickOutcome::Skipped(SkipReason::NoModel)
        ));

        let second = h.engine.load().await.unwrap();
        assert_ne!(first, second);
        let events = drain(&mut status);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, StatusKind::Error);
    }

    #[tokio::test]
    async fn transform_failure_skips_tick_without_state_change() {
        let mut model = FakeModel::new(vec![1.0]);
        model.spec.std = 0.0;
        let h = harness(model, true);
        h.engine.load().await.unwrap();
        h.slot.publish(frame());

        assert!(matches!(
            h.engine.tick_once().await,
            TickOutcome::Failed(TickFailure::Transform(_))
        ));
        assert_eq!(
            h.engine.state(),
            LoopState::Suspended(SuspendReason::AwaitingStart)
        );
        assert_eq!(h.engine.metrics().transform_failures, 1);
    }

    #[tokio::test]
    async fn shutdown_releases_model_and_refuses_restart() {
        let h = harness(FakeModel::new(vec![1.0]), true);
        h.engine.load().await.unwrap();
        h.engine.start(Duration::from_millis(10)).await.unwrap();
        h.engine.shutdown().await;

        assert_eq!(h.engine.state(), LoopState::Stopped);
        assert!(h.engine.model_info().is_none());
        assert_eq!(
            h.engine.start(Duration::from_millis(10)).await,
            Err(EngineError::ShutDown)
        );
        assert_eq!(h.engine.load().await, Err(EngineError::ShutDown));
        assert!(matches!(
            h.engine.tick_once().await,
            TickOutcome::Skipped(SkipReason::Closed)
        ));
    }

    #[tokio::test]
    async fn zero_period_is_rejected() {
        let h = harness(FakeModel::new(vec![1.0]), true);
        h.engine.load().await.unwrap();
        assert_eq!(
            h.engine.start(Duration::ZERO).await,
            Err(EngineError::InvalidPeriod)
        );
    }
}
