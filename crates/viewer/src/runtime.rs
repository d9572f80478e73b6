//! Viewer runtime: owns the scene, camera controls and GPU backend, starts
//! load sessions and installs their results on the render thread.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};

use crate::config::ViewerConfig;
use crate::load::{
    run_pipeline, EventHub, LoadError, LoadEvent, LoadPhase, LoadSession, PipelineSettings,
    PreparedMesh, RequestId, SessionOutcome, SessionReport, TokenSource,
};
use crate::orbit::OrbitControls;
use crate::render::{FrameDescription, RenderBackend, ResourceError, SurfaceSize};
use crate::scene::SceneGraph;
use crate::source::{MeshSource, SourceFetcher};
use crate::state::{InstalledMesh, ViewerState};

/// Drives one viewer surface.
///
/// Loads run on the tokio runtime behind `tasks`; their reports are picked up
/// by [`tick`](Self::tick) (or awaited with [`settle`](Self::settle)) so
/// that every GPU call happens on the thread that owns the runtime.
pub struct ViewerRuntime<B: RenderBackend> {
    config: ViewerConfig,
    backend: Option<B>,
    scene: SceneGraph,
    controls: OrbitControls,
    state: ViewerState,
    surface: SurfaceSize,
    observing_resize: bool,
    tokens: TokenSource,
    fetcher: Arc<dyn SourceFetcher>,
    tasks: Handle,
    reports_tx: mpsc::UnboundedSender<SessionReport>,
    reports_rx: mpsc::UnboundedReceiver<SessionReport>,
    /// Sessions spawned whose report has not been handled yet
    outstanding: usize,
    phase: watch::Receiver<LoadPhase>,
    events: EventHub,
    frames: u64,
    torn_down: bool,
}

impl<B: RenderBackend> ViewerRuntime<B> {
    /// Attach `backend` and build an empty scene.
    pub fn mount(
        mut backend: B,
        fetcher: Arc<dyn SourceFetcher>,
        tasks: Handle,
        config: ViewerConfig,
    ) -> Result<Self, ResourceError> {
        backend.attach()?;

        let scene = SceneGraph::new(&config.appearance, &config.auto_rotate);
        let controls = OrbitControls::new(&config.camera, &config.orbit);
        let initial_pose = mesh::CameraPose {
            position: controls.eye_position(),
            target: controls.target,
            fov_degrees: config.camera.fov_degrees,
        };
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        let (_, phase) = watch::channel(LoadPhase::Idle);

        tracing::info!("Viewer mounted");

        Ok(Self {
            config,
            backend: Some(backend),
            scene,
            controls,
            state: ViewerState::new(initial_pose),
            surface: SurfaceSize::default(),
            observing_resize: true,
            tokens: TokenSource::new(),
            fetcher,
            tasks,
            reports_tx,
            reports_rx,
            outstanding: 0,
            phase,
            events: EventHub::new(),
            frames: 0,
            torn_down: false,
        })
    }

    // ── Requests ─────────────────────────────────────────────

    /// Load `source`, or clear the view when it is `None`.
    pub fn request(&mut self, source: Option<MeshSource>) -> Option<RequestId> {
        match source {
            Some(source) => self.load(source),
            None => {
                self.clear();
                None
            }
        }
    }

    /// Start loading `source`, superseding any load in flight. The current
    /// mesh stays on screen until the new one is installed.
    pub fn load(&mut self, source: MeshSource) -> Option<RequestId> {
        if self.torn_down {
            tracing::warn!("Ignoring load of {source}: viewer is torn down");
            return None;
        }

        let (session, phase) = LoadSession::new(self.tokens.issue());
        let request = session.request_id();
        self.phase = phase;

        let label = source.name();
        tracing::info!("Loading mesh {request} from {label}");
        self.events.emit(LoadEvent::Started {
            request,
            source: label,
        });

        self.outstanding += 1;
        self.tasks.spawn(run_pipeline(
            session,
            source,
            Arc::clone(&self.fetcher),
            PipelineSettings::from_config(&self.config),
            self.reports_tx.clone(),
        ));
        Some(request)
    }

    /// Cancel any load in flight and remove the displayed mesh.
    pub fn clear(&mut self) {
        if self.torn_down {
            return;
        }
        let (mut session, phase) = LoadSession::new(self.tokens.issue());
        self.phase = phase;
        if let Some(old) = self.state.clear() {
            self.release(old);
        }
        session.finish();
        tracing::info!("Viewer cleared");
        self.events.emit(LoadEvent::Cleared);
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<LoadEvent> {
        self.events.subscribe()
    }

    /// Phase of the most recent request.
    pub fn load_phase(&self) -> LoadPhase {
        *self.phase.borrow()
    }

    /// Watch the phase of the most recent request. A new request replaces
    /// the channel, so re-subscribe after each one.
    pub fn watch_phase(&self) -> watch::Receiver<LoadPhase> {
        self.phase.clone()
    }

    /// True from the moment a load is issued until every spawned session
    /// has reported and been handled.
    pub fn is_loading(&self) -> bool {
        self.outstanding > 0
            || (!self.load_phase().is_terminal() && self.load_phase() != LoadPhase::Idle)
    }

    /// Whether the host must keep scheduling ticks: a report may still
    /// arrive, the controls are coasting, or the mesh is spinning.
    pub fn needs_tick(&self) -> bool {
        if self.torn_down {
            return false;
        }
        let spinning = self.scene.auto_rotate && self.state.mesh().is_some();
        self.is_loading() || !self.controls.is_settled() || spinning
    }

    // ── Frame loop ───────────────────────────────────────────

    /// Install finished loads, advance controls and spin, draw one frame.
    /// Returns `false` once torn down.
    pub fn tick(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        while let Ok(report) = self.reports_rx.try_recv() {
            self.handle_report(report);
        }

        self.controls.update();
        if self.state.mesh().is_some() {
            self.scene.advance_spin();
        }

        let frame = self.frame_description();
        if let Some(backend) = self.backend.as_mut() {
            backend.render(&frame);
        }
        self.frames += 1;
        true
    }

    /// Surface size changed: update the projection and the backend.
    pub fn resize(&mut self, size: SurfaceSize) {
        if !self.observing_resize || size == self.surface {
            return;
        }
        self.surface = size;
        if let Some(aspect) = size.aspect() {
            self.controls.set_aspect(aspect);
        }
        if let Some(backend) = self.backend.as_mut() {
            backend.resize(size);
        }
        tracing::debug!("Viewport resized to {}x{}", size.width, size.height);
    }

    pub fn frame_description(&self) -> FrameDescription {
        FrameDescription {
            view: self.controls.view_matrix(),
            projection: self.controls.projection_matrix(),
            model: self.scene.model_matrix(),
            eye: self.controls.eye_position(),
            mesh: self.state.mesh().map(|m| m.handle),
            material: self.scene.material,
            lighting: self.scene.lighting,
            background: self.scene.background,
        }
    }

    // ── Session reports ──────────────────────────────────────

    /// Wait for and handle the next session report. Returns `false` when no
    /// session is outstanding.
    pub async fn process_next_report(&mut self) -> bool {
        if self.outstanding == 0 {
            return false;
        }
        match self.reports_rx.recv().await {
            Some(report) => {
                self.handle_report(report);
                true
            }
            None => false,
        }
    }

    /// Handle reports until every spawned session has reported.
    pub async fn settle(&mut self) {
        while self.process_next_report().await {}
    }

    fn handle_report(&mut self, report: SessionReport) {
        self.outstanding = self.outstanding.saturating_sub(1);
        let SessionReport {
            mut session,
            source,
            outcome,
        } = report;

        if self.torn_down || !session.is_current() {
            session.cancel();
            tracing::debug!("Discarding result of superseded load {}", session.request_id());
            return;
        }

        match outcome {
            SessionOutcome::Prepared(prepared) => self.install(session, source, prepared),
            SessionOutcome::Failed(err) => self.fail(session, source, err),
            SessionOutcome::Canceled => session.cancel(),
        }
    }

    fn install(&mut self, mut session: LoadSession, source: String, prepared: PreparedMesh) {
        if session.enter(LoadPhase::Installing).is_err() {
            return;
        }
        let Some(backend) = self.backend.as_mut() else {
            self.fail(session, source, LoadError::Resource(ResourceError::Detached));
            return;
        };
        let handle = match backend.upload_mesh(&prepared.data) {
            Ok(handle) => handle,
            Err(err) => {
                self.fail(session, source, LoadError::Resource(err));
                return;
            }
        };

        let request = session.request_id();
        let triangles = prepared.triangle_count;
        let installed = InstalledMesh {
            handle,
            request,
            source: source.clone(),
            triangle_count: triangles,
            bounds: prepared.bounds,
        };
        let displaced = self.state.install(installed, prepared.pose);
        self.controls.apply_pose(&prepared.pose);
        self.scene.reset_spin();
        if let Some(old) = displaced {
            self.release(old);
        }
        session.finish();

        tracing::info!(
            "Installed mesh {request} from {source}: {triangles} triangles, camera at distance {:.3}",
            prepared.pose.distance()
        );
        self.events.emit(LoadEvent::Succeeded {
            request,
            source,
            triangles,
        });
    }

    fn fail(&mut self, mut session: LoadSession, source: String, err: LoadError) {
        session.fail();
        let request = session.request_id();
        tracing::warn!("Failed to load mesh {request} from {source}: {err}");
        self.events.emit(LoadEvent::Failed {
            request,
            source,
            reason: err.to_string(),
        });
    }

    fn release(&mut self, mesh: InstalledMesh) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        match backend.release_mesh(mesh.handle) {
            Ok(()) => tracing::debug!("Released mesh {} ({})", mesh.request, mesh.source),
            Err(e) => tracing::warn!("Failed to release mesh {}: {e}", mesh.request),
        }
    }

    // ── Teardown ─────────────────────────────────────────────

    /// Stop loads, controls and rendering, then free GPU resources and the
    /// surface. Safe to call more than once; also runs on drop.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.observing_resize = false;
        self.tokens.invalidate();
        self.controls.dispose();

        let displaced = self.state.clear();
        if let Some(mut backend) = self.backend.take() {
            if let Some(mesh) = displaced {
                if let Err(e) = backend.release_mesh(mesh.handle) {
                    tracing::warn!("Failed to release mesh {} during teardown: {e}", mesh.request);
                }
            }
            if let Err(e) = backend.detach() {
                tracing::warn!("Failed to detach renderer: {e}");
            }
        }

        while let Ok(mut report) = self.reports_rx.try_recv() {
            self.outstanding = self.outstanding.saturating_sub(1);
            report.session.cancel();
        }
        tracing::info!("Viewer torn down after {} frames", self.frames);
    }

    // ── Accessors ────────────────────────────────────────────

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    pub fn controls(&self) -> &OrbitControls {
        &self.controls
    }

    pub fn controls_mut(&mut self) -> &mut OrbitControls {
        &mut self.controls
    }

    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    pub fn surface(&self) -> SurfaceSize {
        self.surface
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl<B: RenderBackend> Drop for ViewerRuntime<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::harness::{GatedFetcher, HeadlessBackend};

    fn runtime(fetcher: GatedFetcher) -> (ViewerRuntime<HeadlessBackend>, HeadlessBackend) {
        let backend = HeadlessBackend::new();
        let runtime = ViewerRuntime::mount(
            backend.clone(),
            Arc::new(fetcher),
            Handle::current(),
            ViewerConfig::default(),
        )
        .unwrap();
        (runtime, backend)
    }

    #[tokio::test]
    async fn test_stale_report_is_discarded_without_upload() {
        let fetcher = GatedFetcher::new();
        let gate = fetcher.insert_gated("slow.stl", fixtures::cube_binary_stl(2.0));
        let (mut runtime, backend) = runtime(fetcher);

        runtime.load(MeshSource::Url("slow.stl".into()));
        runtime.clear();
        gate.send(()).ok();
        runtime.settle().await;

        assert!(runtime.state().mesh().is_none());
        assert!(backend.log().uploads.is_empty());
        assert_eq!(runtime.load_phase(), LoadPhase::Done);
    }

    #[tokio::test]
    async fn test_tick_installs_pending_report() {
        let fetcher = GatedFetcher::new();
        fetcher.insert("cube.stl", fixtures::cube_binary_stl(2.0));
        let (mut runtime, backend) = runtime(fetcher);

        runtime.load(MeshSource::Url("cube.stl".into()));
        while runtime.outstanding > 0 {
            tokio::task::yield_now().await;
            runtime.tick();
        }

        assert!(runtime.state().mesh().is_some());
        assert!(backend.log().frames > 0);
        assert_eq!(
            backend.log().last_frame.and_then(|f| f.mesh),
            runtime.state().mesh().map(|m| m.handle)
        );
    }
}
