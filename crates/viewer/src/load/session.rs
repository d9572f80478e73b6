use std::sync::Arc;

use mesh::{frame, normalize, BoundingVolume, CameraPose, FramingConfig, NormalizationTransform, RawMeshBytes};
use tokio::sync::{mpsc, watch};

use super::token::{LoadToken, RequestId};
use super::LoadError;
use crate::config::ViewerConfig;
use crate::render::MeshData;
use crate::source::{MeshSource, SourceFetcher};

/// Stage of a load session.
///
/// `Idle → Decoding → Bounding → Normalizing → Framing → Installing → Done`.
/// Any non-terminal stage may move to `Canceled`; `Decoding` through
/// `Installing` may move to `Failed`. An explicit clear goes `Idle → Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Idle,
    Decoding,
    Bounding,
    Normalizing,
    Framing,
    Installing,
    Done,
    Canceled,
    Failed,
}

impl LoadPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, LoadPhase::Done | LoadPhase::Canceled | LoadPhase::Failed)
    }

    pub fn can_advance_to(self, next: LoadPhase) -> bool {
        use LoadPhase::*;
        match (self, next) {
            (Idle, Decoding)
            | (Decoding, Bounding)
            | (Bounding, Normalizing)
            | (Normalizing, Framing)
            | (Framing, Installing)
            | (Installing, Done)
            | (Idle, Done) => true,
            (from, Canceled) => !from.is_terminal(),
            (Decoding | Bounding | Normalizing | Framing | Installing, Failed) => true,
            _ => false,
        }
    }
}

/// Returned when a session's token was superseded at a stage boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superseded;

/// One load request moving through [`LoadPhase`]s.
///
/// Phase changes are published on a watch channel so the host can show
/// progress without polling the session itself.
#[derive(Debug)]
pub struct LoadSession {
    token: LoadToken,
    phase: LoadPhase,
    phase_tx: watch::Sender<LoadPhase>,
}

impl LoadSession {
    pub fn new(token: LoadToken) -> (Self, watch::Receiver<LoadPhase>) {
        let (phase_tx, phase_rx) = watch::channel(LoadPhase::Idle);
        let session = Self {
            token,
            phase: LoadPhase::Idle,
            phase_tx,
        };
        (session, phase_rx)
    }

    pub fn request_id(&self) -> RequestId {
        self.token.request_id()
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn is_current(&self) -> bool {
        self.token.is_current()
    }

    /// Move to `next` if the token is still current; otherwise the session
    /// becomes `Canceled`.
    pub fn enter(&mut self, next: LoadPhase) -> Result<(), Superseded> {
        self.ensure_current()?;
        self.transition(next);
        Ok(())
    }

    pub fn ensure_current(&mut self) -> Result<(), Superseded> {
        if self.token.is_current() {
            Ok(())
        } else {
            self.cancel();
            Err(Superseded)
        }
    }

    pub fn cancel(&mut self) {
        if !self.phase.is_terminal() {
            self.transition(LoadPhase::Canceled);
        }
    }

    pub fn fail(&mut self) {
        self.transition(LoadPhase::Failed);
    }

    pub fn finish(&mut self) {
        self.transition(LoadPhase::Done);
    }

    fn transition(&mut self, next: LoadPhase) {
        if !self.phase.can_advance_to(next) {
            tracing::error!(
                "Load {}: refusing phase change {:?} -> {:?}",
                self.request_id(),
                self.phase,
                next
            );
            return;
        }
        tracing::trace!("Load {}: {:?} -> {:?}", self.request_id(), self.phase, next);
        self.phase = next;
        self.phase_tx.send_replace(next);
    }
}

/// Result of the off-thread stages, ready to upload.
#[derive(Debug, Clone)]
pub struct PreparedMesh {
    /// Vertex buffer with normalization baked in
    pub data: MeshData,
    pub triangle_count: usize,
    /// Bounds after normalization
    pub bounds: BoundingVolume,
    pub transform: NormalizationTransform,
    pub pose: CameraPose,
}

#[derive(Debug)]
pub enum SessionOutcome {
    Prepared(PreparedMesh),
    Failed(LoadError),
    Canceled,
}

/// Sent back to the runtime exactly once per session.
#[derive(Debug)]
pub struct SessionReport {
    pub session: LoadSession,
    pub source: String,
    pub outcome: SessionOutcome,
}

/// Parameters of the off-thread stages, copied out of [`ViewerConfig`].
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub diameter: f32,
    pub fov_degrees: f32,
    pub framing: FramingConfig,
    pub color: [f32; 3],
}

impl PipelineSettings {
    pub fn from_config(config: &ViewerConfig) -> Self {
        Self {
            diameter: config.normalize.diameter,
            fov_degrees: config.camera.fov_degrees,
            framing: config.framing,
            color: crate::config::rgb(config.appearance.mesh_color),
        }
    }
}

enum Halt {
    Superseded,
    Failed(LoadError),
}

impl From<Superseded> for Halt {
    fn from(_: Superseded) -> Self {
        Halt::Superseded
    }
}

impl From<LoadError> for Halt {
    fn from(err: LoadError) -> Self {
        Halt::Failed(err)
    }
}

/// Drive `session` from `Idle` up to (not including) `Installing` and send
/// one [`SessionReport`]. Installing happens on the render thread.
///
/// The report is sent even when the task panics or is dropped mid-stage, so
/// the runtime never waits on a session that can no longer finish.
pub async fn run_pipeline(
    session: LoadSession,
    source: MeshSource,
    fetcher: Arc<dyn SourceFetcher>,
    settings: PipelineSettings,
    reports: mpsc::UnboundedSender<SessionReport>,
) {
    let mut guard = ReportGuard {
        session: Some(session),
        source: source.name(),
        reports,
    };
    let Some(session) = guard.session.as_mut() else {
        return;
    };

    let outcome = match prepare(session, &source, fetcher.as_ref(), &settings).await {
        Ok(prepared) => SessionOutcome::Prepared(prepared),
        Err(Halt::Superseded) => {
            tracing::debug!("Load {} superseded during {:?}", session.request_id(), session.phase());
            SessionOutcome::Canceled
        }
        Err(Halt::Failed(err)) => SessionOutcome::Failed(err),
    };
    guard.send(outcome);
}

/// Owns the session until its report is sent.
struct ReportGuard {
    session: Option<LoadSession>,
    source: String,
    reports: mpsc::UnboundedSender<SessionReport>,
}

impl ReportGuard {
    fn send(&mut self, outcome: SessionOutcome) {
        let Some(session) = self.session.take() else {
            return;
        };
        let report = SessionReport {
            session,
            source: std::mem::take(&mut self.source),
            outcome,
        };
        if self.reports.send(report).is_err() {
            tracing::debug!("Viewer gone, dropping load report");
        }
    }
}

impl Drop for ReportGuard {
    fn drop(&mut self) {
        if self.session.is_some() {
            tracing::warn!("Load task for {} ended without a result", self.source);
            self.send(SessionOutcome::Failed(LoadError::Worker(
                "load task ended without a result".to_string(),
            )));
        }
    }
}

async fn prepare(
    session: &mut LoadSession,
    source: &MeshSource,
    fetcher: &dyn SourceFetcher,
    settings: &PipelineSettings,
) -> Result<PreparedMesh, Halt> {
    session.enter(LoadPhase::Decoding)?;
    let fetched = fetcher.fetch(source).await;
    session.ensure_current()?;
    let fetched = fetched.map_err(LoadError::from)?;

    let raw = RawMeshBytes::from_named(&fetched.name, fetched.data).map_err(LoadError::from)?;
    let decoded = tokio::task::spawn_blocking(move || mesh::decode(&raw))
        .await
        .map_err(|e| LoadError::Worker(e.to_string()))?;
    session.ensure_current()?;
    let mut triangles = decoded.map_err(LoadError::from)?;
    if triangles.is_empty() {
        return Err(LoadError::EmptyMesh.into());
    }

    tokio::task::yield_now().await;
    session.enter(LoadPhase::Bounding)?;
    let bounds = BoundingVolume::from_mesh(&triangles).ok_or(LoadError::EmptyMesh)?;

    tokio::task::yield_now().await;
    session.enter(LoadPhase::Normalizing)?;
    let transform = normalize(&bounds, settings.diameter).map_err(LoadError::from)?;
    let normalized = transform.apply_bounds(&bounds);
    transform.apply_mesh(&mut triangles);
    let data = MeshData::from_triangles(&triangles, settings.color);

    tokio::task::yield_now().await;
    session.enter(LoadPhase::Framing)?;
    let pose = frame(&normalized, settings.fov_degrees, &settings.framing);

    tracing::debug!(
        "Load {}: {} triangles, scale {:.4}",
        session.request_id(),
        triangles.triangle_count(),
        transform.scale
    );

    Ok(PreparedMesh {
        data,
        triangle_count: triangles.triangle_count(),
        bounds: normalized,
        transform,
        pose,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::harness::GatedFetcher;
    use crate::load::TokenSource;
    use crate::validation::MeshValidator;

    #[test]
    fn test_transition_table() {
        use LoadPhase::*;
        assert!(Idle.can_advance_to(Decoding));
        assert!(Framing.can_advance_to(Installing));
        assert!(Idle.can_advance_to(Done));
        assert!(Bounding.can_advance_to(Canceled));
        assert!(Decoding.can_advance_to(Failed));
        assert!(!Idle.can_advance_to(Failed));
        assert!(!Decoding.can_advance_to(Framing));
        assert!(!Done.can_advance_to(Canceled));
        assert!(!Canceled.can_advance_to(Decoding));
    }

    #[test]
    fn test_enter_publishes_phase() {
        let tokens = TokenSource::new();
        let (mut session, rx) = LoadSession::new(tokens.issue());
        session.enter(LoadPhase::Decoding).unwrap();
        assert_eq!(*rx.borrow(), LoadPhase::Decoding);
    }

    #[test]
    fn test_superseded_session_cancels() {
        let tokens = TokenSource::new();
        let (mut session, rx) = LoadSession::new(tokens.issue());
        session.enter(LoadPhase::Decoding).unwrap();
        tokens.issue();
        assert_eq!(session.enter(LoadPhase::Bounding), Err(Superseded));
        assert_eq!(session.phase(), LoadPhase::Canceled);
        assert_eq!(*rx.borrow(), LoadPhase::Canceled);
    }

    #[test]
    fn test_invalid_transition_is_refused() {
        let tokens = TokenSource::new();
        let (mut session, _rx) = LoadSession::new(tokens.issue());
        session.enter(LoadPhase::Installing).unwrap();
        assert_eq!(session.phase(), LoadPhase::Idle);
        session.finish();
        session.fail();
        assert_eq!(session.phase(), LoadPhase::Done);
    }

    #[tokio::test]
    async fn test_pipeline_prepares_valid_mesh_data() {
        let fetcher = GatedFetcher::new();
        fetcher.insert("cube.stl", fixtures::cube_binary_stl(10.0));
        let tokens = TokenSource::new();
        let (session, _rx) = LoadSession::new(tokens.issue());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let settings = PipelineSettings::from_config(&ViewerConfig::default());

        run_pipeline(
            session,
            MeshSource::Url("cube.stl".into()),
            Arc::new(fetcher),
            settings,
            tx,
        )
        .await;

        let report = rx.recv().await.unwrap();
        assert_eq!(report.session.phase(), LoadPhase::Framing);
        let SessionOutcome::Prepared(prepared) = report.outcome else {
            panic!("expected a prepared mesh");
        };
        let validator = MeshValidator::new(&prepared.data);
        assert!(validator.validate_all().is_empty(), "{:?}", validator.validate_all());
        assert!(validator.is_normalized(2.0, 1e-4));
        assert_eq!(validator.triangle_count(), 12);
        assert!((prepared.transform.scale - 0.2).abs() < 1e-6);

        // Diffuse color comes from the vertex buffer.
        let expected = crate::config::rgb(ViewerConfig::default().appearance.mesh_color);
        assert!(prepared
            .data
            .vertices
            .chunks(crate::render::mesh::VERTEX_STRIDE)
            .all(|v| v[6..9] == expected));
    }
}
