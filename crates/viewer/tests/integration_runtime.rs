//! End-to-end runtime tests against the headless backend.

use std::sync::Arc;

use glam::Vec3;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;

use stl_viewer_lib::fixtures;
use stl_viewer_lib::harness::{GatedFetcher, HeadlessBackend};
use stl_viewer_lib::source::FetchFuture;
use stl_viewer_lib::{
    LoadEvent, LoadPhase, MeshSource, SourceFetcher, SurfaceSize, ViewerConfig, ViewerRuntime,
};

type Runtime = ViewerRuntime<HeadlessBackend>;

fn mount(fetcher: &GatedFetcher) -> (Runtime, HeadlessBackend) {
    let backend = HeadlessBackend::new();
    let runtime = ViewerRuntime::mount(
        backend.clone(),
        Arc::new(fetcher.clone()),
        Handle::current(),
        ViewerConfig::default(),
    )
    .unwrap();
    (runtime, backend)
}

fn url(name: &str) -> MeshSource {
    MeshSource::Url(name.to_string())
}

fn drain(events: &mut UnboundedReceiver<LoadEvent>) -> Vec<LoadEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test]
async fn test_load_installs_normalized_mesh() {
    let fetcher = GatedFetcher::new();
    fetcher.insert(
        "box.stl",
        fixtures::box_binary_stl(Vec3::new(-1.0, -2.0, -3.0), Vec3::new(3.0, 2.0, 1.0)),
    );
    let (mut runtime, backend) = mount(&fetcher);
    let mut events = runtime.subscribe();

    let request = runtime.load(url("box.stl")).unwrap();
    runtime.settle().await;

    let installed = runtime.state().mesh().unwrap();
    assert_eq!(installed.request, request);
    assert_eq!(installed.triangle_count, 12);
    assert!((installed.bounds.max_extent() - 2.0).abs() < 1e-5);
    assert!(installed.bounds.center().length() < 1e-5);
    assert!((installed.bounds.max - Vec3::new(1.0, 1.0, 1.0)).length() < 1e-5);
    assert_eq!(runtime.load_phase(), LoadPhase::Done);
    assert!(!runtime.is_loading());

    let config = ViewerConfig::default();
    let expected = mesh::frame(&installed.bounds, config.camera.fov_degrees, &config.framing);
    assert!((runtime.state().pose().distance() - expected.distance()).abs() < 1e-4);
    assert!((runtime.controls().distance - expected.distance()).abs() < 1e-4);

    assert_eq!(backend.log().live.len(), 1);
    assert_eq!(
        drain(&mut events),
        vec![
            LoadEvent::Started {
                request,
                source: "box.stl".into()
            },
            LoadEvent::Succeeded {
                request,
                source: "box.stl".into(),
                triangles: 12
            },
        ]
    );
}

#[tokio::test]
async fn test_ascii_source_loads() {
    let fetcher = GatedFetcher::new();
    fetcher.insert("cube.STL", fixtures::cube_ascii_stl(5.0));
    let (mut runtime, _backend) = mount(&fetcher);

    runtime.load(url("cube.STL"));
    runtime.settle().await;

    assert_eq!(runtime.state().mesh().map(|m| m.triangle_count), Some(12));
}

#[tokio::test]
async fn test_failed_decode_keeps_previous_mesh() {
    let fetcher = GatedFetcher::new();
    fetcher.insert("good.stl", fixtures::cube_binary_stl(2.0));
    fetcher.insert("bad.stl", fixtures::malformed_ascii_stl());
    let (mut runtime, backend) = mount(&fetcher);

    let good = runtime.load(url("good.stl")).unwrap();
    runtime.settle().await;
    let mut events = runtime.subscribe();

    let bad = runtime.load(url("bad.stl")).unwrap();
    runtime.settle().await;

    assert_eq!(runtime.state().mesh().map(|m| m.request), Some(good));
    assert_eq!(runtime.load_phase(), LoadPhase::Failed);
    assert_eq!(backend.log().live.len(), 1);

    let events = drain(&mut events);
    assert_eq!(events.len(), 2);
    match &events[1] {
        LoadEvent::Failed {
            request, reason, ..
        } => {
            assert_eq!(*request, bad);
            assert!(reason.contains("malformed"), "{reason}");
        }
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_truncated_binary_fails() {
    let fetcher = GatedFetcher::new();
    fetcher.insert("short.stl", fixtures::truncated_binary_stl());
    let (mut runtime, backend) = mount(&fetcher);
    let mut events = runtime.subscribe();

    runtime.load(url("short.stl"));
    runtime.settle().await;

    assert!(runtime.state().mesh().is_none());
    assert!(backend.log().uploads.is_empty());
    assert!(matches!(
        drain(&mut events).last(),
        Some(LoadEvent::Failed { reason, .. }) if reason.contains("truncated")
    ));
}

#[tokio::test]
async fn test_empty_mesh_fails() {
    let fetcher = GatedFetcher::new();
    fetcher.insert("empty.stl", fixtures::empty_binary_stl());
    let (mut runtime, backend) = mount(&fetcher);
    let mut events = runtime.subscribe();

    runtime.load(url("empty.stl"));
    runtime.settle().await;

    assert_eq!(runtime.load_phase(), LoadPhase::Failed);
    assert!(backend.log().uploads.is_empty());
    assert!(matches!(
        drain(&mut events).last(),
        Some(LoadEvent::Failed { reason, .. }) if reason.contains("no triangles")
    ));
}

#[tokio::test]
async fn test_unsupported_extension_fails() {
    let fetcher = GatedFetcher::new();
    fetcher.insert("part.obj", fixtures::cube_binary_stl(1.0));
    let (mut runtime, backend) = mount(&fetcher);
    let mut events = runtime.subscribe();

    runtime.load(url("part.obj"));
    runtime.settle().await;

    assert!(runtime.state().mesh().is_none());
    assert!(backend.log().uploads.is_empty());
    assert!(matches!(
        drain(&mut events).last(),
        Some(LoadEvent::Failed { reason, .. }) if reason.contains("unsupported")
    ));
}

#[tokio::test]
async fn test_missing_source_fails() {
    let fetcher = GatedFetcher::new();
    let (mut runtime, _backend) = mount(&fetcher);
    let mut events = runtime.subscribe();

    runtime.load(url("nowhere.stl"));
    runtime.settle().await;

    assert_eq!(runtime.load_phase(), LoadPhase::Failed);
    assert!(matches!(
        drain(&mut events).last(),
        Some(LoadEvent::Failed { reason, .. }) if reason.contains("404")
    ));
}

#[tokio::test]
async fn test_newer_request_wins_when_it_finishes_first() {
    let fetcher = GatedFetcher::new();
    let gate_a = fetcher.insert_gated("a.stl", fixtures::cube_binary_stl(1.0));
    fetcher.insert("b.stl", fixtures::tetrahedron_binary_stl());
    let (mut runtime, backend) = mount(&fetcher);
    let mut events = runtime.subscribe();

    let a = runtime.load(url("a.stl")).unwrap();
    let b = runtime.load(url("b.stl")).unwrap();

    // B is not gated and reports first.
    assert!(runtime.process_next_report().await);
    assert_eq!(runtime.state().mesh().map(|m| m.request), Some(b));

    gate_a.send(()).ok();
    runtime.settle().await;

    assert_eq!(runtime.state().mesh().map(|m| m.request), Some(b));
    assert_eq!(runtime.state().mesh().map(|m| m.triangle_count), Some(4));
    assert_eq!(backend.log().uploads.len(), 1);
    assert_eq!(runtime.load_phase(), LoadPhase::Done);

    let events = drain(&mut events);
    assert!(!events
        .iter()
        .any(|e| matches!(e, LoadEvent::Succeeded { request, .. } if *request == a)));
    assert!(!events
        .iter()
        .any(|e| matches!(e, LoadEvent::Failed { request, .. } if *request == a)));
}

#[tokio::test]
async fn test_newer_request_wins_when_it_finishes_last() {
    let fetcher = GatedFetcher::new();
    let gate_a = fetcher.insert_gated("a.stl", fixtures::cube_binary_stl(1.0));
    let gate_b = fetcher.insert_gated("b.stl", fixtures::tetrahedron_binary_stl());
    let (mut runtime, backend) = mount(&fetcher);

    runtime.load(url("a.stl"));
    let b = runtime.load(url("b.stl")).unwrap();

    gate_a.send(()).ok();
    assert!(runtime.process_next_report().await);
    assert!(runtime.state().mesh().is_none());
    assert!(runtime.is_loading());

    gate_b.send(()).ok();
    runtime.settle().await;

    assert_eq!(runtime.state().mesh().map(|m| m.request), Some(b));
    assert_eq!(backend.log().uploads.len(), 1);
    assert_eq!(backend.log().live.len(), 1);
}

#[tokio::test]
async fn test_repeated_loads_keep_one_resident_mesh() {
    let fetcher = GatedFetcher::new();
    fetcher.insert("cube.stl", fixtures::cube_binary_stl(3.0));
    let (mut runtime, backend) = mount(&fetcher);

    for _ in 0..4 {
        runtime.load(url("cube.stl"));
        runtime.settle().await;
    }

    let log = backend.log();
    assert_eq!(log.uploads.len(), 4);
    assert_eq!(log.released.len(), 3);
    assert_eq!(log.live.len(), 1);
    assert!(log
        .live
        .contains_key(&runtime.state().mesh().unwrap().handle));
}

#[tokio::test]
async fn test_clear_releases_mesh() {
    let fetcher = GatedFetcher::new();
    fetcher.insert("cube.stl", fixtures::cube_binary_stl(2.0));
    let (mut runtime, backend) = mount(&fetcher);
    let mut events = runtime.subscribe();

    runtime.load(url("cube.stl"));
    runtime.settle().await;
    runtime.request(None);

    assert!(runtime.state().mesh().is_none());
    assert!(backend.log().live.is_empty());
    assert_eq!(runtime.load_phase(), LoadPhase::Done);
    assert_eq!(drain(&mut events).last(), Some(&LoadEvent::Cleared));

    runtime.tick();
    assert_eq!(backend.log().last_frame.and_then(|f| f.mesh), None);
}

#[tokio::test]
async fn test_upload_failure_keeps_previous_mesh() {
    let fetcher = GatedFetcher::new();
    fetcher.insert("first.stl", fixtures::cube_binary_stl(2.0));
    fetcher.insert("second.stl", fixtures::tetrahedron_binary_stl());
    let (mut runtime, backend) = mount(&fetcher);
    let mut events = runtime.subscribe();

    let first = runtime.load(url("first.stl")).unwrap();
    runtime.settle().await;

    backend.fail_next_upload();
    runtime.load(url("second.stl"));
    runtime.settle().await;

    assert_eq!(runtime.state().mesh().map(|m| m.request), Some(first));
    assert_eq!(runtime.load_phase(), LoadPhase::Failed);
    assert_eq!(backend.log().live.len(), 1);
    assert!(matches!(
        drain(&mut events).last(),
        Some(LoadEvent::Failed { reason, .. }) if reason.contains("GPU upload failed")
    ));
}

#[tokio::test]
async fn test_resize_updates_projection_once() {
    let fetcher = GatedFetcher::new();
    let (mut runtime, backend) = mount(&fetcher);

    runtime.resize(SurfaceSize::new(800, 400));
    runtime.resize(SurfaceSize::new(800, 400));

    assert_eq!(backend.log().resizes, 1);
    assert_eq!(backend.log().size, SurfaceSize::new(800, 400));
    assert!((runtime.controls().aspect - 2.0).abs() < 1e-6);

    // A collapsed surface keeps the last usable aspect.
    runtime.resize(SurfaceSize::new(0, 0));
    assert!((runtime.controls().aspect - 2.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_teardown_is_idempotent() {
    let fetcher = GatedFetcher::new();
    fetcher.insert("cube.stl", fixtures::cube_binary_stl(2.0));
    let gate = fetcher.insert_gated("slow.stl", fixtures::cube_binary_stl(1.0));
    let (mut runtime, backend) = mount(&fetcher);

    runtime.load(url("cube.stl"));
    runtime.settle().await;
    runtime.load(url("slow.stl"));

    runtime.teardown();
    runtime.teardown();
    drop(gate);

    assert!(runtime.is_torn_down());
    assert!(runtime.load(url("cube.stl")).is_none());
    assert!(!runtime.tick());
    runtime.resize(SurfaceSize::new(640, 480));
    drop(runtime);

    let log = backend.log();
    assert_eq!(log.attach_count, 1);
    assert_eq!(log.detach_count, 1);
    assert!(log.live.is_empty());
    assert_eq!(log.uploads.len(), 1);
    assert_eq!(log.resizes, 0);
}

#[tokio::test]
async fn test_auto_rotate_spins_only_with_mesh() {
    let fetcher = GatedFetcher::new();
    fetcher.insert("cube.stl", fixtures::cube_binary_stl(2.0));
    let (mut runtime, _backend) = mount(&fetcher);

    runtime.tick();
    assert_eq!(runtime.scene().spin(), (0.0, 0.0));

    runtime.load(url("cube.stl"));
    runtime.settle().await;
    runtime.tick();
    runtime.tick();
    assert!(runtime.scene().spin().1 > 0.0);

    runtime.scene_mut().auto_rotate = false;
    let before = runtime.scene().spin();
    runtime.tick();
    assert_eq!(runtime.scene().spin(), before);
}

#[tokio::test]
async fn test_issued_load_keeps_ticks_scheduled() {
    let fetcher = GatedFetcher::new();
    fetcher.insert("cube.stl", fixtures::cube_binary_stl(2.0));
    let (mut runtime, _backend) = mount(&fetcher);
    runtime.scene_mut().auto_rotate = false;
    assert!(!runtime.needs_tick());

    // No worker has run yet; the request alone must count as loading.
    runtime.load(url("cube.stl"));
    assert_eq!(runtime.load_phase(), LoadPhase::Idle);
    assert!(runtime.is_loading());
    assert!(runtime.needs_tick());

    runtime.settle().await;
    assert!(runtime.state().mesh().is_some());
    assert!(!runtime.is_loading());
    assert!(!runtime.needs_tick());

    runtime.scene_mut().auto_rotate = true;
    assert!(runtime.needs_tick());
    runtime.teardown();
    assert!(!runtime.needs_tick());
}

struct PanickingFetcher;

impl SourceFetcher for PanickingFetcher {
    fn fetch(&self, _source: &MeshSource) -> FetchFuture {
        Box::pin(async { panic!("fetcher failed hard") })
    }
}

#[tokio::test]
async fn test_panicking_fetcher_fails_the_load() {
    let backend = HeadlessBackend::new();
    let mut runtime = ViewerRuntime::mount(
        backend.clone(),
        Arc::new(PanickingFetcher),
        Handle::current(),
        ViewerConfig::default(),
    )
    .unwrap();
    let mut events = runtime.subscribe();

    runtime.load(url("cube.stl"));
    runtime.settle().await;

    assert!(!runtime.is_loading());
    assert_eq!(runtime.load_phase(), LoadPhase::Failed);
    assert!(backend.log().uploads.is_empty());
    assert!(matches!(
        drain(&mut events).last(),
        Some(LoadEvent::Failed { reason, .. }) if reason.contains("load worker stopped")
    ));
}
