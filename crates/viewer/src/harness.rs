//! Headless test harness for driving a [`ViewerRuntime`](crate::runtime::ViewerRuntime)
//! without a window or GL context.
//!
//! [`HeadlessBackend`] records every GPU call; [`GatedFetcher`] serves
//! in-memory bytes and can hold a fetch until the test releases it, which
//! makes load ordering deterministic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;

use crate::render::{FrameDescription, MeshData, MeshHandle, RenderBackend, ResourceError, SurfaceSize};
use crate::source::{FetchError, FetchFuture, FetchedBytes, MeshSource, SourceFetcher};

// ── Backend ───────────────────────────────────────────────────

/// Everything the headless backend has been asked to do.
#[derive(Debug, Default)]
pub struct BackendLog {
    pub attached: bool,
    pub attach_count: usize,
    pub detach_count: usize,
    /// Uploaded and not yet released, with vertex counts
    pub live: HashMap<MeshHandle, usize>,
    pub uploads: Vec<MeshHandle>,
    pub released: Vec<MeshHandle>,
    pub frames: usize,
    pub last_frame: Option<FrameDescription>,
    pub size: SurfaceSize,
    pub resizes: usize,
    fail_next_upload: bool,
    next_handle: u64,
}

/// Recording [`RenderBackend`]. Clones share one log, so a test keeps a
/// clone after handing the backend to the runtime.
#[derive(Debug, Clone, Default)]
pub struct HeadlessBackend {
    log: Arc<Mutex<BackendLog>>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> MutexGuard<'_, BackendLog> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the next upload fail with an allocation error.
    pub fn fail_next_upload(&self) {
        self.log().fail_next_upload = true;
    }
}

impl RenderBackend for HeadlessBackend {
    fn attach(&mut self) -> Result<(), ResourceError> {
        let mut log = self.log();
        log.attached = true;
        log.attach_count += 1;
        Ok(())
    }

    fn upload_mesh(&mut self, data: &MeshData) -> Result<MeshHandle, ResourceError> {
        let mut log = self.log();
        if !log.attached {
            return Err(ResourceError::Detached);
        }
        if std::mem::take(&mut log.fail_next_upload) {
            return Err(ResourceError::Allocation("injected upload failure".to_string()));
        }
        log.next_handle += 1;
        let handle = MeshHandle(log.next_handle);
        log.live.insert(handle, data.vertex_count());
        log.uploads.push(handle);
        Ok(handle)
    }

    fn release_mesh(&mut self, handle: MeshHandle) -> Result<(), ResourceError> {
        let mut log = self.log();
        if log.live.remove(&handle).is_none() {
            return Err(ResourceError::UnknownMesh(handle));
        }
        log.released.push(handle);
        Ok(())
    }

    fn resize(&mut self, size: SurfaceSize) {
        let mut log = self.log();
        log.size = size;
        log.resizes += 1;
    }

    fn render(&mut self, frame: &FrameDescription) {
        let mut log = self.log();
        if log.attached {
            log.frames += 1;
            log.last_frame = Some(*frame);
        }
    }

    fn detach(&mut self) -> Result<(), ResourceError> {
        let mut log = self.log();
        if !log.attached {
            return Err(ResourceError::Detached);
        }
        log.attached = false;
        log.detach_count += 1;
        let leaked: Vec<MeshHandle> = log.live.drain().map(|(handle, _)| handle).collect();
        log.released.extend(leaked);
        Ok(())
    }
}

// ── Fetcher ───────────────────────────────────────────────────

struct Entry {
    data: Vec<u8>,
    gate: Option<oneshot::Receiver<()>>,
}

/// In-memory [`SourceFetcher`] keyed by source name.
#[derive(Clone, Default)]
pub struct GatedFetcher {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl GatedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `data` for `name` as soon as it is requested.
    pub fn insert(&self, name: &str, data: Vec<u8>) {
        self.entries().insert(name.to_string(), Entry { data, gate: None });
    }

    /// Serve `data` for `name` once the returned sender fires or is dropped.
    /// Only the first fetch of `name` waits.
    pub fn insert_gated(&self, name: &str, data: Vec<u8>) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.entries().insert(
            name.to_string(),
            Entry {
                data,
                gate: Some(rx),
            },
        );
        tx
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SourceFetcher for GatedFetcher {
    fn fetch(&self, source: &MeshSource) -> FetchFuture {
        let name = source.name();
        let found = self
            .entries()
            .get_mut(&name)
            .map(|entry| (entry.data.clone(), entry.gate.take()));

        Box::pin(async move {
            let Some((data, gate)) = found else {
                return Err(FetchError::Status {
                    url: name,
                    status: 404,
                });
            };
            if let Some(gate) = gate {
                // A dropped sender releases the gate as well.
                let _ = gate.await;
            }
            Ok(FetchedBytes { name, data })
        })
    }
}
