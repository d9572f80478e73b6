//! 3D viewport panel with OpenGL rendering

mod gl_renderer;

use std::sync::{Arc, Mutex};

use egui::Ui;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;

use gl_renderer::{GlBackend, GlRenderer};
use stl_viewer_lib::{
    DefaultFetcher, LoadEvent, MeshSource, SurfaceSize, ViewerConfig, ViewerRuntime,
};

/// 3D viewport panel hosting the viewer runtime
pub struct ViewportPanel {
    runtime: Option<ViewerRuntime<GlBackend>>,
    gl_renderer: Option<Arc<Mutex<GlRenderer>>>,
    /// Why the runtime could not be mounted
    mount_error: Option<String>,
}

impl ViewportPanel {
    pub fn new(gl: Option<Arc<glow::Context>>, tasks: Handle, config: ViewerConfig) -> Self {
        let Some(gl) = gl else {
            tracing::error!("No OpenGL context available; viewport disabled");
            return Self {
                runtime: None,
                gl_renderer: None,
                mount_error: Some("OpenGL context unavailable".to_string()),
            };
        };

        let (backend, renderer) = GlBackend::new(gl);
        match ViewerRuntime::mount(backend, Arc::new(DefaultFetcher::new()), tasks, config) {
            Ok(runtime) => Self {
                runtime: Some(runtime),
                gl_renderer: Some(renderer),
                mount_error: None,
            },
            Err(e) => {
                tracing::error!("Failed to mount viewer: {e}");
                Self {
                    runtime: None,
                    gl_renderer: None,
                    mount_error: Some(e.to_string()),
                }
            }
        }
    }

    pub fn mount_error(&self) -> Option<&str> {
        self.mount_error.as_deref()
    }

    pub fn subscribe(&mut self) -> Option<UnboundedReceiver<LoadEvent>> {
        self.runtime.as_mut().map(|r| r.subscribe())
    }

    /// Load `source`, or clear the view when it is `None`.
    pub fn request(&mut self, source: Option<MeshSource>) {
        if let Some(runtime) = self.runtime.as_mut() {
            runtime.request(source);
        }
    }

    pub fn has_mesh(&self) -> bool {
        self.runtime
            .as_ref()
            .is_some_and(|r| r.state().mesh().is_some())
    }

    pub fn reset_camera(&mut self) {
        if let Some(runtime) = self.runtime.as_mut() {
            runtime.controls_mut().reset();
        }
    }

    pub fn auto_rotate(&self) -> bool {
        self.runtime.as_ref().is_some_and(|r| r.scene().auto_rotate)
    }

    pub fn set_auto_rotate(&mut self, enabled: bool) {
        if let Some(runtime) = self.runtime.as_mut() {
            runtime.scene_mut().auto_rotate = enabled;
        }
    }

    /// Tear the runtime down while the GL context is still current.
    pub fn teardown(&mut self) {
        if let Some(runtime) = self.runtime.as_mut() {
            runtime.teardown();
        }
    }

    pub fn show(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(
            ui.available_size(),
            egui::Sense::click_and_drag(),
        );

        let Some(runtime) = self.runtime.as_mut() else {
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                self.mount_error.as_deref().unwrap_or("Viewer unavailable"),
                egui::FontId::proportional(14.0),
                egui::Color32::from_rgb(200, 60, 60),
            );
            return;
        };

        // ── Camera controls ─────────────────────────────
        let controls = runtime.controls_mut();
        if response.dragged_by(egui::PointerButton::Primary) {
            let delta = response.drag_delta();
            controls.rotate(delta.x, delta.y);
        }
        if response.dragged_by(egui::PointerButton::Secondary)
            || response.dragged_by(egui::PointerButton::Middle)
        {
            let delta = response.drag_delta();
            controls.pan(delta.x, delta.y, rect.height());
        }
        if response.hovered() {
            let (scroll, pinch) = ui.input(|i| (i.smooth_scroll_delta.y, i.zoom_delta()));
            if scroll.abs() > 0.1 {
                controls.scroll(scroll);
            }
            if pinch != 1.0 {
                controls.zoom(pinch.ln());
            }
        }
        if response.double_clicked() {
            controls.reset();
        }

        // ── Resize, then tick ───────────────────────────
        let ppp = ui.ctx().pixels_per_point();
        runtime.resize(SurfaceSize::new(
            (rect.width() * ppp).round() as u32,
            (rect.height() * ppp).round() as u32,
        ));
        runtime.tick();
        if runtime.needs_tick() {
            ui.ctx().request_repaint();
        }

        if !ui.is_rect_visible(rect) {
            return;
        }

        if let Some(gl_renderer) = &self.gl_renderer {
            let renderer = Arc::clone(gl_renderer);
            let callback = egui::PaintCallback {
                rect,
                callback: Arc::new(eframe::egui_glow::CallbackFn::new(move |info, painter| {
                    let vp = info.viewport_in_pixels();
                    let clip = info.clip_rect_in_pixels();
                    let viewport = [vp.left_px, vp.from_bottom_px, vp.width_px, vp.height_px];
                    let clip = [clip.left_px, clip.from_bottom_px, clip.width_px, clip.height_px];
                    match renderer.lock() {
                        Ok(r) => r.paint(painter.gl(), viewport, clip),
                        Err(_) => tracing::error!("GL renderer lock poisoned"),
                    }
                })),
            };
            ui.painter().add(callback);
        }

        if runtime.state().mesh().is_none() && !runtime.is_loading() {
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "Open an STL file (Ctrl+O)",
                egui::FontId::proportional(14.0),
                egui::Color32::from_rgb(100, 100, 110),
            );
        }
    }
}
