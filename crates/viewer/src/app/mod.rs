//! Main application module

mod keyboard;
mod menus;
mod styles;

use eframe::egui;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;

use stl_viewer_lib::{LoadEvent, MeshSource, ViewerConfig};

use crate::ui::status_bar::{self, StatusLine};
use crate::viewport::ViewportPanel;

/// Main application
pub struct ViewerApp {
    viewport: ViewportPanel,
    status: StatusLine,
    events: Option<UnboundedReceiver<LoadEvent>>,
}

impl ViewerApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        tasks: Handle,
        config: ViewerConfig,
        initial: Option<MeshSource>,
    ) -> Self {
        styles::configure_styles(&cc.egui_ctx);

        let mut viewport = ViewportPanel::new(cc.gl.clone(), tasks, config);
        let events = viewport.subscribe();

        let mut status = StatusLine::default();
        if let Some(error) = viewport.mount_error() {
            status.error = Some(error.to_string());
        }

        if let Some(source) = initial {
            viewport.request(Some(source));
        }

        Self {
            viewport,
            status,
            events,
        }
    }

    fn drain_events(&mut self) {
        let Some(events) = self.events.as_mut() else {
            return;
        };
        while let Ok(event) = events.try_recv() {
            self.status.apply(&event);
        }
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();
        keyboard::handle_keyboard(ctx, &mut self.viewport);

        // ── Menu bar ──────────────────────────────────────────
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                menus::file_menu(ui, &mut self.viewport);
                menus::view_menu(ui, &mut self.viewport);
            });
        });

        // ── Status bar ───────────────────────────────────────
        egui::TopBottomPanel::bottom("status_bar")
            .exact_height(22.0)
            .frame(
                egui::Frame::side_top_panel(&ctx.style()).inner_margin(egui::Margin::symmetric(8, 2)),
            )
            .show(ctx, |ui| {
                status_bar::show(ui, &self.status);
            });

        // ── Central panel: 3D viewport ───────────────────────
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                self.viewport.show(ui);
            });
    }

    fn on_exit(&mut self, _gl: Option<&glow::Context>) {
        self.viewport.teardown();
    }
}
