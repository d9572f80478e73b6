//! Application menu bar

use eframe::egui;

use stl_viewer_lib::MeshSource;

use crate::viewport::ViewportPanel;

/// Show the file menu
pub fn file_menu(ui: &mut egui::Ui, viewport: &mut ViewportPanel) {
    ui.menu_button("File", |ui| {
        if ui.button("Open…").clicked() {
            ui.close_menu();
            open_file(viewport);
        }
        if ui
            .add_enabled(viewport.has_mesh(), egui::Button::new("Clear"))
            .clicked()
        {
            viewport.request(None);
            ui.close_menu();
        }
        ui.separator();
        if ui.button("Quit").clicked() {
            ui.ctx().send_viewport_cmd(egui::ViewportCommand::Close);
        }
    });
}

/// Show the view menu
pub fn view_menu(ui: &mut egui::Ui, viewport: &mut ViewportPanel) {
    ui.menu_button("View", |ui| {
        if ui.button("Reset camera").clicked() {
            viewport.reset_camera();
            ui.close_menu();
        }
        let mut spin = viewport.auto_rotate();
        if ui.checkbox(&mut spin, "Auto-rotate").changed() {
            viewport.set_auto_rotate(spin);
        }
    });
}

/// Pick an STL file and load it.
pub fn open_file(viewport: &mut ViewportPanel) {
    if let Some(path) = rfd::FileDialog::new()
        .set_title("Open STL mesh")
        .add_filter("STL", &["stl", "STL"])
        .pick_file()
    {
        tracing::info!("Opening {}", path.display());
        viewport.request(Some(MeshSource::Path(path)));
    }
}
