//! Keyboard shortcut handling

use eframe::egui;

use super::menus;
use crate::viewport::ViewportPanel;

/// Handle keyboard shortcuts for the application
pub fn handle_keyboard(ctx: &egui::Context, viewport: &mut ViewportPanel) {
    // Don't handle shortcuts when a text field is focused
    if ctx.memory(|m| m.focused().is_some()) {
        return;
    }

    let (open, reset, clear) = ctx.input(|i| {
        (
            // Ctrl+O: open
            i.modifiers.command && i.key_pressed(egui::Key::O),
            // R: reset camera
            !i.modifiers.command && i.key_pressed(egui::Key::R),
            // Delete: clear
            i.key_pressed(egui::Key::Delete),
        )
    });

    // The file dialog blocks, so it runs outside the input lock.
    if open {
        menus::open_file(viewport);
    }
    if reset {
        viewport.reset_camera();
    }
    if clear {
        viewport.request(None);
    }
}
