use egui::Ui;

use stl_viewer_lib::LoadEvent;

/// What the status bar shows, folded from load notifications.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StatusLine {
    /// Source of the most recent request
    pub source: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
    /// Triangle count of the displayed mesh
    pub triangles: Option<usize>,
}

impl StatusLine {
    pub fn apply(&mut self, event: &LoadEvent) {
        match event {
            LoadEvent::Started { source, .. } => {
                self.source = Some(source.clone());
                self.loading = true;
                self.error = None;
            }
            LoadEvent::Succeeded { triangles, .. } => {
                self.loading = false;
                self.triangles = Some(*triangles);
            }
            LoadEvent::Failed { reason, .. } => {
                // Previous mesh, if any, stays displayed.
                self.loading = false;
                self.error = Some(reason.clone());
            }
            LoadEvent::Cleared => *self = Self::default(),
        }
    }
}

pub fn show(ui: &mut Ui, status: &StatusLine) {
    ui.horizontal(|ui| {
        match &status.source {
            Some(source) if status.loading => {
                ui.add(egui::Spinner::new().size(12.0));
                ui.label(format!("Loading from: {source}"));
            }
            Some(source) => {
                ui.weak(source);
            }
            None => {
                ui.weak("No mesh");
            }
        }

        if let Some(error) = &status.error {
            ui.separator();
            ui.colored_label(egui::Color32::from_rgb(220, 60, 60), error);
        }

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if let Some(triangles) = status.triangles {
                ui.weak(format!("Triangles: {triangles}"));
            }
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_keeps_triangle_count() {
        let mut status = StatusLine::default();
        status.apply(&LoadEvent::Started {
            request: 1,
            source: "a.stl".into(),
        });
        assert!(status.loading);
        status.apply(&LoadEvent::Succeeded {
            request: 1,
            source: "a.stl".into(),
            triangles: 12,
        });
        status.apply(&LoadEvent::Started {
            request: 2,
            source: "b.stl".into(),
        });
        status.apply(&LoadEvent::Failed {
            request: 2,
            source: "b.stl".into(),
            reason: "decode failed".into(),
        });

        assert!(!status.loading);
        assert_eq!(status.triangles, Some(12));
        assert_eq!(status.error.as_deref(), Some("decode failed"));
    }

    #[test]
    fn test_cleared_resets() {
        let mut status = StatusLine::default();
        status.apply(&LoadEvent::Started {
            request: 1,
            source: "a.stl".into(),
        });
        status.apply(&LoadEvent::Cleared);
        assert_eq!(status, StatusLine::default());
    }
}
