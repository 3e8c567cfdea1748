use eframe::egui;

use crate::sync::MAX_ATTACHMENT_BYTES;
use crate::ui::state::Compose;

#[derive(Default)]
pub struct InputActions {
    pub submit: bool,
    pub keystroke: bool,
    pub attach: bool,
    pub remove: Option<usize>,
}

pub fn render(ui: &mut egui::Ui, compose: &mut Compose) -> InputActions {
    let mut actions = InputActions::default();
    let sending = compose.sending.is_some();

    if !compose.files.is_empty() {
        ui.horizontal_wrapped(|ui| {
            for (index, file) in compose.files.iter().enumerate() {
                ui.label(format!("📎 {} ({} KB)", file.file_name, file.size.div_ceil(1024)));
                if ui.small_button("✖").clicked() {
                    actions.remove = Some(index);
                }
            }
        });
    }

    ui.horizontal(|ui| {
        ui.add(
            egui::TextEdit::singleline(&mut compose.attach_path)
                .hint_text(format!(
                    "File path to attach (max {} MB)",
                    MAX_ATTACHMENT_BYTES / (1024 * 1024)
                ))
                .desired_width(160.0),
        );
        if ui.add_enabled(!sending, egui::Button::new("Attach")).clicked() {
            actions.attach = true;
        }

        let response = ui.add(
            egui::TextEdit::singleline(&mut compose.text)
                .hint_text("Type a message...")
                .desired_width(ui.available_width() - 70.0),
        );
        if response.changed() {
            actions.keystroke = true;
        }
        if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
            actions.submit = true;
        }

        if ui.add_enabled(!sending, egui::Button::new("Send")).clicked() {
            actions.submit = true;
        }
        if sending {
            ui.spinner();
        }
    });

    actions.submit &= !sending;
    actions
}
