use eframe::egui;

use crate::ui::state::AuthForm;

/// Sign-in / sign-up form. Returns `true` when the user submits.
pub fn render(ui: &mut egui::Ui, auth: &mut AuthForm, busy: bool, notice: Option<&str>) -> bool {
    let mut submit = false;

    ui.vertical_centered(|ui| {
        ui.add_space(40.0);
        ui.heading("TalkSync");
        ui.label(if auth.registering {
            "Create an account"
        } else {
            "Sign in to continue"
        });
        ui.add_space(12.0);

        if let Some(notice) = notice {
            ui.colored_label(egui::Color32::from_rgb(22, 163, 74), notice);
            ui.add_space(8.0);
        }

        if auth.registering {
            ui.add(egui::TextEdit::singleline(&mut auth.name).hint_text("Name"));
        }
        ui.add(egui::TextEdit::singleline(&mut auth.email).hint_text("Email"));
        let password = ui.add(
            egui::TextEdit::singleline(&mut auth.password)
                .password(true)
                .hint_text("Password"),
        );
        if password.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
            submit = true;
        }

        ui.add_space(8.0);
        let label = if auth.registering { "Register" } else { "Login" };
        if ui.add_enabled(!busy, egui::Button::new(label)).clicked() {
            submit = true;
        }
        if busy {
            ui.spinner();
        }

        let toggle = if auth.registering {
            "Already have an account? Login"
        } else {
            "No account yet? Register"
        };
        if ui.link(toggle).clicked() {
            auth.registering = !auth.registering;
        }
    });

    submit && !busy
}
