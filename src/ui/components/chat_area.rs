use chrono::Utc;
use eframe::egui;

use crate::common::{AttachmentKind, ChatMessage};
use crate::sync::{ConversationView, message_time_label};

pub fn render(
    ui: &mut egui::Ui,
    view: &ConversationView,
    self_id: &str,
    loading: bool,
    resolve_url: &dyn Fn(&str) -> String,
) {
    if loading && view.is_empty() {
        ui.horizontal(|ui| {
            ui.spinner();
            ui.label("Loading messages...");
        });
    }

    let now = Utc::now();
    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .stick_to_bottom(true)
        .show(ui, |ui| {
            for message in view.messages() {
                render_message(ui, message, self_id, now, resolve_url);
            }
        });
}

fn render_message(
    ui: &mut egui::Ui,
    message: &ChatMessage,
    self_id: &str,
    now: chrono::DateTime<Utc>,
    resolve_url: &dyn Fn(&str) -> String,
) {
    let own = message.sender.id == self_id;
    let layout = if own {
        egui::Layout::top_down(egui::Align::Max)
    } else {
        egui::Layout::top_down(egui::Align::Min)
    };

    ui.with_layout(layout, |ui| {
        let sender = if own { "You" } else { message.sender.name.as_str() };
        ui.label(
            egui::RichText::new(format!(
                "{sender} · {}",
                message_time_label(message.created_at, now)
            ))
            .small()
            .weak(),
        );
        if let Some(content) = message.content.as_deref().filter(|text| !text.is_empty()) {
            ui.label(content);
        }
        for attachment in &message.attachments {
            let icon = match attachment.kind() {
                AttachmentKind::Image => "🖼",
                AttachmentKind::Voice => "🎤",
                AttachmentKind::File => "📄",
            };
            ui.hyperlink_to(
                format!("{icon} {}", attachment.file_name),
                resolve_url(&attachment.url),
            );
        }
        ui.add_space(6.0);
    });
}
