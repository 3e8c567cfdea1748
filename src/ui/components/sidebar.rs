use chrono::Utc;
use eframe::egui;

use crate::common::Conversation;
use crate::sync::recency_label;
use crate::ui::state::AppState;

#[derive(Default)]
pub struct SidebarActions {
    pub open: Option<Conversation>,
    pub start_chat: Option<String>,
    pub new_group: bool,
    pub logout: bool,
}

pub fn render(ui: &mut egui::Ui, state: &AppState) -> SidebarActions {
    let mut actions = SidebarActions::default();
    let self_id = state.self_id();

    ui.horizontal(|ui| {
        if let Some(profile) = &state.profile {
            ui.strong(&profile.name);
        }
        if ui.small_button("Logout").clicked() {
            actions.logout = true;
        }
    });
    ui.separator();

    ui.horizontal(|ui| {
        ui.heading("Chats");
        if ui.small_button("+ Group").clicked() {
            actions.new_group = true;
        }
    });

    let now = Utc::now();
    egui::ScrollArea::vertical()
        .id_salt("conversations")
        .max_height(ui.available_height() * 0.6)
        .show(ui, |ui| {
            if state.list.conversations().is_empty() {
                ui.label(egui::RichText::new("No conversations yet").weak());
            }
            for conversation in state.list.conversations() {
                let selected = state.open_id() == Some(conversation.id.as_str());
                ui.horizontal(|ui| {
                    if !conversation.is_group {
                        let online = state.list.partner_online(conversation);
                        let color = if online {
                            egui::Color32::GREEN
                        } else {
                            egui::Color32::GRAY
                        };
                        ui.colored_label(color, if online { "●" } else { "○" });
                    }

                    let mut title = conversation.display_name(self_id);
                    if conversation.unread > 0 {
                        title = format!("{title} ({})", conversation.unread);
                    }
                    if ui.selectable_label(selected, title).clicked() {
                        actions.open = Some(conversation.clone());
                    }
                    ui.label(
                        egui::RichText::new(recency_label(conversation.updated_at, now))
                            .small()
                            .weak(),
                    );
                });
                if let Some(latest) = &conversation.latest_message {
                    ui.label(egui::RichText::new(latest.preview()).small().weak());
                }
            }
        });

    ui.separator();
    ui.label("Start a chat:");
    egui::ScrollArea::vertical()
        .id_salt("people")
        .show(ui, |ui| {
            let available = state.list.available_users(&state.users);
            if available.is_empty() {
                ui.label(egui::RichText::new("Everyone is already in your list").weak());
            }
            for user in available {
                ui.horizontal(|ui| {
                    let starting = state.starting_chat.as_deref() == Some(user.id.as_str());
                    let enabled = state.starting_chat.is_none();
                    if ui
                        .add_enabled(enabled, egui::Button::new(&user.name))
                        .on_hover_text(&user.email)
                        .clicked()
                    {
                        actions.start_chat = Some(user.id.clone());
                    }
                    if starting {
                        ui.spinner();
                    }
                });
            }
        });

    actions
}
