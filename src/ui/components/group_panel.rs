//! Create-group and manage-group windows.

use eframe::egui;

use crate::common::UserProfile;
use crate::sync::groups::{addable_users, matches_search};
use crate::ui::state::AppState;

#[derive(Default)]
pub struct CreateActions {
    pub create: bool,
    pub close: bool,
}

pub fn render_create(ctx: &egui::Context, state: &mut AppState) -> CreateActions {
    let mut actions = CreateActions::default();
    let candidates: Vec<UserProfile> = state.group_candidates().into_iter().cloned().collect();
    let busy = state.group_busy;
    let Some(form) = state.group_form.as_mut() else {
        return actions;
    };

    let mut open = true;
    egui::Window::new("Create Group Chat")
        .open(&mut open)
        .collapsible(false)
        .show(ctx, |ui| {
            if let Some(error) = &form.error {
                ui.colored_label(egui::Color32::from_rgb(185, 28, 28), error);
            }
            ui.add(egui::TextEdit::singleline(&mut form.name).hint_text("Enter group name..."));
            ui.add(egui::TextEdit::singleline(&mut form.search).hint_text("Search users..."));
            ui.label(format!("Selected: {}", form.selected.len()));

            egui::ScrollArea::vertical().max_height(220.0).show(ui, |ui| {
                for user in &candidates {
                    let mut checked = form.selected.contains(&user.id);
                    if ui
                        .checkbox(&mut checked, format!("{} ({})", user.name, user.email))
                        .changed()
                    {
                        if checked {
                            form.selected.push(user.id.clone());
                        } else {
                            form.selected.retain(|id| id != &user.id);
                        }
                    }
                }
            });

            ui.horizontal(|ui| {
                let ready = !busy && !form.name.trim().is_empty() && form.selected.len() >= 2;
                if ui.add_enabled(ready, egui::Button::new("Create Group")).clicked() {
                    actions.create = true;
                }
                if busy {
                    ui.spinner();
                }
                if ui.button("Cancel").clicked() {
                    actions.close = true;
                }
            });
        });

    actions.close |= !open;
    actions
}

#[derive(Default)]
pub struct ManageActions {
    pub rename: bool,
    pub add: Option<String>,
    pub remove: Option<String>,
    pub close: bool,
}

pub fn render_manage(ctx: &egui::Context, state: &mut AppState) -> ManageActions {
    let mut actions = ManageActions::default();
    let self_id = state.self_id().to_string();
    let busy = state.group_busy;
    let (Some(view), Some(manage)) = (state.view.as_ref(), state.manage.as_mut()) else {
        return actions;
    };
    let conversation = view.conversation();
    if !conversation.is_group {
        return actions;
    }
    let is_admin = conversation.is_admin(&self_id);

    let mut open = true;
    egui::Window::new(conversation.display_name(&self_id))
        .id(egui::Id::new("manage_group"))
        .open(&mut open)
        .collapsible(false)
        .show(ctx, |ui| {
            if let Some(admin) = &conversation.group_admin {
                ui.label(format!("Admin: {}", admin.name));
            }
            ui.separator();

            ui.strong(format!("Members ({})", conversation.users.len()));
            for member in &conversation.users {
                ui.horizontal(|ui| {
                    ui.label(&member.name);
                    if conversation.is_admin(&member.id) {
                        ui.label(egui::RichText::new("Admin").small().weak());
                    } else if is_admin
                        && ui
                            .add_enabled(!busy, egui::Button::new("Remove").small())
                            .clicked()
                    {
                        actions.remove = Some(member.id.clone());
                    }
                });
            }

            if !is_admin {
                return;
            }

            ui.separator();
            ui.horizontal(|ui| {
                ui.add(egui::TextEdit::singleline(&mut manage.rename).hint_text("New group name"));
                if ui.add_enabled(!busy, egui::Button::new("Rename")).clicked() {
                    actions.rename = true;
                }
            });

            ui.separator();
            ui.add(egui::TextEdit::singleline(&mut manage.search).hint_text("Search users to add..."));
            egui::ScrollArea::vertical().max_height(160.0).show(ui, |ui| {
                for user in addable_users(conversation, &state.users) {
                    if !matches_search(user, &manage.search) {
                        continue;
                    }
                    ui.horizontal(|ui| {
                        ui.label(format!("{} ({})", user.name, user.email));
                        if ui.add_enabled(!busy, egui::Button::new("Add").small()).clicked() {
                            actions.add = Some(user.id.clone());
                        }
                    });
                }
            });
        });

    actions.close |= !open;
    actions
}
