use eframe::egui;
use tokio::sync::mpsc;

use crate::common::{NetworkCommand, NetworkEvent};
use crate::config::AppConfig;

use super::components::{
    banner::{self, BannerAction},
    chat_area, group_panel, input_bar, login,
    sidebar::{self, SidebarActions},
};
use super::state::{AppState, GroupForm, ManageGroup};

pub struct ChatApp {
    state: AppState,
    config: AppConfig,
    command_sender: mpsc::Sender<NetworkCommand>,
    event_receiver: mpsc::Receiver<NetworkEvent>,
}

impl ChatApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        config: AppConfig,
        command_sender: mpsc::Sender<NetworkCommand>,
        event_receiver: mpsc::Receiver<NetworkEvent>,
    ) -> Self {
        Self {
            state: AppState::new(),
            config,
            command_sender,
            event_receiver,
        }
    }

    fn handle_network_events(&mut self) {
        while let Ok(event) = self.event_receiver.try_recv() {
            for command in self.state.apply(event) {
                self.send_command(command);
            }
        }
    }

    fn send_command(&self, command: NetworkCommand) {
        if let Err(err) = self.command_sender.try_send(command) {
            log::warn!("Failed to send command to network: {err}");
        }
    }

    fn send_all(&self, commands: impl IntoIterator<Item = NetworkCommand>) {
        for command in commands {
            self.send_command(command);
        }
    }

    fn render_banner(&mut self, ctx: &egui::Context) {
        let Some(current) = &self.state.banner else {
            return;
        };
        let mut action = BannerAction::None;
        egui::TopBottomPanel::top("error_banner").show(ctx, |ui| {
            action = banner::render(ui, current);
        });
        match action {
            BannerAction::Retry => {
                let command = self.state.retry();
                self.send_all(command);
            }
            BannerAction::Dismiss => self.state.banner = None,
            BannerAction::None => {}
        }
    }

    fn render_login(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let notice = self.state.notice.clone();
            if login::render(ui, &mut self.state.auth, self.state.busy, notice.as_deref()) {
                let command = self.state.login();
                self.send_all(command);
            }
        });
    }

    fn render_chats(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("conversation_sidebar")
            .resizable(true)
            .default_width(260.0)
            .show(ctx, |ui| {
                let actions: SidebarActions = sidebar::render(ui, &self.state);
                if actions.logout {
                    self.send_command(NetworkCommand::Logout);
                }
                if actions.new_group {
                    self.state.group_form = Some(GroupForm::default());
                }
                if let Some(user_id) = actions.start_chat {
                    let command = self.state.start_chat(&user_id);
                    self.send_all(command);
                }
                if let Some(conversation) = actions.open {
                    let commands = self.state.open_conversation(conversation);
                    self.send_all(commands);
                }
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(view) = &self.state.view else {
                ui.centered_and_justified(|ui| {
                    ui.label("Select a conversation to start chatting");
                });
                return;
            };

            let self_id = self.state.self_id().to_string();
            let conversation = view.conversation();
            let mut close = false;
            let mut manage = false;
            ui.horizontal(|ui| {
                ui.heading(conversation.display_name(&self_id));
                if !conversation.is_group && self.state.list.partner_online(conversation) {
                    ui.colored_label(egui::Color32::GREEN, "online");
                }
                if let Some(label) = view.typing_label() {
                    ui.label(egui::RichText::new(label).italics().weak());
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Close").clicked() {
                        close = true;
                    }
                    if conversation.is_group && ui.button("Group settings").clicked() {
                        manage = true;
                    }
                });
            });
            ui.separator();

            let input_height = 64.0;
            let config = &self.config;
            ui.allocate_ui(
                egui::vec2(ui.available_width(), ui.available_height() - input_height),
                |ui| {
                    chat_area::render(ui, view, &self_id, self.state.loading_history, &|url| {
                        config.file_url(url)
                    });
                },
            );

            ui.separator();
            let actions = input_bar::render(ui, &mut self.state.compose);
            if let Some(index) = actions.remove {
                self.state.remove_attachment(index);
            }
            if actions.attach {
                self.state.attach_file();
            }
            if actions.keystroke {
                self.send_all(self.state.keystroke());
            }
            if actions.submit {
                let command = self.state.submit();
                self.send_all(command);
            }
            if manage {
                self.state.manage = Some(ManageGroup::default());
            }
            if close {
                let command = self.state.close_conversation();
                self.send_all(command);
            }
        });

        let create = group_panel::render_create(ctx, &mut self.state);
        if create.create {
            let command = self.state.create_group();
            self.send_all(command);
        }
        if create.close {
            self.state.group_form = None;
        }

        let managed = group_panel::render_manage(ctx, &mut self.state);
        if managed.rename {
            let command = self.state.rename_group();
            self.send_all(command);
        }
        if let Some(user_id) = managed.add {
            let command = self.state.add_member(&user_id);
            self.send_all(command);
        }
        if let Some(user_id) = managed.remove {
            let command = self.state.remove_member(&user_id);
            self.send_all(command);
        }
        if managed.close {
            self.state.manage = None;
        }
    }
}

impl eframe::App for ChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_network_events();
        self.render_banner(ctx);

        if self.state.profile.is_some() {
            self.render_chats(ctx);
        } else {
            self.render_login(ctx);
        }

        ctx.request_repaint();
    }
}
