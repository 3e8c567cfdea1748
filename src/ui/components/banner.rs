use eframe::egui;

use crate::ui::state::Banner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerAction {
    None,
    Retry,
    Dismiss,
}

pub fn render(ui: &mut egui::Ui, banner: &Banner) -> BannerAction {
    let mut action = BannerAction::None;
    ui.horizontal(|ui| {
        ui.colored_label(egui::Color32::from_rgb(220, 38, 38), "⚠");
        ui.label(egui::RichText::new(&banner.message).color(egui::Color32::from_rgb(185, 28, 28)));
        if banner.retry.is_some() && ui.button("Retry").clicked() {
            action = BannerAction::Retry;
        }
        if ui.small_button("✖").clicked() {
            action = BannerAction::Dismiss;
        }
    });
    action
}
