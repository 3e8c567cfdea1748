pub mod banner;
pub mod chat_area;
pub mod group_panel;
pub mod input_bar;
pub mod login;
pub mod sidebar;
