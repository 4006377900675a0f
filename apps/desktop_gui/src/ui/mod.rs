//! UI layer for desktop GUI: app shell, control and admin screens.

pub mod app;
pub mod log_view;
