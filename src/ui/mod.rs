//! Dashboard rendering.

pub mod common;
pub mod theme;
pub mod widget;

pub use theme::Theme;

use ratatui::{
    layout::{Constraint, Layout},
    Frame,
};

use crate::app::App;

/// Draw the whole dashboard: header, widget, status bar.
pub fn draw(frame: &mut Frame, app: &App) {
    let [header, body, status] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(4),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    common::render_header(frame, app, header);
    widget::render(frame, app.data.as_ref(), &app.theme, body);
    common::render_status_bar(frame, app, status);
}
