//! Header and status bar shared by the dashboard layout.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::app::App;

/// Render the header bar with the overall health indicator.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let Some(snapshot) = app.data.as_ref().and_then(|d| d.snapshot.as_ref()) else {
        let line = Line::from(vec![
            Span::styled(" BACKLOGWATCH ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("│ No snapshot"),
        ]);
        frame.render_widget(Paragraph::new(line), area);
        return;
    };

    let incidents = snapshot.incidents.len();
    let status_style = app.theme.row_style(incidents > 0);

    let line = Line::from(vec![
        Span::styled(" ● ", status_style),
        Span::styled("BACKLOGWATCH ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        if incidents > 0 {
            Span::styled(incidents.to_string(), status_style)
        } else {
            Span::styled("0", Style::default().add_modifier(Modifier::DIM))
        },
        Span::raw(" delayed │ "),
        Span::styled(
            snapshot.measurements.len().to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(" measured"),
    ]);

    frame.render_widget(Paragraph::new(line), area);
}

/// Render the status bar at the bottom.
///
/// Shows a temporary status message or error if there is one, otherwise the
/// time since the cache was last read.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    let status = if let Some(ref err) = app.load_error {
        format!(" Error: {} | r:retry q:quit", err)
    } else if let Some(loaded) = app.last_loaded {
        format!(
            " Read {:.1}s ago | r:reload q:quit",
            loaded.elapsed().as_secs_f64()
        )
    } else {
        " Loading... | q:quit".to_string()
    };

    let paragraph = Paragraph::new(status).style(Style::default().add_modifier(Modifier::DIM));
    frame.render_widget(paragraph, area);
}
