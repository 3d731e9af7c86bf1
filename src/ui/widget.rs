use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use crate::display::WidgetData;
use crate::ui::Theme;

/// Render the backlog table with its "Calculated" footer.
pub fn render(frame: &mut Frame, data: Option<&WidgetData>, theme: &Theme, area: Rect) {
    let [body, footer] = Layout::vertical([Constraint::Min(3), Constraint::Length(1)]).areas(area);

    let Some(data) = data else {
        render_message(frame, theme, body, "Loading...", theme.border);
        return;
    };

    match &data.snapshot {
        None => render_message(frame, theme, body, "No data yet", theme.border),
        Some(snapshot) if snapshot.incidents.is_empty() => {
            render_message(frame, theme, body, "No delays detected", theme.healthy)
        }
        Some(_) => render_table(frame, data, theme, body),
    }

    if let Some(at) = data.calculated_at() {
        let line = Line::from(Span::styled(format!(" Calculated: {}", at), theme.muted));
        frame.render_widget(Paragraph::new(line), footer);
    }
}

fn render_table(frame: &mut Frame, data: &WidgetData, theme: &Theme, area: Rect) {
    let rows = data.rows();
    let total = rows.len();
    let style = theme.row_style(true);

    let header = Row::new(vec![
        Cell::from("Campaign"),
        Cell::from("Event"),
        Cell::from("Type"),
        Cell::from("Contacts"),
        Cell::from("Delay"),
    ])
    .height(1)
    .style(theme.header);

    let visible: Vec<Row> = rows
        .into_iter()
        .take(data.visible_rows())
        .map(|row| {
            Row::new(vec![
                Cell::from(row.campaign).style(Style::default().add_modifier(Modifier::BOLD)),
                Cell::from(row.event),
                Cell::from(row.sub_type).style(theme.muted),
                Cell::from(row.contacts.to_string()),
                Cell::from(row.delay).style(style),
            ])
        })
        .collect();

    let widths = [
        Constraint::Fill(3),    // Campaign
        Constraint::Fill(3),    // Event
        Constraint::Length(10), // Type
        Constraint::Length(9),  // Contacts
        Constraint::Length(9),  // Delay
    ];

    let shown = visible.len();
    let title = if shown < total {
        format!(" Backlog ({} delayed, {} shown) ", total, shown)
    } else {
        format!(" Backlog ({} delayed) ", total)
    };

    let table = Table::new(visible, widths).header(header).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_type(theme.border_type)
            .border_style(Style::default().fg(theme.critical)),
    );

    frame.render_widget(table, area);
}

fn render_message(
    frame: &mut Frame,
    theme: &Theme,
    area: Rect,
    message: &str,
    color: ratatui::style::Color,
) {
    let block = Block::default()
        .title(" Backlog ")
        .borders(Borders::ALL)
        .border_type(theme.border_type)
        .border_style(Style::default().fg(color));

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("  {}", message),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )),
    ];

    frame.render_widget(Paragraph::new(lines).block(block), area);
}
