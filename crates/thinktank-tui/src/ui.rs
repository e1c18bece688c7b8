use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};
use thinktank_core::{AgentState, Message, MessageKind, Sender};

use crate::app::{App, FormField, Overlay, PROJECT_TASK_COUNT};

/// Style `**bold**` and `` `code` `` spans in one line of assistant output.
/// Markdown headings are shown bold without their `#` prefix.
fn parse_markdown_line(text: &str) -> Line<'static> {
    let heading = text.trim_start().starts_with('#');
    let body = if heading {
        text.trim_start().trim_start_matches('#').trim_start()
    } else {
        text
    };
    let base = if heading {
        Style::default().add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = body;
    while !rest.is_empty() {
        let bold_at = rest.find("**");
        let code_at = rest.find('`');
        let (start, marker) = match (bold_at, code_at) {
            (Some(b), Some(c)) if c < b => (c, "`"),
            (Some(b), _) => (b, "**"),
            (None, Some(c)) => (c, "`"),
            (None, None) => break,
        };

        let after = &rest[start + marker.len()..];
        let Some(end) = after.find(marker) else {
            break;
        };

        if start > 0 {
            spans.push(Span::styled(rest[..start].to_string(), base));
        }
        let inner = after[..end].to_string();
        let style = if marker == "`" {
            base.fg(Color::Magenta)
        } else {
            base.add_modifier(Modifier::BOLD)
        };
        spans.push(Span::styled(inner, style));
        rest = &after[end + marker.len()..];
    }

    // Unclosed markers stay literal
    if !rest.is_empty() {
        spans.push(Span::styled(rest.to_string(), base));
    }

    Line::from(spans)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    let [chat_column, side_column] =
        Layout::horizontal([Constraint::Percentage(70), Constraint::Percentage(30)])
            .areas(body_area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_column);
    render_sidebar(app, frame, side_column);
    render_footer(app, frame, footer_area);

    if app.overlay == Overlay::NewProject {
        render_project_form(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" AI Think Tank ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{} ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
        Span::styled(app.api_url.clone(), Style::default().fg(Color::Gray)),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn message_lines(msg: &Message, lines: &mut Vec<Line<'static>>) {
    match (msg.sender, msg.kind) {
        (Sender::User, _) => {
            lines.push(Line::from(Span::styled(
                "You:",
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            )));
            for line in msg.content.lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
        (Sender::Assistant, MessageKind::Error) => {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )));
            for line in msg.content.lines() {
                lines.push(Line::from(Span::styled(
                    line.to_string(),
                    Style::default().fg(Color::Red),
                )));
            }
        }
        (Sender::Assistant, MessageKind::Normal) => {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            )));
            for line in msg.content.lines() {
                lines.push(parse_markdown_line(line));
            }
        }
    }
    lines.push(Line::default());
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let [messages_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(area);

    // Inner size minus borders, for scroll calculations
    app.chat_height = messages_area.height.saturating_sub(2);
    app.chat_width = messages_area.width.saturating_sub(2);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Conversation ");

    let processing = app.session.is_processing();
    let text = if app.session.messages().is_empty() && !processing {
        Text::from(Span::styled(
            "Describe your project idea and the think tank will plan it...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();
        for msg in app.session.messages() {
            message_lines(msg, &mut lines);
        }

        if processing {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }
        Text::from(lines)
    };

    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, messages_area);

    let input_border = if processing { Color::DarkGray } else { Color::Yellow };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_border))
        .title(if processing { " Waiting for reply " } else { " Message " });

    let input = Paragraph::new(app.input.as_str()).block(input_block);
    frame.render_widget(input, input_area);

    if app.overlay == Overlay::None {
        let inner_width = input_area.width.saturating_sub(2) as usize;
        let cursor_x = app.input_cursor.min(inner_width) as u16;
        frame.set_cursor_position((input_area.x + 1 + cursor_x, input_area.y + 1));
    }
}

fn render_sidebar(app: &App, frame: &mut Frame, area: Rect) {
    let agent_rows = app.session.board().statuses().len() as u16;
    let [agents_area, project_area, _] = Layout::vertical([
        Constraint::Length(agent_rows + 2),
        Constraint::Length(6),
        Constraint::Min(0),
    ])
    .areas(area);

    let items: Vec<ListItem> = app
        .session
        .board()
        .statuses()
        .iter()
        .map(|status| {
            let (marker, color) = match status.state {
                AgentState::Pending => ("○", Color::DarkGray),
                AgentState::Active => ("◐", Color::Blue),
                AgentState::Completed => ("●", Color::Green),
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!(" {} ", marker), Style::default().fg(color)),
                Span::raw(format!("{:<12}", status.agent.display_name())),
                Span::styled(status.state.label(), Style::default().fg(color)),
            ]))
        })
        .collect();

    let agents = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta))
            .title(" Agents "),
    );
    frame.render_widget(agents, agents_area);

    let label = Style::default().fg(Color::DarkGray);
    let updated = app
        .project_updated_at
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    let project_id = app
        .session
        .current_project_id()
        .map(|id| format!("#{}", id))
        .unwrap_or_else(|| "-".to_string());
    let status_style = if app.session.current_project_id().is_some() {
        Style::default().fg(Color::Blue)
    } else {
        Style::default()
    };

    let info = Paragraph::new(vec![
        Line::from(vec![Span::styled("Project: ", label), Span::raw(project_id)]),
        Line::from(vec![
            Span::styled("Status:  ", label),
            Span::styled(app.project_status_label(), status_style),
        ]),
        Line::from(vec![Span::styled("Updated: ", label), Span::raw(updated)]),
        Line::from(vec![
            Span::styled("Tasks:   ", label),
            Span::raw(PROJECT_TASK_COUNT.to_string()),
        ]),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(" Project "),
    );
    frame.render_widget(info, project_area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    if let Some(notice) = &app.notice {
        let line = Paragraph::new(format!(" {}", notice))
            .style(Style::default().bg(Color::Yellow).fg(Color::Black));
        frame.render_widget(line, area);
        return;
    }

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let keys: &[(&str, &str)] = match app.overlay {
        Overlay::NewProject => &[("Tab", "field"), ("Enter", "create"), ("Esc", "cancel")],
        Overlay::None => &[
            ("Enter", "send"),
            ("PgUp/PgDn", "scroll"),
            ("^N", "new project"),
            ("^P", "projects"),
            ("^D", "demo"),
            ("Esc", "quit"),
        ],
    };

    let mut spans = Vec::new();
    for (key, label) in keys {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }
    if app.simulation.is_some() {
        spans.push(Span::styled(" demo running ", Style::default().fg(Color::Blue)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_project_form(app: &App, frame: &mut Frame, area: Rect) {
    let form = &app.project_form;

    // Calculate popup size and position (centered)
    let popup_width = 60.min(area.width.saturating_sub(4));
    let popup_height = 10;
    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" New Project ");
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let field_style = |field: FormField| {
        if form.field == field {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        }
    };

    let rows = [
        ("Name", &form.name, FormField::Name, 1),
        ("Description", &form.description, FormField::Description, 4),
    ];
    for (label, value, field, y) in rows {
        let label_area = Rect::new(inner.x, inner.y + y - 1, inner.width, 1);
        let value_area = Rect::new(inner.x, inner.y + y, inner.width, 1);
        frame.render_widget(Paragraph::new(label).style(field_style(field)), label_area);
        frame.render_widget(Paragraph::new(value.as_str()), value_area);

        if form.field == field {
            let cursor_x = value.chars().count().min(inner.width as usize) as u16;
            frame.set_cursor_position((value_area.x + cursor_x, value_area.y));
        }
    }

    let status_area = Rect::new(inner.x, inner.y + inner.height.saturating_sub(1), inner.width, 1);
    let status = match &form.error {
        Some(err) => Paragraph::new(err.as_str()).style(Style::default().fg(Color::Red)),
        None => Paragraph::new("Enter to create, Esc to cancel")
            .style(Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(status, status_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;
    use ratatui::{backend::TestBackend, Terminal};
    use thinktank_core::NewProject;

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        let mut text = String::new();
        for (i, cell) in buffer.content.iter().enumerate() {
            text.push_str(cell.symbol());
            if (i + 1) % width == 0 {
                text.push('\n');
            }
        }
        text
    }

    #[test]
    fn test_markdown_bold_and_code() {
        let line = parse_markdown_line("Use **Rust** with `tokio` now");
        assert_eq!(line_text(&line), "Use Rust with tokio now");
        assert_eq!(line.spans.len(), 5);
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(line.spans[3].style.fg, Some(Color::Magenta));
    }

    #[test]
    fn test_markdown_unclosed_marker_is_literal() {
        let line = parse_markdown_line("a **b c");
        assert_eq!(line_text(&line), "a **b c");
    }

    #[test]
    fn test_markdown_heading() {
        let line = parse_markdown_line("## Plan");
        assert_eq!(line_text(&line), "Plan");
        assert!(line.spans[0].style.add_modifier.contains(Modifier::BOLD));
    }

    #[tokio::test]
    async fn test_render_shows_agents_and_messages() {
        let (mut app, _api, _rx) = test_app(false);
        app.session
            .create_project(&NewProject {
                name: "Alpha".to_string(),
                description: String::new(),
            })
            .unwrap();

        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|f| render(&mut app, f)).unwrap();

        let screen = screen_text(&terminal);
        for name in ["ChiefMind", "TaskPlanner", "Researcher", "PRDWriter", "ToolFinder"] {
            assert!(screen.contains(name), "missing {}", name);
        }
        assert!(screen.contains("Alpha"));
        assert!(screen.contains("not started"));
        assert!(app.chat_height > 0);
    }

    #[tokio::test]
    async fn test_render_project_popup() {
        let (mut app, _api, _rx) = test_app(false);
        app.open_project_form();
        app.project_form.error = Some("Please enter a project name".to_string());

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| render(&mut app, f)).unwrap();

        let screen = screen_text(&terminal);
        assert!(screen.contains("New Project"));
        assert!(screen.contains("Please enter a project name"));
    }
}
