use crate::app::{App, AppMode};
use crate::notify::Completion;
use focus_ipc::{TimerPhase, TimerStatus};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Gauge, Paragraph},
    Frame,
};

pub fn draw(f: &mut Frame, app: &App) {
    let status = app.status();
    let area = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(7),
            Constraint::Length(1),
        ])
        .split(area);

    draw_header(f, chunks[0], app);
    draw_timer(f, chunks[1], app, &status);
    draw_status_bar(f, chunks[2], app);

    match &app.mode {
        AppMode::ShowHelp => draw_help_overlay(f, app),
        AppMode::Completed(completion) => draw_completed_overlay(f, app, completion),
        AppMode::Normal => {}
    }
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.config.theme;
    let icons = &app.config.icons;
    let text = Line::from(vec![
        Span::raw(icons.header_left.clone()),
        Span::styled(
            "FOCUS",
            Style::default().fg(theme.blue).add_modifier(Modifier::BOLD),
        ),
        Span::raw(icons.header_right.clone()),
    ]);
    f.render_widget(
        Paragraph::new(text).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(Style::default().fg(theme.black)),
        ),
        area,
    );
}

fn draw_timer(f: &mut Frame, area: Rect, app: &App, status: &TimerStatus) {
    let theme = &app.config.theme;
    let icons = &app.config.icons;
    let (state_icon, state_color) = match status.phase {
        TimerPhase::Running => (&icons.play, theme.green),
        TimerPhase::Paused => (&icons.pause, theme.yellow),
        TimerPhase::Idle => (&icons.stop, theme.gray),
    };

    let block = Block::default()
        .title(Span::styled(
            format!(" {} Focus ", icons.timer),
            Style::default().fg(theme.gray),
        ))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(state_color));
    let inner_area = block.inner(area);
    f.render_widget(block, area);

    let v_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner_area);

    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(format!("{} ", state_icon), Style::default().fg(state_color)),
            Span::styled(
                format_mmss(status.remaining_seconds),
                Style::default()
                    .fg(theme.foreground)
                    .add_modifier(Modifier::BOLD),
            ),
        ]))
        .alignment(Alignment::Center),
        v_chunks[0],
    );
    f.render_widget(
        Paragraph::new(format!(
            "{} {} of {}",
            status.phase,
            icons.separator,
            format_mmss(status.run_seconds)
        ))
        .style(Style::default().fg(theme.gray))
        .alignment(Alignment::Center),
        v_chunks[1],
    );
    f.render_widget(
        Gauge::default()
            .gauge_style(Style::default().fg(theme.blue).bg(theme.black))
            .label(progress_bar(
                status.progress(),
                10,
                &icons.progress_filled,
                &icons.progress_empty,
            ))
            .ratio(status.progress()),
        v_chunks[2],
    );
}

fn draw_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.config.theme;
    let (mode_text, mode_color) = match app.mode {
        AppMode::Normal => ("NORMAL", theme.green),
        AppMode::ShowHelp => ("HELP", theme.magenta),
        AppMode::Completed(_) => ("DONE", theme.blue),
    };
    let mut spans = vec![
        Span::styled(
            format!(" {} ", mode_text),
            Style::default()
                .bg(mode_color)
                .fg(theme.background)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
    ];
    match &app.message {
        Some(message) => spans.push(Span::styled(message.clone(), Style::default().fg(theme.red))),
        None => spans.push(Span::raw(
            "space:start/pause │ s:stop │ r:reset │ +:1m │ ]/[:±5m │ ?:help │ q:quit",
        )),
    }
    f.render_widget(
        Paragraph::new(Line::from(spans))
            .block(Block::default().style(Style::default().bg(theme.black).fg(theme.gray))),
        area,
    );
}

fn draw_help_overlay(f: &mut Frame, app: &App) {
    let theme = &app.config.theme;
    let area = centered_rect(60, 70, f.area());
    f.render_widget(Clear, area);

    let shortcuts = [
        ("space", "Start / pause / resume"),
        ("s", "Stop"),
        ("r", "Reset to default"),
        ("+", "Add one minute"),
        ("]", "Add five minutes"),
        ("[", "Subtract five minutes"),
        ("?", "Toggle help"),
        ("q", "Quit"),
    ];
    let lines: Vec<Line> = shortcuts
        .iter()
        .map(|(key, action)| {
            Line::from(vec![
                Span::styled(format!("{:>6}  ", key), Style::default().fg(theme.blue)),
                Span::styled(*action, Style::default().fg(theme.foreground)),
            ])
        })
        .collect();

    f.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .title(" Keys ")
                .borders(Borders::ALL)
                .border_type(BorderType::Double)
                .border_style(Style::default().fg(theme.magenta))
                .style(Style::default().bg(theme.background)),
        ),
        area,
    );
}

fn draw_completed_overlay(f: &mut Frame, app: &App, completion: &Completion) {
    let theme = &app.config.theme;
    let area = centered_rect(50, 30, f.area());
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(vec![
            Line::from(Span::styled(
                format!("{} Session complete", app.config.icons.done),
                Style::default().fg(theme.green).add_modifier(Modifier::BOLD),
            )),
            Line::from(format!(
                "{} of focus",
                format_minutes(completion.focused_seconds)
            )),
            Line::from(Span::styled(
                "press any key",
                Style::default().fg(theme.gray),
            )),
        ])
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Double)
                .border_style(Style::default().fg(theme.green))
                .style(Style::default().bg(theme.background)),
        ),
        area,
    );
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// `MM:SS`; minutes keep counting past 59.
pub fn format_mmss(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// "25 minutes", "1 minute", "45 seconds".
pub fn format_minutes(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{} second{}", seconds, if seconds == 1 { "" } else { "s" });
    }
    let minutes = seconds / 60;
    format!("{} minute{}", minutes, if minutes == 1 { "" } else { "s" })
}

fn progress_bar(progress: f64, width: usize, filled: &str, empty: &str) -> String {
    let done = ((progress.clamp(0.0, 1.0) * width as f64) as usize).min(width);
    format!("{}{}", filled.repeat(done), empty.repeat(width - done))
}
