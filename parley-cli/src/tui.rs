//! Terminal UI: session sidebar, message log, input box

use anyhow::Result;
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use parley_core::session::ChatMessage;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Wrap};
use ratatui::{backend::CrosstermBackend, Frame, Terminal};
use std::io;
use std::time::Duration;

use crate::app::ChatApp;

const SIDEBAR_WIDTH: u16 = 36;

/// Run the UI until the user quits
pub async fn run(mut app: ChatApp) -> Result<()> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &mut app).await;

    disable_raw_mode()?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut ChatApp,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| draw(frame, app))?;

        if !event::poll(Duration::from_millis(60))? {
            continue;
        }
        let CEvent::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if let Some(text) = handle_key(app, key) {
            // Show the pending turn, then block on the model like the rest of the
            // interaction; keys typed meanwhile are handled afterwards.
            terminal.draw(|frame| draw(frame, app))?;
            app.submit(&text).await;
        }
    }
    Ok(())
}

/// Apply a key press. Returns text that should be sent to the model.
fn handle_key(app: &mut ChatApp, key: KeyEvent) -> Option<String> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => app.should_quit = true,
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Char('n') if ctrl => app.new_chat(),
        KeyCode::Char('x') if ctrl => app.clear_all(),
        KeyCode::Up if ctrl => app.select_neighbor(-1),
        KeyCode::Down if ctrl => app.select_neighbor(1),
        KeyCode::Up | KeyCode::PageUp => {
            app.follow = false;
            app.scroll = app.scroll.saturating_sub(if key.code == KeyCode::Up { 1 } else { 10 });
        }
        KeyCode::Down | KeyCode::PageDown => {
            app.follow = false;
            app.scroll = app
                .scroll
                .saturating_add(if key.code == KeyCode::Down { 1 } else { 10 });
        }
        KeyCode::End => app.follow = true,
        KeyCode::Enter
            if key
                .modifiers
                .intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) =>
        {
            app.input.push('\n');
        }
        KeyCode::Enter => {
            let command = app.take_input();
            return app.apply(command);
        }
        KeyCode::Backspace => {
            app.input.pop();
        }
        KeyCode::Char(ch) if !ctrl => app.input.push(ch),
        _ => {}
    }
    None
}

fn draw(frame: &mut Frame, app: &mut ChatApp) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)])
        .split(frame.area());

    draw_sidebar(frame, app, columns[0]);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(5),
        ])
        .split(columns[1]);

    let status = if app.pending.is_some() { "thinking" } else { "idle" };
    let session = app
        .store()
        .active_session()
        .map(|s| format!("{} (created {})", s.id, s.created_at_iso()))
        .unwrap_or_else(|| "-".to_string());
    frame.render_widget(
        Paragraph::new(format!(
            "model: {} | session: {} | status: {}",
            app.model(),
            session,
            status
        ))
        .block(Block::default().borders(Borders::ALL).title("AI Chat Assistant")),
        rows[0],
    );

    draw_log(frame, app, rows[1]);

    frame.render_widget(
        Paragraph::new(app.input.as_str())
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Send a message (Enter send, Shift+Enter newline)"),
            )
            .wrap(Wrap { trim: false }),
        rows[2],
    );
    let (cursor_x, cursor_y) = input_cursor(&app.input);
    frame.set_cursor_position((
        rows[2].x + 1 + cursor_x.min(rows[2].width.saturating_sub(3)),
        rows[2].y + 1 + cursor_y.min(rows[2].height.saturating_sub(3)),
    ));
}

fn draw_sidebar(frame: &mut Frame, app: &ChatApp, area: Rect) {
    let store = app.store();
    let active = store.active_id();
    let items: Vec<ListItem> = if store.is_empty() {
        vec![ListItem::new(Span::styled(
            "No chat history yet",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        store
            .list()
            .map(|session| {
                let style = if Some(session.id) == active {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                ListItem::new(Line::from(vec![
                    Span::styled(format!("{} ", session.id), Style::default().fg(Color::DarkGray)),
                    Span::styled(session.title().to_string(), style),
                ]))
            })
            .collect()
    };

    frame.render_widget(
        List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .title("Chat History")
                .title_bottom("^N new  ^X clear  ^↑/^↓ switch"),
        ),
        area,
    );
}

fn draw_log(frame: &mut Frame, app: &mut ChatApp, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();
    for message in app.store().get_active_messages() {
        match &message {
            // The seed prompt is context for the model, not part of the transcript.
            ChatMessage::System(_) => {}
            ChatMessage::User(text) => push_turn(&mut lines, "user", Color::Cyan, text),
            ChatMessage::Assistant(text) => {
                push_turn(&mut lines, "assistant", Color::Green, text)
            }
        }
    }
    if let Some(text) = &app.pending {
        push_turn(&mut lines, "user", Color::Cyan, text);
        lines.push(Line::from(Span::styled(
            "Thinking...",
            Style::default().fg(Color::Yellow),
        )));
    }
    if let Some(error) = &app.error {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )));
    }

    if app.follow {
        app.scroll = follow_scroll(
            &lines,
            area.width.saturating_sub(2),
            area.height.saturating_sub(2),
        );
    }

    frame.render_widget(
        Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Conversation"))
            .wrap(Wrap { trim: false })
            .scroll((app.scroll, 0)),
        area,
    );
}

fn push_turn(lines: &mut Vec<Line<'static>>, label: &str, color: Color, text: &str) {
    lines.push(Line::from(Span::styled(
        format!("[{}]", label),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )));
    lines.extend(text.lines().map(|l| Line::from(l.to_string())));
    lines.push(Line::default());
}

/// Scroll offset that puts the last wrapped row at the bottom of the view
fn follow_scroll(lines: &[Line], width: u16, height: u16) -> u16 {
    let rows = Paragraph::new(lines.to_vec())
        .wrap(Wrap { trim: false })
        .line_count(width);
    u16::try_from(rows)
        .unwrap_or(u16::MAX)
        .saturating_sub(height)
}

/// Column and row of the cursor at the end of `input`
fn input_cursor(input: &str) -> (u16, u16) {
    let row = input.matches('\n').count();
    let col = input.rsplit('\n').next().map_or(0, |l| l.chars().count());
    (
        u16::try_from(col).unwrap_or(u16::MAX),
        u16::try_from(row).unwrap_or(u16::MAX),
    )
}
