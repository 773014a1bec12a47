use anyhow::Result;
use braid_core::{
    ChatEngine, Conversation, ConversationStore, EngineEvent, FileStorage, MessageId, Theme,
};
use clap::Parser;
use config::{PathManager, Settings};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind,
        KeyModifiers, MouseEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use llm::GeminiProvider;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState},
    Frame, Terminal,
};
use std::io;
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

#[derive(Parser, Debug)]
#[command(name = "braid", about = "Threaded Gemini chat in the terminal")]
struct Args {
    /// Chat model id (overrides settings.toml)
    #[arg(short, long)]
    model: Option<String>,

    /// Custom data directory for the conversation store
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

/// A command available in the command palette
struct PaletteCommand {
    id: &'static str,
    name: &'static str,
    keywords: &'static [&'static str],
}

const PALETTE_COMMANDS: &[PaletteCommand] = &[
    PaletteCommand {
        id: "new-chat",
        name: "Start New Chat",
        keywords: &["new", "clear", "reset"],
    },
    PaletteCommand {
        id: "toggle-sidebar",
        name: "Toggle Sidebar",
        keywords: &["menu", "history", "conversations"],
    },
    PaletteCommand {
        id: "toggle-theme",
        name: "Toggle Light/Dark Theme",
        keywords: &["theme", "light", "dark"],
    },
    PaletteCommand {
        id: "reply-thread",
        name: "Reply in Thread to Last Response",
        keywords: &["thread", "reply"],
    },
    PaletteCommand {
        id: "close-thread",
        name: "Close Thread Panel",
        keywords: &["thread", "close"],
    },
    PaletteCommand {
        id: "delete-conversation",
        name: "Delete Current Conversation",
        keywords: &["delete", "remove"],
    },
];

struct PaletteState {
    input: Input,
    selected: usize,
}

impl PaletteState {
    fn filtered(&self) -> Vec<&'static PaletteCommand> {
        let filter = self.input.value().to_lowercase();
        PALETTE_COMMANDS
            .iter()
            .filter(|cmd| {
                cmd.name.to_lowercase().contains(&filter)
                    || cmd.keywords.iter().any(|k| k.contains(&filter))
            })
            .collect()
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Focus {
    Input,
    Sidebar,
}

/// Colors for the current theme
struct ThemeColors {
    user: Color,
    model: Color,
    accent: Color,
    dim: Color,
    status_bg: Color,
    status_fg: Color,
}

fn theme_colors(theme: Theme) -> ThemeColors {
    match theme {
        Theme::Dark => ThemeColors {
            user: Color::Cyan,
            model: Color::Green,
            accent: Color::Yellow,
            dim: Color::DarkGray,
            status_bg: Color::DarkGray,
            status_fg: Color::White,
        },
        Theme::Light => ThemeColors {
            user: Color::Blue,
            model: Color::Magenta,
            accent: Color::Red,
            dim: Color::Gray,
            status_bg: Color::Gray,
            status_fg: Color::Black,
        },
    }
}

struct App {
    /// None when startup configuration failed; input stays disabled
    engine: Option<ChatEngine<FileStorage>>,
    fatal_error: Option<String>,
    input: Input,
    focus: Focus,
    sidebar_visible: bool,
    sidebar_selected: usize,
    /// Parent message of the open thread panel, if any
    thread_parent: Option<MessageId>,
    palette: Option<PaletteState>,
    /// Conversation pending delete confirmation
    pending_delete: Option<braid_core::ConversationId>,
    is_sending: bool,
    suggestions: Vec<String>,
    status_message: Option<String>,
    scroll_offset: usize,
    theme: Theme,
    thinking_frame: usize,
}

impl App {
    fn new(engine: Option<ChatEngine<FileStorage>>, fatal_error: Option<String>, theme: Theme) -> Self {
        Self {
            engine,
            fatal_error,
            input: Input::default(),
            focus: Focus::Input,
            sidebar_visible: true,
            sidebar_selected: 0,
            thread_parent: None,
            palette: None,
            pending_delete: None,
            is_sending: false,
            suggestions: Vec::new(),
            status_message: None,
            scroll_offset: 0,
            theme,
            thinking_frame: 0,
        }
    }

    fn input_disabled(&self) -> bool {
        self.is_sending || self.fatal_error.is_some()
    }

    fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add(lines);
    }

    fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    fn thinking_indicator(&self) -> &'static str {
        const FRAMES: [&str; 4] = ["|", "/", "-", "\\"];
        FRAMES[self.thinking_frame % FRAMES.len()]
    }

    /// Snapshot of the active conversation, if the store lock is free
    fn with_store<T>(&self, f: impl FnOnce(&ConversationStore<FileStorage>) -> T) -> Option<T> {
        let engine = self.engine.as_ref()?;
        let store = engine.store();
        let guard = store.try_lock().ok()?;
        Some(f(&guard))
    }

    fn check_engine_events(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        while let Some(event) = engine.try_recv() {
            match event {
                EngineEvent::MessageAppended(_) => {
                    self.scroll_offset = 0;
                }
                EngineEvent::TurnComplete { suggestions } => {
                    self.is_sending = false;
                    self.suggestions = suggestions;
                    self.scroll_offset = 0;
                }
                EngineEvent::HistoryTruncated => {
                    self.scroll_offset = 0;
                }
                EngineEvent::ConversationsChanged => {}
                EngineEvent::Error(err) => {
                    self.is_sending = false;
                    self.status_message = Some(format!("Error: {}", err));
                }
            }
        }
    }

    fn queue_send(&mut self, text: String) {
        let Some(engine) = self.engine.as_ref() else {
            return;
        };
        self.is_sending = true;
        self.suggestions.clear();
        self.thinking_frame = 0;
        match &self.thread_parent {
            Some(parent) => engine.send_reply(text, parent.clone()),
            None => engine.send_text(text),
        }
    }

    /// Slash commands typed into the input line. Returns false to quit.
    fn handle_slash_command(&mut self, input_text: &str) -> bool {
        let (command, rest) = match input_text.split_once(' ') {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (input_text, ""),
        };
        match command {
            "/quit" => return false,
            "/new" => self.execute_palette_command("new-chat"),
            "/theme" => self.execute_palette_command("toggle-theme"),
            "/thread" => self.execute_palette_command("reply-thread"),
            "/close" => self.execute_palette_command("close-thread"),
            "/delete" => self.execute_palette_command("delete-conversation"),
            "/rename" if !rest.is_empty() => {
                if let Some(engine) = self.engine.as_ref() {
                    if let Some(id) =
                        self.with_store(|s| s.active_id().cloned()).flatten()
                    {
                        engine.rename_conversation(id, rest);
                    }
                }
            }
            "/edit" if !rest.is_empty() => {
                // Edit the most recent user message
                let target = self
                    .with_store(|s| {
                        s.active().and_then(|c| {
                            c.history
                                .iter()
                                .rev()
                                .find(|m| m.content.is_user())
                                .map(|m| m.id.clone())
                        })
                    })
                    .flatten();
                match (target, self.engine.as_ref()) {
                    (Some(id), Some(engine)) => {
                        self.is_sending = true;
                        self.suggestions.clear();
                        engine.edit_message(id, rest);
                    }
                    _ => {
                        self.status_message = Some("Nothing to edit".to_string());
                    }
                }
            }
            _ => {
                self.status_message = Some(format!("Unknown command: {}", command));
            }
        }
        true
    }

    fn execute_palette_command(&mut self, id: &str) {
        self.palette = None;
        match id {
            "new-chat" => {
                if let Some(engine) = self.engine.as_ref() {
                    self.thread_parent = None;
                    self.suggestions.clear();
                    engine.start_new_conversation();
                }
            }
            "toggle-sidebar" => {
                self.sidebar_visible = !self.sidebar_visible;
                if !self.sidebar_visible {
                    self.focus = Focus::Input;
                }
            }
            "toggle-theme" => {
                self.theme = self.theme.toggled();
                if let Some(result) = self.with_store(|s| s.set_theme(self.theme)) {
                    if let Err(e) = result {
                        self.status_message = Some(format!("Error: {}", e));
                    }
                }
            }
            "reply-thread" => {
                // Open a thread on the latest top-level model response
                let parent = self
                    .with_store(|s| {
                        s.active().and_then(|c| {
                            c.top_level()
                                .filter(|m| !m.content.is_user())
                                .last()
                                .map(|m| m.id.clone())
                        })
                    })
                    .flatten();
                match parent {
                    Some(id) => self.thread_parent = Some(id),
                    None => self.status_message = Some("No response to reply to".to_string()),
                }
            }
            "close-thread" => {
                self.thread_parent = None;
            }
            "delete-conversation" => {
                if let Some(id) = self.with_store(|s| s.active_id().cloned()).flatten() {
                    let title = self
                        .with_store(|s| s.get(&id).map(|c| c.title.clone()))
                        .flatten()
                        .unwrap_or_default();
                    self.pending_delete = Some(id);
                    self.status_message =
                        Some(format!("Delete \"{}\"? Press y to confirm", title));
                }
            }
            _ => {}
        }
    }

    /// Handle a key event - returns false if the app should quit
    fn handle_key_event(&mut self, key: crossterm::event::KeyEvent) -> bool {
        if key.kind != KeyEventKind::Press {
            return true;
        }

        // Delete confirmation intercepts everything
        if let Some(id) = self.pending_delete.take() {
            if key.code == KeyCode::Char('y') {
                if let Some(engine) = self.engine.as_ref() {
                    self.thread_parent = None;
                    self.suggestions.clear();
                    engine.delete_conversation(id);
                }
                self.status_message = None;
            } else {
                self.status_message = Some("Delete cancelled".to_string());
            }
            return true;
        }

        // Palette overlay has its own key handling
        if self.palette.is_some() {
            return self.handle_palette_key(key);
        }

        match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => return false,
            (KeyCode::Char('k'), KeyModifiers::CONTROL) => {
                self.palette = Some(PaletteState {
                    input: Input::default(),
                    selected: 0,
                });
            }
            (KeyCode::Char('n'), KeyModifiers::CONTROL) => {
                self.execute_palette_command("new-chat");
            }
            (KeyCode::Char('b'), KeyModifiers::CONTROL) => {
                self.execute_palette_command("toggle-sidebar");
            }
            (KeyCode::Char('t'), KeyModifiers::CONTROL) => {
                self.execute_palette_command("toggle-theme");
            }
            (KeyCode::Esc, _) => {
                if self.thread_parent.is_some() {
                    self.thread_parent = None;
                } else if self.focus == Focus::Sidebar {
                    self.focus = Focus::Input;
                }
            }
            (KeyCode::Tab, _) => {
                if self.sidebar_visible {
                    self.focus = match self.focus {
                        Focus::Input => Focus::Sidebar,
                        Focus::Sidebar => Focus::Input,
                    };
                }
            }
            _ if self.focus == Focus::Sidebar => return self.handle_sidebar_key(key),
            (KeyCode::Enter, _) => {
                if self.input_disabled() {
                    return true;
                }
                let text = self.input.value().trim().to_string();
                self.input.reset();
                if text.is_empty() {
                    return true;
                }
                self.status_message = None;
                if text.starts_with('/') {
                    return self.handle_slash_command(&text);
                }
                self.queue_send(text);
            }
            (KeyCode::Char(c), KeyModifiers::NONE)
                if self.input.value().is_empty() && ('1'..='3').contains(&c) =>
            {
                // Suggestion chips answer to 1-3 while the input is empty
                let index = c as usize - '1' as usize;
                if let Some(suggestion) = self.suggestions.get(index).cloned() {
                    if !self.input_disabled() {
                        self.queue_send(suggestion);
                        return true;
                    }
                }
                if !self.input_disabled() {
                    self.input.handle_event(&Event::Key(key));
                }
            }
            _ => {
                if !self.input_disabled() {
                    self.input.handle_event(&Event::Key(key));
                }
            }
        }
        true
    }

    fn handle_sidebar_key(&mut self, key: crossterm::event::KeyEvent) -> bool {
        let count = self
            .with_store(|s| s.conversations().len())
            .unwrap_or(0);
        match key.code {
            KeyCode::Up => {
                self.sidebar_selected = self.sidebar_selected.saturating_sub(1);
            }
            KeyCode::Down => {
                if count > 0 {
                    self.sidebar_selected = (self.sidebar_selected + 1).min(count - 1);
                }
            }
            KeyCode::Enter => {
                let id = self
                    .with_store(|s| s.conversations().get(self.sidebar_selected).map(|c| c.id.clone()))
                    .flatten();
                if let (Some(id), Some(engine)) = (id, self.engine.as_ref()) {
                    self.thread_parent = None;
                    self.suggestions.clear();
                    engine.select_conversation(id);
                    self.focus = Focus::Input;
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                let id = self
                    .with_store(|s| s.conversations().get(self.sidebar_selected).map(|c| c.id.clone()))
                    .flatten();
                if let Some(id) = id {
                    let title = self
                        .with_store(|s| s.get(&id).map(|c| c.title.clone()))
                        .flatten()
                        .unwrap_or_default();
                    self.pending_delete = Some(id);
                    self.status_message =
                        Some(format!("Delete \"{}\"? Press y to confirm", title));
                }
            }
            _ => {}
        }
        true
    }

    fn handle_palette_key(&mut self, key: crossterm::event::KeyEvent) -> bool {
        let Some(palette) = self.palette.as_mut() else {
            return true;
        };
        match key.code {
            KeyCode::Esc => {
                self.palette = None;
            }
            KeyCode::Up => {
                palette.selected = palette.selected.saturating_sub(1);
            }
            KeyCode::Down => {
                let count = palette.filtered().len();
                if count > 0 {
                    palette.selected = (palette.selected + 1).min(count - 1);
                }
            }
            KeyCode::Enter => {
                let id = palette
                    .filtered()
                    .get(palette.selected)
                    .map(|cmd| cmd.id);
                if let Some(id) = id {
                    self.execute_palette_command(id);
                } else {
                    self.palette = None;
                }
            }
            _ => {
                palette.input.handle_event(&Event::Key(key));
                palette.selected = 0;
            }
        }
        true
    }
}

/// Build the styled lines for one conversation view (top-level timeline or
/// one thread's replies).
fn message_lines<'a>(
    conversation: &Conversation,
    parent: Option<&MessageId>,
    model_name: &str,
    colors: &ThemeColors,
) -> Vec<Line<'a>> {
    let mut lines: Vec<Line> = Vec::new();
    let messages: Vec<_> = match parent {
        None => conversation.top_level().collect(),
        Some(id) => conversation.replies(id).collect(),
    };

    for msg in messages {
        let (who, style) = if msg.content.is_user() {
            ("You", Style::default().fg(colors.user))
        } else {
            (model_name, Style::default().fg(colors.model))
        };
        lines.push(Line::from(Span::styled(
            format!("[{}]", who),
            style.add_modifier(Modifier::BOLD),
        )));

        for part in &msg.content.payload.parts {
            match part {
                llm::Part::Text { text } => {
                    for line in text.lines() {
                        let styled = if line.starts_with("```") {
                            Line::from(Span::styled(
                                line.to_string(),
                                Style::default().fg(colors.dim),
                            ))
                        } else if line.starts_with('#') {
                            Line::from(Span::styled(
                                line.to_string(),
                                Style::default().fg(colors.accent).add_modifier(Modifier::BOLD),
                            ))
                        } else if line.starts_with("- ") || line.starts_with("* ") {
                            Line::from(Span::styled(
                                line.to_string(),
                                Style::default().fg(colors.user),
                            ))
                        } else {
                            Line::from(line.to_string())
                        };
                        lines.push(styled);
                    }
                }
                llm::Part::InlineData { data, mime_type } => {
                    let size_kb = data.len() / 1024;
                    lines.push(Line::from(Span::styled(
                        format!("[Attachment: {} ~{}KB]", mime_type, size_kb),
                        Style::default().fg(colors.dim).add_modifier(Modifier::ITALIC),
                    )));
                }
            }
        }

        let replies = conversation.reply_count(&msg.id);
        if parent.is_none() && replies > 0 {
            lines.push(Line::from(Span::styled(
                format!(
                    "  {} {}",
                    replies,
                    if replies > 1 { "replies" } else { "reply" }
                ),
                Style::default().fg(colors.accent).add_modifier(Modifier::ITALIC),
            )));
        }

        lines.push(Line::from(""));
    }
    lines
}

fn render_scrolled_paragraph(
    f: &mut Frame,
    area: Rect,
    lines: Vec<Line>,
    title: String,
    scroll_offset: &mut usize,
) {
    let total_lines = lines.len();
    let visible_height = area.height.saturating_sub(2) as usize;
    let max_scroll = total_lines.saturating_sub(visible_height);

    if *scroll_offset > max_scroll {
        *scroll_offset = max_scroll;
    }
    // scroll_offset counts up from the bottom; 0 pins to the latest message
    let effective_scroll = max_scroll.saturating_sub(*scroll_offset);

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .scroll((effective_scroll as u16, 0));
    f.render_widget(paragraph, area);

    if total_lines > visible_height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight);
        let mut scrollbar_state = ScrollbarState::new(max_scroll).position(effective_scroll);
        let scrollbar_area = area.inner(ratatui::layout::Margin {
            vertical: 1,
            horizontal: 0,
        });
        f.render_stateful_widget(scrollbar, scrollbar_area, &mut scrollbar_state);
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let colors = theme_colors(app.theme);

    let columns = if app.sidebar_visible {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(28), Constraint::Min(1)])
            .split(f.area())
    } else {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(0), Constraint::Min(1)])
            .split(f.area())
    };

    let has_suggestions = !app.suggestions.is_empty();
    let main = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(if has_suggestions { 1 } else { 0 }),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(columns[1]);

    // Sidebar: conversation list
    if app.sidebar_visible {
        let (titles, active_index) = app
            .with_store(|s| {
                let titles: Vec<String> = s.conversations().iter().map(|c| c.title.clone()).collect();
                let active = s
                    .active_id()
                    .and_then(|id| s.conversations().iter().position(|c| c.id == *id));
                (titles, active)
            })
            .unwrap_or((Vec::new(), None));

        if app.sidebar_selected >= titles.len() && !titles.is_empty() {
            app.sidebar_selected = titles.len() - 1;
        }

        let items: Vec<ListItem> = titles
            .iter()
            .enumerate()
            .map(|(i, title)| {
                let mut style = Style::default();
                if Some(i) == active_index {
                    style = style.fg(colors.accent);
                }
                if app.focus == Focus::Sidebar && i == app.sidebar_selected {
                    style = style.bg(Color::Blue).fg(Color::White);
                }
                ListItem::new(title.clone()).style(style)
            })
            .collect();

        let border_style = if app.focus == Focus::Sidebar {
            Style::default().fg(colors.accent)
        } else {
            Style::default()
        };
        let list = List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title("Chats"),
        );
        f.render_widget(list, columns[0]);
    }

    // Main chat area, split when a thread panel is open
    let model_name = app
        .engine
        .as_ref()
        .map(|e| e.model_name().to_string())
        .unwrap_or_else(|| "model".to_string());

    let snapshot = app.with_store(|s| s.active().cloned()).flatten();
    let thread_parent = app.thread_parent.clone();
    match snapshot {
        Some(conversation) => {
            if let Some(parent_id) = thread_parent {
                let halves = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
                    .split(main[0]);

                let lines = message_lines(&conversation, None, &model_name, &colors);
                render_scrolled_paragraph(
                    f,
                    halves[0],
                    lines,
                    conversation.title.clone(),
                    &mut app.scroll_offset,
                );

                let mut thread_lines = message_lines(&conversation, Some(&parent_id), &model_name, &colors);
                if let Some(parent) = conversation.find(&parent_id) {
                    let mut all = vec![Line::from(Span::styled(
                        parent.content.get_text(),
                        Style::default().fg(colors.dim).add_modifier(Modifier::ITALIC),
                    ))];
                    all.push(Line::from(""));
                    all.append(&mut thread_lines);
                    thread_lines = all;
                }
                let mut thread_scroll = 0usize;
                render_scrolled_paragraph(
                    f,
                    halves[1],
                    thread_lines,
                    "Thread".to_string(),
                    &mut thread_scroll,
                );
            } else {
                let mut lines = message_lines(&conversation, None, &model_name, &colors);
                if app.is_sending {
                    lines.push(Line::from(Span::styled(
                        format!("{} Thinking...", app.thinking_indicator()),
                        Style::default().fg(colors.dim),
                    )));
                }
                render_scrolled_paragraph(
                    f,
                    main[0],
                    lines,
                    conversation.title.clone(),
                    &mut app.scroll_offset,
                );
            }
        }
        None => {
            let text = app
                .fatal_error
                .clone()
                .unwrap_or_else(|| "No active conversation".to_string());
            let paragraph = Paragraph::new(text)
                .style(Style::default().fg(Color::Red))
                .block(Block::default().borders(Borders::ALL).title("braid"));
            f.render_widget(paragraph, main[0]);
        }
    }

    // Suggestion chips
    if has_suggestions {
        let mut spans: Vec<Span> = Vec::new();
        for (i, suggestion) in app.suggestions.iter().enumerate() {
            spans.push(Span::styled(
                format!(" [{}] {} ", i + 1, suggestion),
                Style::default().fg(colors.accent),
            ));
        }
        f.render_widget(Paragraph::new(Line::from(spans)), main[1]);
    }

    // Input line
    let input_title = if app.fatal_error.is_some() {
        "Input disabled"
    } else if app.is_sending {
        "Waiting for response..."
    } else if app.thread_parent.is_some() {
        "Reply in thread (Esc to close, / for commands)"
    } else {
        "Message (/ for commands, Ctrl+K for palette)"
    };
    let input_style = if app.input_disabled() {
        Style::default().fg(colors.dim)
    } else {
        Style::default()
    };
    let input_widget = Paragraph::new(app.input.value())
        .style(input_style)
        .block(Block::default().borders(Borders::ALL).title(input_title));
    f.render_widget(input_widget, main[2]);

    // Status bar
    let message_count = app
        .with_store(|s| s.active().map(|c| c.history.len()).unwrap_or(0))
        .unwrap_or(0);
    let status_text = if let Some(ref msg) = app.status_message {
        format!(" {} | {} ", model_name, msg)
    } else if app.is_sending {
        format!(" {} | {} Thinking... ", model_name, app.thinking_indicator())
    } else {
        format!(" {} | {} messages ", model_name, message_count)
    };
    let status_bar = Paragraph::new(status_text)
        .style(Style::default().bg(colors.status_bg).fg(colors.status_fg));
    f.render_widget(status_bar, main[3]);

    // Command palette overlay
    if let Some(palette) = &app.palette {
        let filtered = palette.filtered();
        let items: Vec<ListItem> = filtered
            .iter()
            .enumerate()
            .map(|(i, cmd)| {
                let style = if i == palette.selected {
                    Style::default().bg(Color::Blue).fg(Color::White)
                } else {
                    Style::default()
                };
                ListItem::new(cmd.name).style(style)
            })
            .collect();

        let height = (filtered.len() as u16 + 3).min(12);
        let width = f.area().width.saturating_sub(20).min(60);
        let area = Rect {
            x: (f.area().width.saturating_sub(width)) / 2,
            y: 2,
            width,
            height,
        };
        f.render_widget(ratatui::widgets::Clear, area);
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("Commands: {}", palette.input.value()));
        let list = List::new(items).block(block);
        f.render_widget(list, area);
    } else if app.focus == Focus::Input && !app.input_disabled() {
        f.set_cursor_position((
            main[2].x + app.input.visual_cursor() as u16 + 1,
            main[2].y + 1,
        ));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(data_dir) = &args.data_dir {
        PathManager::set_data_dir(data_dir.clone());
    }
    PathManager::ensure_dirs_exist()?;

    // File-based logging; stdout belongs to the TUI
    let log_dir = PathManager::logs_dir().unwrap_or_else(|| PathBuf::from("."));
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "braid.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    tracing::info!("Starting braid TUI");

    config::load_env_file();
    let settings = Settings::load();

    // A missing API key is fatal: rendered once, input disabled
    let (engine, fatal_error) = match config::api_key() {
        Some(api_key) => {
            let provider = GeminiProvider::new(&api_key);
            let model_id = args.model.as_deref().unwrap_or_else(|| settings.model());
            let model = llm::ModelProvider::create_chat_model(&provider, model_id)
                .ok_or_else(|| anyhow::anyhow!("unknown model: {}", model_id))?;

            let storage = FileStorage::open_default()?;
            let mut store = ConversationStore::open(storage);
            store.ensure_active()?;
            let engine = ChatEngine::new(store, model, settings.system_instruction());
            (Some(engine), None)
        }
        None => {
            tracing::error!("{} is not set", config::API_KEY_ENV);
            (
                None,
                Some(format!(
                    "Fatal Error: {} is not set. Export it or add it to ~/.env, then restart.",
                    config::API_KEY_ENV
                )),
            )
        }
    };

    let theme = {
        // Theme preference persists in the same store the conversations use
        let storage = FileStorage::open_default()?;
        ConversationStore::open(storage).theme()
    };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(engine, fatal_error, theme);
    let mut should_quit = false;

    while !should_quit {
        terminal.draw(|f| ui(f, &mut app))?;

        app.check_engine_events();
        if app.is_sending {
            app.thinking_frame = app.thinking_frame.wrapping_add(1);
        }

        if event::poll(std::time::Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) => {
                    should_quit = !app.handle_key_event(key);
                }
                Event::Mouse(mouse) => match mouse.kind {
                    MouseEventKind::ScrollUp => app.scroll_up(3),
                    MouseEventKind::ScrollDown => app.scroll_down(3),
                    _ => {}
                },
                _ => {}
            }
        }
    }

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    Ok(())
}
