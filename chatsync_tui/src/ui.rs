use chatsync_lib::widget::{ChatWidget, Dropdown, ThreadLine, NO_MESSAGES, NO_USERS_FOUND};
use chatsync_lib::{User, View};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
    Frame,
};

use crate::{
    app::{App, Focus},
    theme::Theme,
};

const SEARCH_HEIGHT: u16 = 3;
const INPUT_HEIGHT: u16 = 3;
const STATUS_HEIGHT: u16 = 1;
const MAX_DROPDOWN_ROWS: usize = 8;

/// Screen regions of the open widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Areas {
    /// Search field in the list view, conversation header in a thread.
    pub top: Rect,
    pub body: Rect,
    pub input: Option<Rect>,
    pub status: Rect,
}

pub fn layout(area: Rect, view: View) -> Areas {
    match view {
        View::UserList => {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(SEARCH_HEIGHT),
                    Constraint::Min(1),
                    Constraint::Length(STATUS_HEIGHT),
                ])
                .split(area);
            Areas {
                top: chunks[0],
                body: chunks[1],
                input: None,
                status: chunks[2],
            }
        }
        View::Thread(_) => {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(SEARCH_HEIGHT),
                    Constraint::Min(1),
                    Constraint::Length(INPUT_HEIGHT),
                    Constraint::Length(STATUS_HEIGHT),
                ])
                .split(area);
            Areas {
                top: chunks[0],
                body: chunks[1],
                input: Some(chunks[2]),
                status: chunks[3],
            }
        }
    }
}

/// Rows of message text visible inside the bordered thread pane.
pub fn thread_viewport(area: Rect) -> u16 {
    area.height
        .saturating_sub(SEARCH_HEIGHT + INPUT_HEIGHT + STATUS_HEIGHT)
        .saturating_sub(2)
}

/// Popup directly under the search field.
pub fn dropdown_area(search: Rect, rows: usize) -> Rect {
    let height = rows.clamp(1, MAX_DROPDOWN_ROWS) as u16 + 2;
    Rect {
        x: search.x + 1,
        y: search.y + search.height,
        width: search.width.saturating_sub(2),
        height,
    }
}

pub fn draw(f: &mut Frame, app: &App) {
    let theme = Theme::chatsync();
    let widget = app.client.widget();

    if !widget.is_open() {
        draw_launcher(f, f.area(), widget, &theme);
        return;
    }

    let areas = layout(f.area(), widget.view());
    match widget.view() {
        View::UserList => {
            draw_search(f, areas.top, widget, app.focus == Focus::Search, &theme);
            draw_user_list(f, areas.body, app, &theme);
        }
        View::Thread(with) => {
            draw_thread_header(f, areas.top, widget.display_name(with), &theme);
            draw_thread(f, areas.body, widget, &theme);
        }
    }
    if let Some(input) = areas.input {
        draw_input(f, input, widget, &theme);
    }
    draw_status_bar(f, areas.status, widget, &theme);

    if widget.view() == View::UserList {
        draw_dropdown(f, areas.top, widget, &theme);
    }
    if widget.picker().is_some() {
        draw_picker(f, f.area(), widget, &theme);
    }
}

pub fn badge_text(count: u32) -> Option<String> {
    match count {
        0 => None,
        n if n > 99 => Some("99+".to_string()),
        n => Some(n.to_string()),
    }
}

fn draw_launcher(f: &mut Frame, area: Rect, widget: &ChatWidget, theme: &Theme) {
    let mut spans = vec![Span::styled(" Chat ", theme.title_style())];
    if let Some(badge) = badge_text(widget.unread_badge()) {
        spans.push(Span::styled(format!(" {} ", badge), theme.badge_style()));
    }
    let lines = vec![
        Line::from(spans),
        Line::from(""),
        Line::from(Span::styled("Enter to open, q to quit", theme.muted_style())),
    ];
    let launcher = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme.border_style())
                .style(theme.background_style()),
        );
    f.render_widget(launcher, area);
}

fn draw_search(f: &mut Frame, area: Rect, widget: &ChatWidget, focused: bool, theme: &Theme) {
    let border = if focused {
        theme.border_focused_style()
    } else {
        theme.border_style()
    };
    let query = widget.search().query();
    let text = if query.is_empty() && !focused {
        Span::styled("Search users (/ or Tab)", theme.muted_style())
    } else {
        Span::styled(query.to_string(), theme.text_style())
    };
    let search = Paragraph::new(Line::from(text)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Search")
            .border_style(border)
            .style(theme.input_style()),
    );
    f.render_widget(search, area);
}

fn draw_dropdown(f: &mut Frame, search: Rect, widget: &ChatWidget, theme: &Theme) {
    let items: Vec<ListItem> = match widget.search().dropdown() {
        Dropdown::Hidden => return,
        Dropdown::NoMatches => {
            vec![ListItem::new(NO_USERS_FOUND).style(theme.muted_style())]
        }
        Dropdown::Rows(rows) => rows
            .iter()
            .map(|row| {
                let style = if row.highlighted {
                    theme.highlight_style()
                } else {
                    theme.text_style()
                };
                ListItem::new(row.user.username.as_str()).style(style)
            })
            .collect(),
    };
    let popup = dropdown_area(search, items.len());
    f.render_widget(Clear, popup);
    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(theme.border_focused_style())
            .style(theme.input_style()),
    );
    f.render_widget(list, popup);
}

fn user_item<'a>(user: &'a User, widget: &ChatWidget, cursor: bool, theme: &Theme) -> ListItem<'a> {
    let marker = if user.online { "●" } else { "○" };
    let mut spans = vec![
        Span::styled(format!("{} ", marker), theme.presence_style(user.online)),
        Span::raw(user.username.as_str()),
    ];
    if user.unread_count > 0 {
        spans.push(Span::styled(format!(" ({})", user.unread_count), theme.badge_style()));
    }

    let lit = widget.flash().map_or(false, |flash| flash.user == user.id && flash.lit);
    let mut style = if lit {
        theme.flash_style()
    } else {
        theme.text_style()
    };
    if cursor {
        style = style.add_modifier(Modifier::REVERSED);
    }
    ListItem::new(Line::from(spans)).style(style)
}

fn draw_user_list(f: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let widget = app.client.widget();
    let directory = widget.directory();
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Users (r to refresh)")
        .border_style(if app.focus == Focus::List {
            theme.border_focused_style()
        } else {
            theme.border_style()
        })
        .style(theme.background_style());

    if !directory.is_loaded() {
        let loading = Paragraph::new("Loading users...").style(theme.muted_style()).block(block);
        f.render_widget(loading, area);
        return;
    }

    let show_cursor = app.focus == Focus::List;
    let mut items = Vec::new();
    let mut row = 0;
    for (heading, online, count) in [
        ("Online", true, directory.online_count()),
        ("Offline", false, directory.offline_count()),
    ] {
        items.push(ListItem::new(format!("{} ({})", heading, count)).style(theme.heading_style()));
        for user in directory.users().iter().filter(|u| u.online == online) {
            items.push(user_item(user, widget, show_cursor && row == app.list_cursor, theme));
            row += 1;
        }
    }

    f.render_widget(List::new(items).block(block), area);
}

fn draw_thread_header(f: &mut Frame, area: Rect, name: &str, theme: &Theme) {
    let header = Paragraph::new(Line::from(vec![
        Span::styled("< Esc ", theme.muted_style()),
        Span::styled(name.to_string(), theme.title_style()),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(theme.border_style())
            .style(theme.background_style()),
    );
    f.render_widget(header, area);
}

pub fn format_line(line: &ThreadLine) -> String {
    match &line.time {
        Some(time) => format!("[{}] {}: {}", time, line.sender, line.text),
        None => format!("{}: {}", line.sender, line.text),
    }
}

fn draw_thread(f: &mut Frame, area: Rect, widget: &ChatWidget, theme: &Theme) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.border_style())
        .style(theme.background_style());
    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(thread) = widget.thread() else {
        return;
    };
    if !thread.is_loaded() && thread.pending().is_empty() {
        f.render_widget(Paragraph::new("Loading...").style(theme.muted_style()), inner);
        return;
    }
    let lines = widget.thread_lines();
    if lines.is_empty() {
        f.render_widget(Paragraph::new(NO_MESSAGES).style(theme.muted_style()), inner);
        return;
    }

    let offset = usize::from(thread.scroll().offset());
    let items: Vec<ListItem> = lines
        .iter()
        .skip(offset)
        .take(usize::from(inner.height))
        .map(|line| {
            let style = if line.own {
                theme.own_message_style()
            } else {
                theme.text_style()
            };
            ListItem::new(format_line(line)).style(style)
        })
        .collect();
    f.render_widget(List::new(items), inner);
}

fn draw_input(f: &mut Frame, area: Rect, widget: &ChatWidget, theme: &Theme) {
    let input = widget.input();
    let text = if input.is_empty() {
        Span::styled("Type a message, Enter to send, Ctrl-K to share", theme.muted_style())
    } else {
        Span::styled(input.to_string(), theme.text_style())
    };
    let paragraph = Paragraph::new(Line::from(text)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(theme.border_focused_style())
            .style(theme.input_style()),
    );
    f.render_widget(paragraph, area);
}

fn draw_status_bar(f: &mut Frame, area: Rect, widget: &ChatWidget, theme: &Theme) {
    let status = if let Some(notice) = widget.notice() {
        Paragraph::new(notice.to_string()).style(theme.notice_style())
    } else if let Some(error) = widget.last_error() {
        Paragraph::new(format!("Error: {}", error.message)).style(theme.error_style())
    } else {
        let hint = match widget.view() {
            View::UserList => "Tab: switch focus  Enter: open  Esc: close  Ctrl-C: quit",
            View::Thread(_) => "Enter: send  PgUp/PgDn: scroll  Ctrl-K: share  Esc: back",
        };
        Paragraph::new(hint).style(theme.status_style())
    };
    f.render_widget(status, area);
}

fn draw_picker(f: &mut Frame, area: Rect, widget: &ChatWidget, theme: &Theme) {
    let Some(picker) = widget.picker() else {
        return;
    };
    let width = area.width.saturating_sub(8).min(60);
    let height = area.height.saturating_sub(4).min(12);
    let popup = Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    };
    f.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Share a document")
        .border_style(theme.border_focused_style())
        .style(theme.input_style());

    match &picker.documents {
        None => {
            f.render_widget(Paragraph::new("Loading documents...").block(block), popup);
        }
        Some(documents) if documents.is_empty() => {
            f.render_widget(Paragraph::new("No documents.").block(block), popup);
        }
        Some(documents) => {
            let items: Vec<ListItem> = documents
                .iter()
                .enumerate()
                .map(|(i, document)| {
                    let style = if i == picker.highlighted {
                        theme.highlight_style()
                    } else {
                        theme.text_style()
                    };
                    ListItem::new(document.label()).style(style)
                })
                .collect();
            f.render_widget(List::new(items).block(block), popup);
        }
    }
}
