use chatsync_lib::widget::{Dropdown, NavKey};
use chatsync_lib::{ChatSyncClient, Msg, UserId, View};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::{Position, Rect};

use crate::ui;

pub enum AppResult {
    Continue,
    Exit,
}

/// Which part of the open widget receives typed keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Search,
    List,
    Input,
}

const SCROLL_STEP: i32 = 5;

pub struct App {
    pub client: ChatSyncClient,
    pub focus: Focus,
    /// Row index into [`App::list_order`].
    pub list_cursor: usize,
    area: Rect,
}

impl App {
    pub fn new(client: ChatSyncClient) -> Self {
        Self {
            client,
            focus: Focus::Search,
            list_cursor: 0,
            area: Rect::default(),
        }
    }

    pub fn start(&mut self) {
        self.client.mount();
    }

    pub fn stop(&mut self) {
        self.client.unmount();
    }

    /// Apply everything that arrived since the last frame.
    pub fn tick(&mut self) {
        self.client.drain();
        self.sync_focus();
    }

    /// Record the frame size and keep the thread viewport in step with it.
    pub fn resize(&mut self, area: Rect) {
        if area == self.area {
            return;
        }
        self.area = area;
        self.client.dispatch(Msg::ViewportResized(ui::thread_viewport(area)));
    }

    /// Users in display order: online section first, then offline.
    pub fn list_order(&self) -> Vec<UserId> {
        let users = self.client.widget().directory().users();
        let online = users.iter().filter(|u| u.online);
        let offline = users.iter().filter(|u| !u.online);
        online.chain(offline).map(|u| u.id).collect()
    }

    fn sync_focus(&mut self) {
        if self.client.take_focus_request() {
            self.focus = Focus::Input;
        }
        match self.client.widget().view() {
            View::Thread(_) => self.focus = Focus::Input,
            View::UserList if self.focus == Focus::Input => self.focus_search(),
            View::UserList => {}
        }
        let rows = self.list_order().len();
        self.list_cursor = self.list_cursor.min(rows.saturating_sub(1));
    }

    fn focus_search(&mut self) {
        self.focus = Focus::Search;
        self.client.dispatch(Msg::SearchFocused);
    }

    fn focus_list(&mut self) {
        self.focus = Focus::List;
        self.client.dispatch(Msg::SearchBlurred);
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> AppResult {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return AppResult::Exit;
        }

        let widget = self.client.widget();
        if !widget.is_open() {
            match key.code {
                KeyCode::Char('q') => return AppResult::Exit,
                KeyCode::Enter | KeyCode::Char('o') => {
                    self.client.open();
                    self.focus_search();
                }
                _ => {}
            }
            return AppResult::Continue;
        }

        if widget.picker().is_some() {
            let msg = match key.code {
                KeyCode::Up => Some(Msg::PickerKey(NavKey::Up)),
                KeyCode::Down => Some(Msg::PickerKey(NavKey::Down)),
                KeyCode::Enter => Some(Msg::PickerKey(NavKey::Enter)),
                KeyCode::Esc => Some(Msg::CloseDocumentPicker),
                _ => None,
            };
            if let Some(msg) = msg {
                self.client.dispatch(msg);
            }
            return AppResult::Continue;
        }

        if key.code == KeyCode::Esc {
            if widget.notice().is_some() {
                self.client.dispatch(Msg::DismissNotice);
            } else if widget.selected_user().is_some() {
                self.client.back_to_list();
                // Land on an empty search box, not the name just picked.
                self.client.search("");
                self.focus = Focus::Search;
            } else {
                self.client.close();
            }
            self.sync_focus();
            return AppResult::Continue;
        }

        match widget.view() {
            View::UserList => self.handle_list_key(key),
            View::Thread(_) => self.handle_thread_key(key),
        }
        self.sync_focus();
        AppResult::Continue
    }

    fn handle_list_key(&mut self, key: KeyEvent) {
        match self.focus {
            Focus::Search | Focus::Input => {
                let mut query = self.client.widget().search().query().to_string();
                match key.code {
                    KeyCode::Tab => self.focus_list(),
                    KeyCode::Up => self.client.dispatch(Msg::SearchKey(NavKey::Up)),
                    KeyCode::Down => self.client.dispatch(Msg::SearchKey(NavKey::Down)),
                    KeyCode::Enter => self.client.dispatch(Msg::SearchKey(NavKey::Enter)),
                    KeyCode::Backspace => {
                        query.pop();
                        self.client.search(query);
                    }
                    KeyCode::Char(c) => {
                        query.push(c);
                        self.client.search(query);
                    }
                    _ => {}
                }
            }
            Focus::List => {
                let order = self.list_order();
                match key.code {
                    KeyCode::Tab | KeyCode::Char('/') => self.focus_search(),
                    KeyCode::Up | KeyCode::Char('k') => {
                        self.list_cursor = self.list_cursor.saturating_sub(1);
                    }
                    KeyCode::Down | KeyCode::Char('j') => {
                        self.list_cursor = (self.list_cursor + 1).min(order.len().saturating_sub(1));
                    }
                    KeyCode::Enter => {
                        if let Some(id) = order.get(self.list_cursor) {
                            self.client.open_thread(*id);
                        }
                    }
                    KeyCode::Char('r') => self.client.refresh_list(),
                    _ => {}
                }
            }
        }
    }

    fn handle_thread_key(&mut self, key: KeyEvent) {
        let mut input = self.client.widget().input().to_string();
        match key.code {
            KeyCode::Char('k') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.client.dispatch(Msg::OpenDocumentPicker);
            }
            KeyCode::Enter => self.client.dispatch(Msg::Send),
            KeyCode::PageUp => self.client.dispatch(Msg::ScrollThread(-SCROLL_STEP)),
            KeyCode::PageDown => self.client.dispatch(Msg::ScrollThread(SCROLL_STEP)),
            KeyCode::Backspace => {
                input.pop();
                self.client.dispatch(Msg::InputChanged(input));
            }
            KeyCode::Char(c) => {
                input.push(c);
                self.client.dispatch(Msg::InputChanged(input));
            }
            _ => {}
        }
    }

    /// A press on a dropdown row selects before the search field loses focus;
    /// a press anywhere else blurs it.
    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        if mouse.kind != MouseEventKind::Down(MouseButton::Left) {
            return;
        }
        let widget = self.client.widget();
        if !widget.is_open() || widget.view() != View::UserList {
            return;
        }
        let at = Position::new(mouse.column, mouse.row);
        let areas = ui::layout(self.area, View::UserList);

        let on_dropdown = match widget.search().dropdown() {
            Dropdown::Rows(rows) => {
                let popup = ui::dropdown_area(areas.top, rows.len());
                popup.contains(at).then(|| {
                    let index = usize::from(at.y.saturating_sub(popup.y + 1));
                    rows.get(index).map(|row| row.user.id)
                })
            }
            _ => None,
        };
        if let Some(clicked) = on_dropdown {
            if let Some(id) = clicked {
                self.client.dispatch(Msg::PointerDown(id));
                self.sync_focus();
            }
            return;
        }

        if areas.top.contains(at) {
            if self.focus != Focus::Search {
                self.focus_search();
            }
        } else if self.focus == Focus::Search {
            self.focus_list();
        }
    }
}
