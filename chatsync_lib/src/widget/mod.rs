//! Framework-agnostic state of the chat widget.
//!
//! [`ChatWidget::update`] is a pure transition: it mutates the state and
//! returns the [`Cmd`]s the runtime must perform. Nothing here touches the
//! network or the clock, so every lifecycle rule can be exercised directly.

mod fetch;
mod msg;
mod scroll;
mod selector;
mod thread;
mod user_list;

pub use fetch::{FetchTracker, Generations};
pub use msg::{Cmd, Msg, Reply};
pub use scroll::ScrollState;
pub use selector::{Dropdown, DropdownRow, NavKey, UserSearch, NO_USERS_FOUND};
pub use thread::{Thread, ThreadLine, NO_MESSAGES};
pub use user_list::{Flash, UserList};

use crate::types::{ChatMessage, KnowledgeDocument, LatestMessage, TimerKind, User, UserId, View};
use std::collections::HashSet;
use tracing::{debug, info, warn};

pub const SELECT_USER_FIRST: &str = "Select a user to share with first.";
pub const UNKNOWN_SENDER: &str = "User";
pub const OWN_SENDER: &str = "You";

/// Timers the widget believes are running. Every start goes through here so
/// the runtime always receives a replace, never a second instance.
#[derive(Debug, Clone, Default)]
pub struct TimerSet {
    active: HashSet<TimerKind>,
}

impl TimerSet {
    pub fn is_active(&self, kind: TimerKind) -> bool {
        self.active.contains(&kind)
    }

    pub fn active(&self) -> Vec<TimerKind> {
        TimerKind::ALL
            .iter()
            .copied()
            .filter(|kind| self.is_active(*kind))
            .collect()
    }

    fn start(&mut self, kind: TimerKind) -> Cmd {
        self.active.insert(kind);
        Cmd::StartTimer(kind)
    }

    fn stop(&mut self, kind: TimerKind) -> Cmd {
        if self.active.remove(&kind) {
            Cmd::StopTimer(kind)
        } else {
            Cmd::None
        }
    }

    fn stop_all(&mut self) -> Cmd {
        Cmd::batch(TimerKind::ALL.iter().map(|kind| self.stop(*kind)).collect())
    }

    /// A one-shot timer is spent once it fires.
    fn fired(&mut self, kind: TimerKind) -> bool {
        if !self.is_active(kind) {
            return false;
        }
        if !kind.is_repeating() {
            self.active.remove(&kind);
        }
        true
    }
}

/// Which request produced the error currently on display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Search,
    Directory,
    History,
    Unread,
    Incoming,
    Send,
    Documents,
    Share,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchError {
    pub kind: FetchKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPicker {
    pub documents: Option<Vec<KnowledgeDocument>>,
    pub highlighted: usize,
}

#[derive(Debug, Clone)]
pub struct ChatWidget {
    own_id: Option<UserId>,
    mounted: bool,
    open: bool,
    view: View,
    search: UserSearch,
    directory: UserList,
    thread: Option<Thread>,
    flash: Option<Flash>,
    input: String,
    badge: u32,
    last_seen: Option<LatestMessage>,
    picker: Option<DocumentPicker>,
    notice: Option<String>,
    last_error: Option<FetchError>,
    viewport: u16,
    timers: TimerSet,
    generations: Generations,
}

impl ChatWidget {
    pub fn new(own_id: Option<UserId>) -> Self {
        Self {
            own_id,
            mounted: false,
            open: false,
            view: View::UserList,
            search: UserSearch::default(),
            directory: UserList::default(),
            thread: None,
            flash: None,
            input: String::new(),
            badge: 0,
            last_seen: None,
            picker: None,
            notice: None,
            last_error: None,
            viewport: 0,
            timers: TimerSet::default(),
            generations: Generations::default(),
        }
    }

    pub fn own_id(&self) -> Option<UserId> {
        self.own_id
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn selected_user(&self) -> Option<UserId> {
        self.view.selected_user()
    }

    pub fn search(&self) -> &UserSearch {
        &self.search
    }

    pub fn directory(&self) -> &UserList {
        &self.directory
    }

    pub fn thread(&self) -> Option<&Thread> {
        self.thread.as_ref()
    }

    pub fn flash(&self) -> Option<Flash> {
        self.flash
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Launcher badge. Always zero while the widget is open.
    pub fn unread_badge(&self) -> u32 {
        if self.open {
            0
        } else {
            self.badge
        }
    }

    pub fn picker(&self) -> Option<&DocumentPicker> {
        self.picker.as_ref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    pub fn timers(&self) -> &TimerSet {
        &self.timers
    }

    pub fn generations(&self) -> &Generations {
        &self.generations
    }

    /// Display name for any user id, falling back to a generic label.
    pub fn display_name(&self, id: UserId) -> &str {
        self.directory
            .find(id)
            .or_else(|| self.search.find(id))
            .map(|u| u.username.as_str())
            .unwrap_or(UNKNOWN_SENDER)
    }

    pub fn sender_label(&self, id: UserId) -> &str {
        if Some(id) == self.own_id {
            OWN_SENDER
        } else {
            self.display_name(id)
        }
    }

    /// Rows for the thread pane. Empty history yields no rows; the caller
    /// shows [`NO_MESSAGES`] instead.
    pub fn thread_lines(&self) -> Vec<ThreadLine> {
        let Some(thread) = &self.thread else {
            return Vec::new();
        };
        let history = thread.messages().iter().map(|m| self.line_for(m));
        let pending = thread.pending().iter().map(|text| ThreadLine {
            own: true,
            sender: OWN_SENDER.to_string(),
            text: text.clone(),
            time: None,
        });
        history.chain(pending).collect()
    }

    fn line_for(&self, message: &ChatMessage) -> ThreadLine {
        ThreadLine {
            own: Some(message.sender_id) == self.own_id,
            sender: self.sender_label(message.sender_id).to_string(),
            text: message.text.clone(),
            time: message.display_time(),
        }
    }

    pub fn update(&mut self, msg: Msg) -> Cmd {
        match msg {
            Msg::Mount => self.handle_mount(),
            Msg::Unmount => self.handle_unmount(),
            Msg::Open => self.handle_open(),
            Msg::Close => self.handle_close(),

            Msg::SearchChanged(query) => self.handle_search_changed(query),
            Msg::SearchFocused => self.handle_search_focused(),
            Msg::SearchBlurred => {
                self.search.blur();
                self.timers.start(TimerKind::SearchHide)
            }
            Msg::SearchKey(key) => match self.search.navigate(key) {
                Some(id) => self.select_user(id, true),
                None => Cmd::None,
            },
            Msg::PointerDown(id) => {
                if self.search.is_visible() && self.search.find(id).is_some() {
                    self.select_user(id, true)
                } else {
                    Cmd::None
                }
            }

            Msg::SelectUser(id) => self.select_user(id, false),
            Msg::BackToList => self.handle_back_to_list(),
            Msg::RefreshList => self.handle_refresh_list(),
            Msg::InputChanged(text) => {
                self.input = text;
                Cmd::None
            }
            Msg::Send => self.handle_send(),
            Msg::ScrollThread(delta) => {
                if let Some(thread) = self.thread.as_mut() {
                    thread.scroll_mut().scroll_by(delta);
                }
                Cmd::None
            }
            Msg::ViewportResized(rows) => {
                self.viewport = rows;
                if let Some(thread) = self.thread.as_mut() {
                    thread.scroll_mut().resize_viewport(rows);
                }
                Cmd::None
            }

            Msg::OpenDocumentPicker => self.handle_open_picker(),
            Msg::PickerKey(key) => self.handle_picker_key(key),
            Msg::CloseDocumentPicker => {
                self.close_picker();
                Cmd::None
            }
            Msg::ShareDocument(document_id) => self.handle_share(document_id),
            Msg::DismissNotice => {
                self.notice = None;
                Cmd::None
            }

            Msg::Tick(kind) => self.handle_tick(kind),

            Msg::UsersSearched { generation, result } => {
                if !self.generations.search.accept(generation) {
                    debug!("Dropping stale search response {}", generation);
                    return Cmd::None;
                }
                if let Some(users) = self.settle(FetchKind::Search, result) {
                    self.search.apply_results(users);
                }
                Cmd::None
            }
            Msg::UsersListed { generation, result } => self.handle_users_listed(generation, result),
            Msg::HistoryLoaded { generation, with, result } => {
                self.handle_history_loaded(generation, with, result)
            }
            Msg::MessageSent { to, text, result } => self.handle_message_sent(to, text, result),
            Msg::UnreadCounted { generation, result } => {
                if !self.generations.unread.accept(generation) || self.open {
                    debug!("Dropping unread count {} (widget open or stale)", generation);
                    return Cmd::None;
                }
                if let Some(count) = self.settle(FetchKind::Unread, result) {
                    self.badge = count;
                }
                Cmd::None
            }
            Msg::LatestFetched { generation, result } => self.handle_latest(generation, result),
            Msg::MarkedRead(result) => {
                if let Err(e) = result {
                    warn!("Failed to mark messages read: {}", e);
                }
                Cmd::None
            }
            Msg::ActivityPinged(result) => {
                if let Err(e) = result {
                    warn!("Presence heartbeat failed: {}", e);
                }
                Cmd::None
            }
            Msg::DocumentsListed { generation, result } => {
                if !self.generations.documents.accept(generation) || self.picker.is_none() {
                    debug!("Dropping document listing {}", generation);
                    return Cmd::None;
                }
                let documents = self.settle(FetchKind::Documents, result);
                match documents {
                    Some(documents) => {
                        self.picker = Some(DocumentPicker {
                            documents: Some(documents),
                            highlighted: 0,
                        });
                    }
                    None => self.picker = None,
                }
                Cmd::None
            }
            Msg::DocumentShared { to, result } => {
                if self.settle(FetchKind::Share, result).is_some() && self.view == View::Thread(to) {
                    return self.load_history(to);
                }
                Cmd::None
            }
        }
    }

    /// Record success or failure of a fetch; returns the value on success.
    fn settle<T>(&mut self, kind: FetchKind, result: Reply<T>) -> Option<T> {
        match result {
            Ok(value) => {
                if self.last_error.as_ref().map(|e| e.kind) == Some(kind) {
                    self.last_error = None;
                }
                Some(value)
            }
            Err(message) => {
                warn!("{:?} request failed: {}", kind, message);
                self.last_error = Some(FetchError { kind, message });
                None
            }
        }
    }

    fn handle_mount(&mut self) -> Cmd {
        if self.mounted {
            return Cmd::None;
        }
        info!("Chat widget mounted");
        self.mounted = true;
        let mut cmds = vec![self.timers.start(TimerKind::Heartbeat), Cmd::PingActivity];
        if self.open {
            cmds.push(self.enter_view());
        } else {
            cmds.push(self.start_badge_poll());
        }
        Cmd::batch(cmds)
    }

    fn handle_unmount(&mut self) -> Cmd {
        if !self.mounted {
            return Cmd::None;
        }
        info!("Chat widget unmounted");
        self.mounted = false;
        self.generations.invalidate_all();
        self.timers.stop_all()
    }

    fn handle_open(&mut self) -> Cmd {
        if self.open {
            return Cmd::None;
        }
        info!("Chat widget opened");
        self.open = true;
        self.badge = 0;
        self.generations.unread.invalidate();
        let stop_badge = self.timers.stop(TimerKind::UnreadBadge);
        Cmd::batch(vec![stop_badge, Cmd::MarkRead, self.enter_view()])
    }

    fn handle_close(&mut self) -> Cmd {
        if !self.open {
            return Cmd::None;
        }
        info!("Chat widget closed");
        self.open = false;
        self.flash = None;
        self.close_picker();
        self.search.blur();
        self.search.hide();
        self.generations.history.invalidate();
        self.generations.incoming.invalidate();
        let mut cmds = vec![
            self.timers.stop(TimerKind::History),
            self.timers.stop(TimerKind::Incoming),
            self.timers.stop(TimerKind::Flash),
            self.timers.stop(TimerKind::SearchHide),
        ];
        if self.mounted {
            cmds.push(self.start_badge_poll());
        }
        Cmd::batch(cmds)
    }

    /// Start the view-scoped work for the current view of an open widget.
    fn enter_view(&mut self) -> Cmd {
        if !self.mounted {
            return Cmd::None;
        }
        match self.view {
            View::UserList => Cmd::batch(vec![self.load_directory(), self.timers.start(TimerKind::Incoming)]),
            View::Thread(with) => Cmd::batch(vec![self.load_history(with), self.timers.start(TimerKind::History)]),
        }
    }

    fn start_badge_poll(&mut self) -> Cmd {
        let generation = self.generations.unread.issue();
        Cmd::batch(vec![
            self.timers.start(TimerKind::UnreadBadge),
            Cmd::FetchUnread { generation },
        ])
    }

    fn load_directory(&mut self) -> Cmd {
        Cmd::LoadAllUsers {
            generation: self.generations.directory.issue(),
        }
    }

    fn load_history(&mut self, with: UserId) -> Cmd {
        Cmd::LoadHistory {
            generation: self.generations.history.issue(),
            with,
        }
    }

    fn handle_search_changed(&mut self, query: String) -> Cmd {
        self.search.focus();
        self.search.set_query(query);
        self.issue_search()
    }

    fn handle_search_focused(&mut self) -> Cmd {
        self.search.focus();
        let cancel_hide = self.timers.stop(TimerKind::SearchHide);
        Cmd::batch(vec![cancel_hide, self.issue_search()])
    }

    fn issue_search(&mut self) -> Cmd {
        Cmd::SearchUsers {
            generation: self.generations.search.issue(),
            query: self.search.query().to_string(),
        }
    }

    /// Open the thread with `id`, cancelling list-scoped work first.
    fn select_user(&mut self, id: UserId, from_search: bool) -> Cmd {
        info!("Opening thread with user {}", id);
        let mut cmds = vec![
            self.timers.stop(TimerKind::Flash),
            self.timers.stop(TimerKind::Incoming),
            self.timers.stop(TimerKind::History),
        ];
        self.flash = None;
        self.close_picker();
        self.notice = None;
        self.generations.incoming.invalidate();
        self.generations.history.invalidate();

        if from_search {
            self.search.select(id);
        } else {
            self.search.hide();
        }
        self.directory.clear_unread(id);

        self.view = View::Thread(id);
        let mut thread = Thread::new(id);
        thread.scroll_mut().resize_viewport(self.viewport);
        self.thread = Some(thread);

        if self.open && self.mounted {
            cmds.push(self.load_history(id));
            cmds.push(self.timers.start(TimerKind::History));
        }
        Cmd::batch(cmds)
    }

    fn handle_back_to_list(&mut self) -> Cmd {
        if self.view == View::UserList {
            return Cmd::None;
        }
        self.view = View::UserList;
        self.thread = None;
        self.close_picker();
        self.generations.history.invalidate();
        let stop = self.timers.stop(TimerKind::History);
        let enter = if self.open { self.enter_view() } else { Cmd::None };
        Cmd::batch(vec![stop, enter])
    }

    fn handle_refresh_list(&mut self) -> Cmd {
        self.flash = None;
        let stop = self.timers.stop(TimerKind::Flash);
        if self.view != View::UserList || !self.open {
            return stop;
        }
        Cmd::batch(vec![stop, self.load_directory()])
    }

    fn handle_users_listed(&mut self, generation: u64, result: Reply<Vec<User>>) -> Cmd {
        if !self.generations.directory.accept(generation) {
            debug!("Dropping stale user listing {}", generation);
            return Cmd::None;
        }
        if let Some(users) = self.settle(FetchKind::Directory, result) {
            self.directory.replace(users);
            if let Some(flash) = self.flash {
                self.directory.promote(flash.user);
            }
        }
        Cmd::None
    }

    fn handle_history_loaded(&mut self, generation: u64, with: UserId, result: Reply<Vec<ChatMessage>>) -> Cmd {
        if !self.generations.history.accept(generation) || self.view != View::Thread(with) {
            debug!("Dropping stale history {} for user {}", generation, with);
            return Cmd::None;
        }
        if let Some(messages) = self.settle(FetchKind::History, result) {
            if let Some(thread) = self.thread.as_mut() {
                thread.replace(messages);
            }
        }
        Cmd::None
    }

    fn handle_send(&mut self) -> Cmd {
        let text = self.input.trim();
        match self.view {
            View::Thread(to) if !text.is_empty() => Cmd::SendMessage {
                to,
                text: text.to_string(),
            },
            _ => Cmd::None,
        }
    }

    fn handle_message_sent(&mut self, to: UserId, text: String, result: Reply<()>) -> Cmd {
        if self.settle(FetchKind::Send, result).is_none() {
            return Cmd::None;
        }
        if self.view != View::Thread(to) {
            return Cmd::None;
        }
        if self.input.trim() == text {
            self.input.clear();
        }
        if let Some(thread) = self.thread.as_mut() {
            thread.push_pending(text);
        }
        Cmd::batch(vec![Cmd::FocusInput, self.load_history(to)])
    }

    fn handle_latest(&mut self, generation: u64, result: Reply<Option<LatestMessage>>) -> Cmd {
        if !self.generations.incoming.accept(generation) || !self.open || self.view != View::UserList {
            debug!("Dropping latest-message reply {}", generation);
            return Cmd::None;
        }
        let Some(Some(latest)) = self.settle(FetchKind::Incoming, result) else {
            return Cmd::None;
        };
        if Some(latest.sender_id) == self.own_id || self.last_seen.as_ref() == Some(&latest) {
            return Cmd::None;
        }

        let sender = latest.sender_id;
        info!("New message from user {} while browsing the list", sender);
        self.last_seen = Some(latest);
        let known = self.directory.promote(sender);
        self.directory.bump_unread(sender);
        self.flash = Some(Flash { user: sender, lit: true });

        let mut cmds = vec![self.timers.start(TimerKind::Flash)];
        if !known {
            cmds.push(self.load_directory());
        }
        Cmd::batch(cmds)
    }

    fn handle_tick(&mut self, kind: TimerKind) -> Cmd {
        if !self.timers.fired(kind) {
            debug!("Ignoring tick from stopped {:?} timer", kind);
            return Cmd::None;
        }
        match kind {
            TimerKind::History => match self.view {
                View::Thread(with) if self.open => self.load_history(with),
                _ => Cmd::None,
            },
            TimerKind::UnreadBadge if !self.open => Cmd::FetchUnread {
                generation: self.generations.unread.issue(),
            },
            TimerKind::Incoming if self.open && self.view == View::UserList => Cmd::FetchLatest {
                generation: self.generations.incoming.issue(),
            },
            TimerKind::Flash => {
                if let Some(flash) = self.flash.as_mut() {
                    flash.lit = !flash.lit;
                }
                Cmd::None
            }
            TimerKind::Heartbeat if self.mounted => Cmd::PingActivity,
            TimerKind::SearchHide => {
                if !self.search.is_focused() {
                    self.search.hide();
                }
                Cmd::None
            }
            _ => Cmd::None,
        }
    }

    fn handle_open_picker(&mut self) -> Cmd {
        if self.view.selected_user().is_none() {
            self.notice = Some(SELECT_USER_FIRST.to_string());
            return Cmd::None;
        }
        self.notice = None;
        self.picker = Some(DocumentPicker::default());
        Cmd::ListDocuments {
            generation: self.generations.documents.issue(),
        }
    }

    /// Drop the picker along with any listing still in flight for it.
    fn close_picker(&mut self) {
        self.picker = None;
        self.generations.documents.invalidate();
    }

    fn handle_picker_key(&mut self, key: NavKey) -> Cmd {
        let Some(picker) = self.picker.as_mut() else {
            return Cmd::None;
        };
        let Some(documents) = picker.documents.as_ref() else {
            return Cmd::None;
        };
        match key {
            NavKey::Down => {
                picker.highlighted = (picker.highlighted + 1).min(documents.len().saturating_sub(1));
                Cmd::None
            }
            NavKey::Up => {
                picker.highlighted = picker.highlighted.saturating_sub(1);
                Cmd::None
            }
            NavKey::Enter => {
                let selected = documents.get(picker.highlighted).map(|d| d.id);
                match selected {
                    Some(document_id) => self.handle_share(document_id),
                    None => Cmd::None,
                }
            }
        }
    }

    fn handle_share(&mut self, document_id: i64) -> Cmd {
        self.close_picker();
        match self.view {
            View::Thread(to) => Cmd::ShareDocument { document_id, to },
            View::UserList => {
                self.notice = Some(SELECT_USER_FIRST.to_string());
                Cmd::None
            }
        }
    }
}
