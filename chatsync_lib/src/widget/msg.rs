use super::selector::NavKey;
use crate::types::{ChatMessage, KnowledgeDocument, LatestMessage, TimerKind, User, UserId};

/// Outcome of a backend call as seen by the widget. Errors arrive already
/// rendered so messages stay cheap to clone.
pub type Reply<T> = std::result::Result<T, String>;

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    // Lifecycle
    Mount,
    Unmount,
    Open,
    Close,

    // Conversation selector
    SearchChanged(String),
    SearchFocused,
    SearchBlurred,
    SearchKey(NavKey),
    PointerDown(UserId),

    // User list and thread
    SelectUser(UserId),
    BackToList,
    RefreshList,
    InputChanged(String),
    Send,
    ScrollThread(i32),
    ViewportResized(u16),

    // Knowledge-base sharing
    OpenDocumentPicker,
    PickerKey(NavKey),
    CloseDocumentPicker,
    ShareDocument(i64),
    DismissNotice,

    // Timers
    Tick(TimerKind),

    // Backend replies
    UsersSearched { generation: u64, result: Reply<Vec<User>> },
    UsersListed { generation: u64, result: Reply<Vec<User>> },
    HistoryLoaded { generation: u64, with: UserId, result: Reply<Vec<ChatMessage>> },
    MessageSent { to: UserId, text: String, result: Reply<()> },
    UnreadCounted { generation: u64, result: Reply<u32> },
    LatestFetched { generation: u64, result: Reply<Option<LatestMessage>> },
    MarkedRead(Reply<()>),
    ActivityPinged(Reply<()>),
    DocumentsListed { generation: u64, result: Reply<Vec<KnowledgeDocument>> },
    DocumentShared { to: UserId, result: Reply<()> },
}

/// Side effects requested by the widget. The runtime performs them and feeds
/// the outcome back as a [`Msg`].
#[derive(Debug, Clone, PartialEq)]
pub enum Cmd {
    None,
    Batch(Vec<Cmd>),

    // Timer Commands
    StartTimer(TimerKind),
    StopTimer(TimerKind),

    // Backend Commands
    SearchUsers { generation: u64, query: String },
    LoadAllUsers { generation: u64 },
    LoadHistory { generation: u64, with: UserId },
    SendMessage { to: UserId, text: String },
    FetchUnread { generation: u64 },
    MarkRead,
    FetchLatest { generation: u64 },
    PingActivity,
    ListDocuments { generation: u64 },
    ShareDocument { document_id: i64, to: UserId },

    // UI Commands
    FocusInput,
}

impl Cmd {
    /// Combine commands, dropping `None`s and collapsing trivial batches.
    pub fn batch(cmds: Vec<Cmd>) -> Cmd {
        let mut cmds: Vec<Cmd> = cmds.into_iter().filter(|c| *c != Cmd::None).collect();
        match cmds.len() {
            0 => Cmd::None,
            1 => cmds.remove(0),
            _ => Cmd::Batch(cmds),
        }
    }

    /// Flatten into execution order.
    pub fn into_vec(self) -> Vec<Cmd> {
        match self {
            Cmd::None => Vec::new(),
            Cmd::Batch(cmds) => cmds.into_iter().flat_map(Cmd::into_vec).collect(),
            cmd => vec![cmd],
        }
    }
}
