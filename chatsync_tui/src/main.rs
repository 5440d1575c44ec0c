use anyhow::Result;
use chatsync_lib::{load_env_files, ChatBackend, ChatSyncClient, ChatSyncConfig, MockChatService, UserId};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, layout::Rect, Terminal};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod error;
mod theme;
mod ui;

use app::{App, AppResult};
use error::ChatSyncTuiError;

const LOG_FILE: &str = "chatsync_tui.log";
const DEMO_MESSAGE_EVERY: Duration = Duration::from_secs(20);

#[derive(Parser, Debug)]
#[command(name = "chatsync_tui", about = "Terminal chat widget for the polling chat backend")]
struct Args {
    /// Use the built-in demo data and simulate incoming messages
    #[arg(long)]
    demo: bool,

    /// Backend base URL (overrides CHATSYNC_BASE_URL)
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Id of the local user (overrides CHATSYNC_USER_ID)
    #[arg(long, value_name = "ID")]
    user_id: Option<i64>,

    /// Cookie header carrying the backend session (overrides CHATSYNC_SESSION)
    #[arg(long, value_name = "COOKIE")]
    session: Option<String>,
}

/// Log directory under the platform data dir, falling back to the temp dir.
fn log_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("chatsync")
}

/// Stdout belongs to the terminal, so logs go to a file in `dir`.
fn init_logging(dir: &Path) -> error::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(LOG_FILE);
    let file = File::options().create(true).append(true).open(&path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("chatsync_tui=debug,chatsync_lib=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| ChatSyncTuiError::Logging { message: e.to_string() })?;
    Ok(path)
}

fn build_config(args: &Args) -> ChatSyncConfig {
    load_env_files();
    let mut config = ChatSyncConfig::from_env();
    if let Some(url) = &args.base_url {
        config.base_url = url.clone();
    }
    if let Some(id) = args.user_id {
        config.current_user_id = Some(UserId(id));
    }
    if let Some(cookie) = &args.session {
        config.session_cookie = Some(cookie.clone());
    }
    if args.demo && config.current_user_id.is_none() {
        config.current_user_id = Some(UserId(1));
    }
    config
}

/// Demo backend plus a task that keeps messages arriving from its users.
async fn demo_backend() -> Arc<dyn ChatBackend> {
    let mock = MockChatService::new_with_data().await;
    let feed = mock.clone();
    tokio::spawn(async move {
        let lines = [
            (UserId(7), "Do you have a minute to look at the NDA?"),
            (UserId(4), "Client call moved to 3pm."),
            (UserId(3), "I left comments on section 4.2."),
            (UserId(5), "Can you share the research memo?"),
        ];
        for (sender, text) in lines.iter().cycle() {
            tokio::time::sleep(DEMO_MESSAGE_EVERY).await;
            feed.push_incoming(*sender, text).await;
        }
    });
    Arc::new(mock)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_path = init_logging(&log_dir())?;
    info!("Starting chat TUI, logging to {}", log_path.display());

    let config = build_config(&args);
    let backend = if args.demo {
        demo_backend().await
    } else {
        chatsync_lib::connect(&config, false).await?
    };
    let mut app = App::new(ChatSyncClient::new(backend, &config));

    // Setup terminal
    enable_raw_mode().map_err(|e| anyhow::anyhow!("Failed to enable raw mode: {}", e))?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .map_err(|e| anyhow::anyhow!("Failed to setup terminal: {}", e))?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)
        .map_err(|e| anyhow::anyhow!("Failed to create terminal: {}", e))?;

    app.start();
    let res = run_app(&mut terminal, &mut app).await;
    app.stop();

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}

async fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        app.tick();

        let mut area = Rect::default();
        terminal.draw(|f| {
            area = f.area();
            ui::draw(f, app);
        })?;
        app.resize(area);

        // Poll briefly so timer ticks and responses are drawn without input.
        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match app.handle_key(key) {
                    AppResult::Continue => {}
                    AppResult::Exit => return Ok(()),
                },
                Event::Mouse(mouse) => app.handle_mouse(mouse),
                _ => {}
            }
        } else {
            tokio::task::yield_now().await;
        }
    }
}
