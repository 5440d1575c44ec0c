use chatsync_lib::widget::Flash;
use chatsync_lib::{
    load_env_files, with_retry, ChatBackend, ChatMessage, ChatSyncClient, ChatSyncConfig,
    RetryPolicy, User, UserId,
};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Error, Debug)]
enum CliError {
    #[error("Chat backend error: {0}")]
    ChatSync(#[from] chatsync_lib::ChatSyncError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tracing error: {0}")]
    Tracing(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("Missing argument: --{0}")]
    MissingArg(&'static str),

    #[error("Message must not be blank")]
    BlankMessage,
}

fn cli() -> Command {
    Command::new("chatsync_cli")
        .version("0.1.0")
        .about("Command-line client for the polling chat backend")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .value_name("URL")
                .help("Backend base URL (overrides CHATSYNC_BASE_URL)")
                .global(true),
        )
        .arg(
            Arg::new("user-id")
                .long("user-id")
                .value_name("ID")
                .value_parser(value_parser!(i64))
                .help("Id of the local user (overrides CHATSYNC_USER_ID)")
                .global(true),
        )
        .arg(
            Arg::new("session")
                .long("session")
                .value_name("COOKIE")
                .help("Cookie header carrying the backend session (overrides CHATSYNC_SESSION)")
                .global(true),
        )
        .arg(
            Arg::new("demo")
                .long("demo")
                .action(ArgAction::SetTrue)
                .help("Use the built-in demo data instead of a backend")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .help("Enable debug logging")
                .global(true),
        )
        .subcommand(
            Command::new("search").about("Searches users by name").arg(
                Arg::new("query")
                    .long("query")
                    .value_name("TEXT")
                    .help("Search text")
                    .required(true),
            ),
        )
        .subcommand(Command::new("users").about("Lists every user with presence"))
        .subcommand(
            Command::new("history")
                .about("Shows the conversation with a user")
                .arg(user_arg("with", "User whose thread to show")),
        )
        .subcommand(
            Command::new("send")
                .about("Sends a direct message")
                .arg(user_arg("to", "Recipient user id"))
                .arg(
                    Arg::new("message")
                        .long("message")
                        .value_name("TEXT")
                        .help("Message text")
                        .required(true),
                ),
        )
        .subcommand(Command::new("unread").about("Prints the unread message count"))
        .subcommand(Command::new("mark-read").about("Marks all messages as read"))
        .subcommand(Command::new("latest").about("Shows the newest unread message, if any"))
        .subcommand(Command::new("ping").about("Sends a presence heartbeat"))
        .subcommand(Command::new("documents").about("Lists knowledge-base documents"))
        .subcommand(
            Command::new("share")
                .about("Shares a knowledge-base document into a thread")
                .arg(
                    Arg::new("doc")
                        .long("doc")
                        .value_name("ID")
                        .value_parser(value_parser!(i64))
                        .help("Document id")
                        .required(true),
                )
                .arg(user_arg("to", "Recipient user id")),
        )
        .subcommand(
            Command::new("watch")
                .about("Runs the sync client and prints what it sees")
                .arg(
                    Arg::new("with")
                        .long("with")
                        .value_name("ID")
                        .value_parser(value_parser!(i64))
                        .help("Open the thread with this user instead of the user list"),
                )
                .arg(
                    Arg::new("seconds")
                        .long("seconds")
                        .value_name("N")
                        .value_parser(value_parser!(u64))
                        .default_value("30")
                        .help("How long to watch"),
                ),
        )
}

fn user_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .value_name("ID")
        .value_parser(value_parser!(i64))
        .help(help)
        .required(true)
}

fn user_id(matches: &ArgMatches, name: &'static str) -> Result<UserId, CliError> {
    matches
        .get_one::<i64>(name)
        .map(|id| UserId(*id))
        .ok_or(CliError::MissingArg(name))
}

fn text_arg<'a>(matches: &'a ArgMatches, name: &'static str) -> Result<&'a str, CliError> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or(CliError::MissingArg(name))
}

fn build_config(matches: &ArgMatches) -> ChatSyncConfig {
    load_env_files();
    let mut config = ChatSyncConfig::from_env();
    if let Some(url) = matches.get_one::<String>("base-url") {
        config.base_url = url.clone();
    }
    if let Some(id) = matches.get_one::<i64>("user-id") {
        config.current_user_id = Some(UserId(*id));
    }
    if let Some(cookie) = matches.get_one::<String>("session") {
        config.session_cookie = Some(cookie.clone());
    }
    config
}

fn presence(user: &User) -> &'static str {
    if user.online {
        "online"
    } else {
        "offline"
    }
}

fn print_users(users: &[User], empty: &str) {
    if users.is_empty() {
        println!("{}", empty);
        return;
    }
    for user in users {
        println!("{}\t{}\t{}", user.id, user.username, presence(user));
    }
}

fn format_message(message: &ChatMessage, own_id: Option<UserId>, names: &HashMap<UserId, String>) -> String {
    let sender = if Some(message.sender_id) == own_id {
        "You"
    } else {
        names.get(&message.sender_id).map(String::as_str).unwrap_or("User")
    };
    match message.display_time() {
        Some(time) => format!("[{}] {}: {}", time, sender, message.text),
        None => format!("{}: {}", sender, message.text),
    }
}

/// Best-effort id -> name map for labelling senders.
async fn directory_names(backend: &dyn ChatBackend, retry: RetryPolicy) -> HashMap<UserId, String> {
    match with_retry(retry, || backend.list_users()).await {
        Ok(users) => users.into_iter().map(|u| (u.id, u.username)).collect(),
        Err(e) => {
            tracing::warn!("Could not load user names: {}", e);
            HashMap::new()
        }
    }
}

async fn watch(backend: Arc<dyn ChatBackend>, config: &ChatSyncConfig, with: Option<UserId>, seconds: u64) {
    let mut client = ChatSyncClient::new(backend, config);
    client.mount();
    client.open();
    if let Some(user) = with {
        client.open_thread(user);
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(seconds);
    let mut printed_lines = 0;
    let mut last_flash: Option<UserId> = None;
    let mut last_error: Option<String> = None;

    while tokio::time::timeout_at(deadline, client.next()).await.is_ok() {
        let widget = client.widget();

        if let Some(Flash { user, .. }) = widget.flash() {
            if last_flash != Some(user) {
                println!("New message from {}", widget.display_name(user));
            }
        }
        last_flash = widget.flash().map(|f| f.user);

        if widget.thread().map_or(false, |t| t.is_loaded()) {
            let lines = widget.thread_lines();
            if lines.len() < printed_lines {
                printed_lines = 0;
            }
            for line in &lines[printed_lines..] {
                match &line.time {
                    Some(time) => println!("[{}] {}: {}", time, line.sender, line.text),
                    None => println!("{}: {}", line.sender, line.text),
                }
            }
            printed_lines = lines.len();
        }

        let error = widget.last_error().map(|e| e.message.clone());
        if error.is_some() && error != last_error {
            if let Some(message) = &error {
                eprintln!("Request failed: {}", message);
            }
        }
        last_error = error;
    }

    client.unmount();
}

async fn run(matches: ArgMatches) -> Result<(), CliError> {
    let config = build_config(&matches);
    let demo = matches.get_flag("demo");

    // Validate locally before touching the backend.
    if let Some(("send", sub_matches)) = matches.subcommand() {
        if text_arg(sub_matches, "message")?.trim().is_empty() {
            return Err(CliError::BlankMessage);
        }
    }

    let backend = chatsync_lib::connect(&config, demo).await?;
    let retry = config.retry;
    let own_id = if demo {
        config.current_user_id.or(Some(UserId(1)))
    } else {
        config.current_user_id
    };

    match matches.subcommand() {
        Some(("search", sub_matches)) => {
            let query = text_arg(sub_matches, "query")?;
            let users = with_retry(retry, || backend.search_users(query)).await?;
            print_users(&users, chatsync_lib::widget::NO_USERS_FOUND);
        }
        Some(("users", _)) => {
            let users = with_retry(retry, || backend.list_users()).await?;
            let online = users.iter().filter(|u| u.online).count();
            println!("Online: {}  Offline: {}", online, users.len() - online);
            print_users(&users, "No users.");
        }
        Some(("history", sub_matches)) => {
            let with = user_id(sub_matches, "with")?;
            let messages = with_retry(retry, || backend.fetch_history(with)).await?;
            if messages.is_empty() {
                println!("{}", chatsync_lib::widget::NO_MESSAGES);
            } else {
                let names = directory_names(backend.as_ref(), retry).await;
                for message in &messages {
                    println!("{}", format_message(message, own_id, &names));
                }
            }
        }
        Some(("send", sub_matches)) => {
            let to = user_id(sub_matches, "to")?;
            let message = text_arg(sub_matches, "message")?.trim();
            // Sends, shares and pings go out once.
            backend.send_message(to, message).await?;
            println!("Message sent.");
        }
        Some(("unread", _)) => {
            println!("{}", with_retry(retry, || backend.unread_count()).await?);
        }
        Some(("mark-read", _)) => {
            with_retry(retry, || backend.mark_read()).await?;
            println!("Marked all messages read.");
        }
        Some(("latest", _)) => match with_retry(retry, || backend.latest_message()).await? {
            Some(latest) => {
                let names = directory_names(backend.as_ref(), retry).await;
                let sender = names
                    .get(&latest.sender_id)
                    .cloned()
                    .unwrap_or_else(|| format!("user {}", latest.sender_id));
                println!("From {}: {}", sender, latest.text.unwrap_or_default());
            }
            None => println!("No new messages."),
        },
        Some(("ping", _)) => {
            backend.update_activity().await?;
            println!("Activity updated.");
        }
        Some(("documents", _)) => {
            let documents = with_retry(retry, || backend.list_documents()).await?;
            if documents.is_empty() {
                println!("No documents.");
            }
            for document in documents {
                println!("{}\t{}", document.id, document.label());
            }
        }
        Some(("share", sub_matches)) => {
            let document_id = sub_matches
                .get_one::<i64>("doc")
                .copied()
                .ok_or(CliError::MissingArg("doc"))?;
            let to = user_id(sub_matches, "to")?;
            backend.share_document(document_id, to).await?;
            println!("Document shared.");
        }
        Some(("watch", sub_matches)) => {
            let with = sub_matches.get_one::<i64>("with").map(|id| UserId(*id));
            let seconds = sub_matches.get_one::<u64>("seconds").copied().unwrap_or(30);
            let config = ChatSyncConfig {
                current_user_id: own_id,
                ..config
            };
            watch(backend, &config, with, seconds).await;
        }
        _ => unreachable!(),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let matches = cli().get_matches();

    let level = if matches.get_flag("verbose") {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Err(e) = run(matches).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let matches = cli()
            .try_get_matches_from(["chatsync_cli", "users", "--base-url", "http://chat:9", "--user-id", "4"])
            .unwrap();
        let config = build_config(&matches);
        assert_eq!(config.base_url, "http://chat:9");
        assert_eq!(config.current_user_id, Some(UserId(4)));
    }

    #[test]
    fn test_message_labels() {
        let names = HashMap::from([(UserId(3), "Sarah".to_string())]);
        let mut message = ChatMessage::new(UserId(3), "hi");
        message.timestamp = Some("2024-01-01T08:05:00".into());
        assert_eq!(format_message(&message, Some(UserId(1)), &names), "[08:05] Sarah: hi");
        let mine = ChatMessage::new(UserId(1), "yo");
        assert_eq!(format_message(&mine, Some(UserId(1)), &names), "You: yo");
        let stranger = ChatMessage::new(UserId(9), "?");
        assert_eq!(format_message(&stranger, Some(UserId(1)), &names), "User: ?");
    }
}
