use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use log::info;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parley::{
    AppConfig, AuthSession, CacheStore, CredentialStore, DataGateway, Draft, Outbox,
    RemoteGateway, SimulatedGateway, SyncCoordinator,
};

/// Command line arguments for the parley client.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Parley: a messaging client sync core with a CLI front.",
    long_about = "Parley keeps a durable local mirror of chats, messages and users,\n\
    synchronized against a backend (or a deterministic simulation with --simulate)."
)]
struct Args {
    /// Backend server root, e.g. http://localhost:3001
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Use the deterministic simulated gateway instead of a real server
    #[arg(long)]
    simulate: bool,

    /// Override the directory holding the cache and session files
    #[arg(long, value_name = "PATH")]
    data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in; reads PARLEY_LOGIN / PARLEY_PASSWORD or prompts
    Login,
    /// Show the signed-in user
    Whoami,
    /// Drop the stored session
    Logout,
    /// List cached chats after refreshing them from the gateway
    Chats,
    /// Show a chat's messages; refreshes the first page unless --more
    Messages {
        chat_id: String,
        /// Backfill one more page of history instead of reloading
        #[arg(long)]
        more: bool,
    },
    /// Send a text message to a chat
    Send { chat_id: String, text: String },
    /// Search users by name, username or email
    Search { query: String },
    /// Start a direct chat with a user
    NewChat { user_id: String },
    /// Follow cache updates while refreshing the chat list periodically
    Watch,
    /// Wipe the local cache (chats, messages, users)
    ClearCache,
}

/// Read a line of input from stdin, trimming whitespace.
fn read_line() -> Result<String> {
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Login credentials from the environment, prompting for whatever is missing.
fn prompt_login() -> Result<(String, String)> {
    let login = match env::var("PARLEY_LOGIN") {
        Ok(login) => login,
        Err(_) => {
            eprintln!("Enter email or username:");
            read_line()?
        }
    };
    let password = match env::var("PARLEY_PASSWORD") {
        Ok(password) => password,
        Err(_) => {
            eprintln!("Enter password:");
            read_line()?
        }
    };
    Ok((login, password))
}

fn data_dir(args: &Args) -> Result<PathBuf> {
    if let Some(dir) = &args.data_dir {
        return Ok(dir.clone());
    }
    if let Ok(dir) = env::var("PARLEY_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    Ok(dirs::data_dir()
        .ok_or_else(|| anyhow!("could not determine data directory"))?
        .join("parley"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let mut config = AppConfig::from_env();
    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.trim_end_matches('/').to_string();
    }

    // Explicit wiring: one instance of each component, no hidden globals.
    let dir = data_dir(&args)?;
    let store = Arc::new(CacheStore::open(&dir)?);
    let credentials = Arc::new(CredentialStore::open(&dir)?);
    let gateway: Arc<dyn DataGateway> = if args.simulate {
        info!("Using the simulated gateway");
        Arc::new(SimulatedGateway::new())
    } else {
        Arc::new(RemoteGateway::new(&config, credentials.clone())?)
    };
    let auth = AuthSession::new(gateway.clone(), store.clone(), credentials);
    let sync = SyncCoordinator::new(gateway.clone(), store.clone(), config.page_size);
    let outbox = Outbox::new(gateway, store.clone());

    match args.command {
        Command::Login => {
            let (login, password) = prompt_login()?;
            let user = auth.login(&login, &password).await?;
            println!("Signed in as {} ({})", user.name, user.id);
        }
        Command::Whoami => match auth.current_user() {
            Some(user) => println!("{} ({})", user.name, user.id),
            None => println!("Not signed in"),
        },
        Command::Logout => {
            auth.logout()?;
            println!("Signed out");
        }
        Command::Chats => {
            if let Err(err) = sync.load_chats().await {
                eprintln!("Refresh failed, showing cached chats: {:#}", err);
            }
            let me = auth.current_user().map(|u| u.id).unwrap_or_default();
            let mut chats = store.chats();
            // Presentation ordering: pinned first, then most recent activity.
            chats.sort_by(|a, b| {
                b.is_pinned
                    .cmp(&a.is_pinned)
                    .then(b.last_message_date.cmp(&a.last_message_date))
            });
            for chat in chats {
                let other = chat.other_participant(&me).unwrap_or("?");
                let name = match sync.resolve_user(other).await {
                    Ok(user) => user.name,
                    Err(_) => other.to_string(),
                };
                let preview = chat
                    .last_message
                    .as_ref()
                    .map(|m| m.text.clone())
                    .unwrap_or_default();
                let pin = if chat.is_pinned { "*" } else { " " };
                println!("{} {:<12} {:<20} {}", pin, chat.id, name, preview);
            }
        }
        Command::Messages { chat_id, more } => {
            let result = if more {
                sync.load_more_messages(&chat_id).await
            } else {
                sync.load_messages(&chat_id).await
            };
            if let Err(err) = result {
                eprintln!("Fetch failed, showing cached messages: {:#}", err);
            }
            for message in store.messages(&chat_id) {
                println!(
                    "[{}] {:<12} {:?} {}",
                    message.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    message.sender_id,
                    message.status,
                    message.text.as_deref().unwrap_or("<attachment>")
                );
            }
        }
        Command::Send { chat_id, text } => {
            let me = auth
                .current_user()
                .ok_or_else(|| anyhow!("not signed in; run `parley login` first"))?;
            let sent = outbox.send(&chat_id, &me.id, Draft::text(text)).await?;
            println!("Sent {} at {}", sent.id, sent.timestamp.format("%H:%M:%S"));
        }
        Command::Search { query } => {
            for user in sync.search_users(&query).await? {
                println!(
                    "{:<12} {:<20} {}",
                    user.id,
                    user.name,
                    user.email.as_deref().unwrap_or("")
                );
            }
        }
        Command::NewChat { user_id } => {
            let chat = sync.create_chat(&user_id).await?;
            println!("Created chat {}", chat.id);
        }
        Command::Watch => {
            let mut updates = store.updates();
            let refresher = tokio::spawn({
                let sync = Arc::new(sync);
                async move {
                    loop {
                        if let Err(err) = sync.load_chats().await {
                            eprintln!("Refresh failed: {:#}", err);
                        }
                        tokio::time::sleep(Duration::from_secs(10)).await;
                    }
                }
            });
            println!("Watching cache updates (ctrl-c to stop)");
            while let Some(revision) = updates.next().await {
                println!("cache revision {}", revision);
            }
            refresher.abort();
        }
        Command::ClearCache => {
            store.clear()?;
            println!("Cache cleared");
        }
    }

    Ok(())
}
