mod config;
mod error;

use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use runtime::{AnthropicBackend, Session, bind};
use storage::{Event, EventKind, EventStore, Role};
use tracing_subscriber::EnvFilter;
use wire::HostClient;

use config::Config;
use error::{Error, Result};

const SYSTEM_PROMPT: &str = "You are Coxswain, a coding agent that helps with software \
development tasks. You can read and write files, list and create directories, check whether \
paths exist, and execute shell commands, all inside the current workspace. Break complex tasks \
into smaller steps, explain what you are doing, and verify your work after changing anything. \
When a tool call fails, read the error and correct your arguments rather than giving up.";

const CONFIG_FILE: &str = "coxswain.toml";

#[derive(Parser)]
#[command(name = "coxswain")]
#[command(about = "An AI coding agent driven by remotely hosted tools", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Connect to an external tool host instead of starting one in-process
        #[arg(long)]
        host_url: Option<String>,
    },
    /// Run the tool host as a standalone process
    Serve {
        /// Address to bind (overrides host.bind_addr from the config)
        #[arg(long)]
        addr: Option<String>,
    },
    /// List all sessions
    Sessions {
        /// Show only the last N sessions
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Show event logs for a session
    Logs {
        /// Session ID (prefix match supported)
        #[arg(short, long)]
        session: String,
        /// Filter by event kind (message, tool_call, tool_result)
        #[arg(short, long)]
        kind: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        None => cmd_chat(None).await,
        Some(Commands::Chat { host_url }) => cmd_chat(host_url).await,
        Some(Commands::Serve { addr }) => cmd_serve(addr).await,
        Some(Commands::Sessions { limit }) => cmd_sessions(limit),
        Some(Commands::Logs { session, kind }) => cmd_logs(&session, kind.as_deref()),
    }
}

async fn cmd_chat(host_url: Option<String>) -> Result<()> {
    println!("coxswain v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load_or_default(CONFIG_FILE)?;
    let auth = config.auth()?;

    // Either connect to an external tool host or start one in-process, the
    // way a single-machine session runs.
    let base_url = match host_url {
        Some(url) => url,
        None => {
            let addr: SocketAddr = config.host.bind_addr.parse().map_err(|e| {
                config::ConfigError::Parse(format!("invalid host.bind_addr: {e}"))
            })?;
            let registry = Arc::new(host::standard_registry(
                config.host.workspace.clone(),
                config.command_timeout(),
                config.host.allowed_commands.clone(),
            ));
            tokio::spawn(async move {
                if let Err(e) = host::serve(addr, registry).await {
                    tracing::error!(error = %e, "tool host exited");
                }
            });
            format!("http://{}", config.host.bind_addr)
        }
    };

    let client = HostClient::new(&base_url).with_timeout(config.tool_timeout());
    let tools = bind(client, config.tool_timeout()).await?;
    println!("Tool host: {base_url} ({} tools)", tools.len());
    for name in tools.collisions() {
        eprintln!("Warning: duplicate tool name in discovery ignored: {name}");
    }

    let data_dir = dirs_data_dir().unwrap_or_else(|| ".coxswain".into());
    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("events.db");
    let store = EventStore::open(&db_path)?;

    let backend = AnthropicBackend::builder(auth, &config.backend.model)
        .system(SYSTEM_PROMPT)
        .build();

    let mut session = Session::new(store, backend, tools, config.session_config())?;
    println!("Session ID: {}", session.id);
    println!("Model: {}", config.backend.model);
    println!("Type 'quit' or Ctrl+D to exit.\n");

    // Ctrl+C interrupts the turn in flight, not the whole program.
    let cancel = session.cancel_handle();
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            cancel.cancel();
        }
    });

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        match session.process_turn(input).await {
            Ok(response) => {
                println!("\n{response}\n");
            }
            Err(runtime::Error::Cancelled) => {
                eprintln!("\nInterrupted.\n");
            }
            Err(e) => {
                // Turn-fatal errors leave the session usable; report and
                // let the user try again.
                eprintln!("Error: {e}\n");
            }
        }
    }

    session.end()?;
    println!("\nSession ended.");
    Ok(())
}

async fn cmd_serve(addr: Option<String>) -> Result<()> {
    let config = Config::load_or_default(CONFIG_FILE)?;
    let bind_addr = addr.unwrap_or_else(|| config.host.bind_addr.clone());
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| config::ConfigError::Parse(format!("invalid bind address: {e}")))?;

    let registry = Arc::new(host::standard_registry(
        config.host.workspace.clone(),
        config.command_timeout(),
        config.host.allowed_commands.clone(),
    ));

    println!(
        "Serving {} tools at http://{bind_addr} (workspace: {})",
        registry.len(),
        config.host.workspace.display()
    );
    host::serve(addr, registry).await?;
    Ok(())
}

fn cmd_sessions(limit: usize) -> Result<()> {
    let store = open_store()?;
    let sessions = store.list_sessions()?;

    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<20}  {:<8}  STATUS",
        "SESSION ID", "STARTED", "MSGS"
    );
    println!("{}", "-".repeat(80));

    for summary in sessions.into_iter().take(limit) {
        let started = Local
            .from_utc_datetime(&summary.started_at.naive_utc())
            .format("%Y-%m-%d %H:%M");
        let status = if summary.ended_at.is_some() {
            "ended"
        } else {
            "active"
        };
        println!(
            "{:<36}  {:<20}  {:<8}  {status}",
            summary.id, started, summary.message_count
        );
    }

    Ok(())
}

fn cmd_logs(session_prefix: &str, kind_filter: Option<&str>) -> Result<()> {
    let store = open_store()?;

    // Find session by prefix
    let sessions = store.list_sessions()?;
    let matching: Vec<_> = sessions
        .iter()
        .filter(|s| s.id.to_string().starts_with(session_prefix))
        .collect();

    let session_id = match matching.len() {
        0 => {
            return Err(Error::SessionNotFound {
                prefix: session_prefix.to_string(),
            });
        }
        1 => matching[0].id,
        _ => {
            return Err(Error::AmbiguousSession {
                prefix: session_prefix.to_string(),
                matches: matching.iter().map(|s| s.id.to_string()).collect(),
            });
        }
    };

    let events = store.load_events(session_id, kind_filter)?;

    if events.is_empty() {
        println!("No events found for session {session_id}");
        return Ok(());
    }

    println!("Session: {session_id}\n");

    for event in events {
        print_event(&event);
    }

    Ok(())
}

fn print_event(event: &Event) {
    let time = Local
        .from_utc_datetime(&event.timestamp.naive_utc())
        .format("%H:%M:%S");

    match &event.kind {
        EventKind::SessionStart => {
            println!("[{time}] === Session started ===");
        }
        EventKind::SessionEnd => {
            println!("[{time}] === Session ended ===");
        }
        EventKind::Message { role, content } => {
            let role_str = match role {
                Role::User => "USER",
                Role::Assistant => "ASSISTANT",
                Role::System => "SYSTEM",
            };
            // Truncate long messages for display
            let display_content = if content.len() > 200 {
                format!("{}...", &content[..200])
            } else {
                content.clone()
            };
            println!("[{time}] {role_str}: {display_content}");
        }
        EventKind::ToolCall { name, arguments } => {
            println!("[{time}] TOOL CALL: {name} {arguments}");
        }
        EventKind::ToolResult {
            name,
            success,
            output,
        } => {
            let status = if *success { "ok" } else { "failed" };
            println!("[{time}] TOOL RESULT ({status}): {name} {output}");
        }
    }
}

fn open_store() -> Result<EventStore> {
    let data_dir = dirs_data_dir().unwrap_or_else(|| ".coxswain".into());
    let db_path = data_dir.join("events.db");

    if !db_path.exists() {
        return Err(Error::DatabaseNotFound { path: db_path });
    }

    Ok(EventStore::open(&db_path)?)
}

fn dirs_data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share/coxswain"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share")))
            .map(|p| p.join("coxswain"))
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|h| PathBuf::from(h).join("coxswain"))
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        None
    }
}
