// ABOUTME: Command-line front-end for the remote IDE session layer
// Browses the workspace tree, reads and writes files, and attaches to the host shell

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use ide_session::{
    channel::{Transport, WebSocketTransport},
    config::AppConfig,
    host::{HostApi, HttpHostClient},
    session::{Session, SessionConfig, SessionHandle, SessionNotice},
    terminal::{TerminalId, TerminalSurface},
    workspace::{visible_rows, ExpansionState, NodeKind, TreeRow, WorkspaceNode, WorkspaceTree},
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "ide-session", version, about = "Remote IDE session client")]
struct Cli {
    /// Config file (defaults to ~/.config/ide-session/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base URL for host requests
    #[arg(long, global = true)]
    http_url: Option<String>,

    /// WebSocket URL of the host event channel
    #[arg(long, global = true)]
    socket_url: Option<String>,

    /// Quiet period before an edit is persisted
    #[arg(long, global = true)]
    debounce_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the workspace tree
    Tree {
        /// Show only entries whose name contains TERM
        #[arg(long)]
        search: Option<String>,
        /// Expand a directory (repeatable)
        #[arg(long = "expand", value_name = "PATH")]
        expand: Vec<String>,
        /// Expand every directory
        #[arg(long)]
        expand_all: bool,
    },
    /// Print a file's content
    Cat { path: String },
    /// Attach to the host shell (Ctrl-] detaches)
    Shell,
    /// Reprint the tree whenever the host reports a structure change
    Watch,
    /// Replace a remote file's content with a local file
    Write {
        path: String,
        file: PathBuf,
        /// Persist immediately instead of waiting for the debounce
        #[arg(long)]
        now: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging();
    setup_panic_handler();

    let config = load_config(&cli)?;
    info!("Using host {} / {}", config.host.http_url, config.host.socket_url);

    match cli.command {
        Command::Tree {
            search,
            expand,
            expand_all,
        } => print_tree(&config, search, &expand, expand_all).await,
        Command::Cat { path } => cat(&config, &path).await,
        Command::Shell => shell(&config).await,
        Command::Watch => watch(&config).await,
        Command::Write { path, file, now } => write_file(&config, &path, &file, now).await,
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if let Some(url) = &cli.http_url {
        config.host.http_url = url.clone();
    }
    if let Some(url) = &cli.socket_url {
        config.host.socket_url = url.clone();
    }
    if let Some(ms) = cli.debounce_ms {
        config.editor.persist_debounce_ms = ms;
    }
    Ok(config)
}

async fn print_tree(
    config: &AppConfig,
    search: Option<String>,
    expand: &[String],
    expand_all: bool,
) -> Result<()> {
    let host = HttpHostClient::new(&config.host)?;
    let mut tree = WorkspaceTree::new();
    tree.refresh(&host).await.context("Failed to fetch workspace tree")?;

    if expand_all {
        tree.expand_all();
    }
    for path in expand {
        if tree.find(path).is_some_and(WorkspaceNode::is_dir) {
            tree.toggle_expanded(path);
        } else {
            warn!("--expand {} is not a directory", path);
            eprintln!("not a directory: {}", path);
        }
    }
    if let Some(term) = search {
        tree.set_search_term(term);
    }

    render_rows(&tree.visible_rows());
    Ok(())
}

fn render_rows(rows: &[TreeRow]) {
    for row in rows {
        let indent = "  ".repeat(row.depth);
        match row.kind {
            NodeKind::Directory => {
                let marker = if row.expanded { "v" } else { ">" };
                println!("{}{} {}/", indent, marker, row.name);
            }
            NodeKind::File => println!("{}  {}", indent, row.name),
        }
    }
}

async fn cat(config: &AppConfig, path: &str) -> Result<()> {
    let host = HttpHostClient::new(&config.host)?;
    let content = host
        .fetch_content(path)
        .await
        .with_context(|| format!("Failed to read {}", path))?;
    print!("{}", content);
    io::stdout().flush()?;
    Ok(())
}

async fn connect_session(config: &AppConfig) -> Result<(Session, Arc<WebSocketTransport>)> {
    let host = Arc::new(HttpHostClient::new(&config.host)?);
    let (transport, inbound) = WebSocketTransport::new(&config.host.socket_url, &config.channel);
    let transport = Arc::new(transport);
    transport
        .connect()
        .await
        .with_context(|| format!("Failed to connect to {}", config.host.socket_url))?;

    let shared: Arc<dyn Transport> = transport.clone();
    let session = Session::new(host, shared, inbound, SessionConfig::from(config));
    Ok((session, transport))
}

async fn watch(config: &AppConfig) -> Result<()> {
    let (mut session, transport) = connect_session(config).await?;
    let mut notices = session.subscribe();
    println!("Watching {} (Ctrl-C to stop)", config.host.socket_url);

    loop {
        tokio::select! {
            more = session.step() => {
                if !more {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }

        while let Ok(notice) = notices.try_recv() {
            match notice {
                SessionNotice::TreeUpdated => {
                    if let Some(root) = session.controller().tree().root() {
                        let mut expansion = ExpansionState::new();
                        for path in root.directory_paths() {
                            expansion.expand(&path);
                        }
                        println!("---");
                        render_rows(&visible_rows(root, &expansion, ""));
                    }
                }
                SessionNotice::TreeFetchFailed(e) => eprintln!("tree refresh failed: {}", e),
                _ => {}
            }
        }
    }

    transport.disconnect().await;
    Ok(())
}

async fn write_file(config: &AppConfig, path: &str, file: &Path, now: bool) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let (mut session, transport) = connect_session(config).await?;
    let mut notices = session.subscribe();
    let handle = session.handle();
    let limit = config.host.request_timeout() + config.editor.persist_debounce() * 2;

    handle.open(path);
    let opened = wait_for(&mut session, &mut notices, limit, |notice| match notice {
        SessionNotice::FileOpened { path: opened } | SessionNotice::FileOpenFailed { path: opened, .. } => {
            opened == path
        }
        _ => false,
    })
    .await?;
    if let SessionNotice::FileOpenFailed { error, .. } = opened {
        bail!("Failed to open {}: {}", path, error);
    }

    handle.edit(content);
    if now {
        handle.save();
    }
    let persisted = wait_for(&mut session, &mut notices, limit, |notice| match notice {
        SessionNotice::Persisted { path: saved } | SessionNotice::PersistDropped { path: saved, .. } => {
            saved == path
        }
        _ => false,
    })
    .await?;

    transport.disconnect().await;
    match persisted {
        SessionNotice::PersistDropped { reason, .. } => bail!("Write of {} not delivered: {}", path, reason),
        _ => {
            println!("Wrote {}", path);
            Ok(())
        }
    }
}

/// Drive the session until a notice matching `wanted` arrives.
async fn wait_for<F>(
    session: &mut Session,
    notices: &mut mpsc::UnboundedReceiver<SessionNotice>,
    limit: std::time::Duration,
    wanted: F,
) -> Result<SessionNotice>
where
    F: Fn(&SessionNotice) -> bool,
{
    let wait = async {
        loop {
            if !session.step().await {
                return Err(anyhow!("Session stopped"));
            }
            while let Ok(notice) = notices.try_recv() {
                if wanted(&notice) {
                    return Ok(notice);
                }
            }
        }
    };
    tokio::time::timeout(limit, wait)
        .await
        .map_err(|_| anyhow!("Timed out after {:?}", limit))?
}

/// Raw shell output straight to our stdout.
struct StdoutSurface;

impl TerminalSurface for StdoutSurface {
    fn write(&mut self, data: &str) {
        let mut stdout = io::stdout();
        let _ = stdout.write_all(data.as_bytes());
        let _ = stdout.flush();
    }
}

async fn shell(config: &AppConfig) -> Result<()> {
    let (session, transport) = connect_session(config).await?;
    let handle = session.handle();
    let terminal = handle.mount_terminal(StdoutSurface);

    enable_raw_mode()?;
    let input = tokio::task::spawn_blocking({
        let handle = handle.clone();
        move || forward_keys(&handle, terminal)
    });

    session.run().await;
    disable_raw_mode()?;
    transport.disconnect().await;

    match input.await {
        Ok(result) => result,
        Err(e) => Err(anyhow!("Input task failed: {}", e)),
    }
}

/// Forward key presses as shell input until Ctrl-] is pressed.
fn forward_keys(handle: &SessionHandle, terminal: TerminalId) -> Result<()> {
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind == KeyEventKind::Release {
            continue;
        }
        if key.code == KeyCode::Char(']') && key.modifiers.contains(KeyModifiers::CONTROL) {
            info!("Detaching from shell");
            handle.unmount_terminal(terminal);
            handle.shutdown();
            return Ok(());
        }
        if let Some(bytes) = key_bytes(key) {
            if !handle.terminal_input(terminal, bytes) {
                return Ok(());
            }
        }
    }
}

fn key_bytes(key: KeyEvent) -> Option<String> {
    let bytes = match key.code {
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => {
            let upper = c.to_ascii_uppercase();
            if !('@'..='_').contains(&upper) {
                return None;
            }
            ((upper as u8 - b'@') as char).to_string()
        }
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "\r".to_string(),
        KeyCode::Backspace => "\x7f".to_string(),
        KeyCode::Tab => "\t".to_string(),
        KeyCode::Esc => "\x1b".to_string(),
        KeyCode::Up => "\x1b[A".to_string(),
        KeyCode::Down => "\x1b[B".to_string(),
        KeyCode::Right => "\x1b[C".to_string(),
        KeyCode::Left => "\x1b[D".to_string(),
        KeyCode::Home => "\x1b[H".to_string(),
        KeyCode::End => "\x1b[F".to_string(),
        KeyCode::Delete => "\x1b[3~".to_string(),
        _ => return None,
    };
    Some(bytes)
}

fn setup_logging() {
    use std::fs::OpenOptions;
    use tracing_subscriber::prelude::*;

    let log_dir = dirs::home_dir()
        .map(|home| home.join(".ide-session").join("logs"))
        .unwrap_or_else(|| PathBuf::from(".ide-session/logs"));
    let _ = std::fs::create_dir_all(&log_dir);

    let log_file = log_dir.join(format!(
        "ide-session-{}.log",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ));

    // Logging is best-effort; stdout belongs to the shell and tree output
    let file = match OpenOptions::new().create(true).append(true).open(&log_file) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Cannot open log file {}: {}", log_file.display(), e);
            return;
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ide_session=info".into()),
        )
        .init();
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        // Restore the terminal before reporting
        let _ = disable_raw_mode();

        error!("Application panicked: {}", panic_info);
        eprintln!("Application panicked: {}", panic_info);
        eprintln!("Please check the logs for more details.");
    }));
}
