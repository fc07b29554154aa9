//! claude-chat - chat sessions with the Claude Code CLI.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use claude_chat_bridge::config::{ChatConfig, ConfigLoader};
use claude_chat_bridge::display;
use claude_chat_bridge::pipeline::UiEvent;
use claude_chat_bridge::session::{run_bridge, ChatSession, ConversationStore, TurnOutcome};

#[derive(Parser)]
#[command(
    name = "claude-chat",
    about = "Chat sessions with the Claude Code CLI",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file to use instead of the default search path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Per-session overrides of the config file.
#[derive(Debug, Args)]
struct SessionArgs {
    /// Claude CLI executable.
    #[arg(long)]
    binary: Option<String>,
    /// Model to use.
    #[arg(long)]
    model: Option<String>,
    /// Permission mode (default, acceptEdits, plan, ...).
    #[arg(long)]
    permission_mode: Option<String>,
    /// MCP server configuration file.
    #[arg(long)]
    mcp_config: Option<PathBuf>,
    /// Directory to run the CLI in.
    #[arg(long)]
    working_dir: Option<PathBuf>,
    /// Session id to resume.
    #[arg(long)]
    resume: Option<String>,
    /// Do not save the conversation.
    #[arg(long)]
    no_save: bool,
}

impl SessionArgs {
    fn apply(self, config: &mut ChatConfig) -> Option<String> {
        if let Some(binary) = self.binary {
            config.binary = binary;
        }
        config.model = self.model.or(config.model.take());
        config.permission_mode = self.permission_mode.or(config.permission_mode.take());
        config.mcp_config = self.mcp_config.or(config.mcp_config.take());
        config.working_dir = self.working_dir.or(config.working_dir.take());
        if self.no_save {
            config.persist_conversations = false;
        }
        self.resume
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message and render the reply.
    Run {
        /// The message to send.
        prompt: String,
        /// Approve every permission request without asking.
        #[arg(short = 'y', long)]
        yes: bool,
        /// Show full tool input and hidden results.
        #[arg(long)]
        raw: bool,
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Speak NDJSON: commands on stdin, UI events on stdout.
    Bridge {
        #[command(flatten)]
        session: SessionArgs,
    },
    /// List saved conversations.
    History {
        /// Maximum number of entries.
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loader = cli.config.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let mut config = match loader.load() {
        Ok(config) => config,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Run {
            prompt,
            yes,
            raw,
            session,
        } => {
            let resume = session.apply(&mut config);
            run_once(&config, &prompt, resume, yes, raw).await
        }
        Commands::Bridge { session } => {
            let resume = session.apply(&mut config);
            bridge(&config, resume).await
        }
        Commands::History { limit } => history(&config, limit),
    }
}

async fn run_once(
    config: &ChatConfig,
    prompt: &str,
    resume: Option<String>,
    auto_approve: bool,
    raw: bool,
) -> ExitCode {
    let (tx, mut rx) = mpsc::unbounded_channel::<UiEvent>();
    let cancel = CancellationToken::new();
    let mut session = ChatSession::new(config, Arc::new(tx)).with_cancellation(cancel.clone());
    if let Some(session_id) = resume {
        session = session.resume(session_id);
    }
    let handle = session.handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted");
            cancel.cancel();
        }
    });

    let renderer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            display::render_event(&event, raw);
            if let UiEvent::PermissionRequest(request) = event {
                let (approved, always_allow) = if auto_approve {
                    (true, false)
                } else {
                    ask_permission().await
                };
                handle.respond_permission(request.request_id, approved, always_allow);
            }
        }
    });

    tracing::info!(model = ?config.model, "Starting claude-chat");
    let result = session.send_message(prompt).await;
    let session_id = session.session_id().map(str::to_string);
    drop(session);
    let _ = renderer.await;

    match result {
        Ok(TurnOutcome::Completed { .. }) => {
            if let Some(session_id) = session_id {
                display::print_notice("[SESSION]", &format!("resume with --resume {session_id}"));
            }
            ExitCode::SUCCESS
        }
        Ok(outcome) => {
            tracing::debug!(?outcome, "Turn did not complete");
            ExitCode::FAILURE
        }
        Err(_) => ExitCode::FAILURE,
    }
}

/// Ask on the terminal. Anything but yes/always denies.
async fn ask_permission() -> (bool, bool) {
    print!("Allow? [y]es / [n]o / [a]lways: ");
    let _ = std::io::stdout().flush();

    let answer = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    })
    .await;

    match answer {
        Ok(Ok(line)) => match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => (true, false),
            "a" | "always" => (true, true),
            _ => (false, false),
        },
        _ => (false, false),
    }
}

async fn bridge(config: &ChatConfig, resume: Option<String>) -> ExitCode {
    let (tx, rx) = mpsc::unbounded_channel::<UiEvent>();
    let mut session = ChatSession::new(config, Arc::new(tx));
    if let Some(session_id) = resume {
        session = session.resume(session_id);
    }

    tracing::info!("Bridge ready");
    match run_bridge(session, rx, tokio::io::stdin(), tokio::io::stdout()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Bridge input failed");
            ExitCode::FAILURE
        }
    }
}

fn history(config: &ChatConfig, limit: usize) -> ExitCode {
    let Some(dir) = config.conversations_dir() else {
        display::print_error("No data directory available for conversations");
        return ExitCode::FAILURE;
    };
    match ConversationStore::new(dir).list() {
        Ok(conversations) => {
            let shown = conversations.len().min(limit);
            display::print_history(&conversations[..shown]);
            ExitCode::SUCCESS
        }
        Err(e) => {
            display::print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
