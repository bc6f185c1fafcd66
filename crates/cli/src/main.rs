//! `chatsg` — drive the orchestration engine from the command line.
//!
//! One-shot requests stream their event sequence as JSON lines; session
//! subcommands inspect and mutate the store. Offline by default via the
//! scripted LLM provider; point `[llm]` at an OpenAI-compatible endpoint
//! for real replies.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sg_domain::config::{Config, ConfigSeverity};
use sg_domain::routing::RoutingMetadata;
use sg_engine::{run_request, stream_request, Engine, RequestInput};

#[derive(Parser)]
#[command(name = "chatsg", about = "Multi-agent conversational orchestration engine")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = "chatsg.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send one message through the engine and print the event stream.
    Send {
        /// Session to post into.
        #[arg(long, default_value = "default")]
        session: String,

        /// The user utterance.
        message: String,

        /// Session the user is currently viewing (gates unread counts).
        #[arg(long)]
        active_session: Option<String>,

        /// Force routing to this agent (as a resolved slash command would).
        #[arg(long)]
        force_agent: Option<String>,

        /// Command name recorded with forced routing.
        #[arg(long)]
        command_name: Option<String>,

        /// Wait for the full reply instead of streaming events.
        #[arg(long)]
        no_stream: bool,
    },

    /// Inspect and mutate sessions.
    #[command(subcommand)]
    Sessions(SessionsCommand),

    /// Validate or display the configuration.
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Print the version.
    Version,
}

#[derive(Subcommand)]
enum SessionsCommand {
    /// List sessions, most recently active first.
    List,
    /// Print a page of a session's message log.
    Read {
        session: String,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Reset the unread counter.
    MarkRead { session: String },
    /// Delete a session, its logs, and its memory keys.
    Delete { session: String },
}

#[derive(Subcommand)]
enum ConfigCommand {
    Validate,
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Send {
            session,
            message,
            active_session,
            force_agent,
            command_name,
            no_stream,
        } => {
            let engine = start_engine(config)?;
            let routing = force_agent.map(|agent| RoutingMetadata {
                force_agent: true,
                command_name: command_name.or_else(|| Some(agent.to_lowercase())),
                agent_type: Some(agent),
                confidence: 1.0,
            });
            let input = RequestInput {
                session_id: session,
                user_input: message,
                caller_active_session_id: active_session,
                routing,
            };

            if no_stream {
                let reply = run_request(&engine, input).await?;
                println!("{}", serde_json::to_string_pretty(&reply)?);
            } else {
                let mut rx = stream_request(engine.clone(), input);
                while let Some(event) = rx.recv().await {
                    println!("{}", serde_json::to_string(&event)?);
                }
            }

            engine.shutdown(Duration::from_secs(2)).await;
            Ok(())
        }

        Command::Sessions(cmd) => {
            let engine = start_engine(config)?;
            let result = run_sessions_command(&engine, cmd).await;
            engine.shutdown(Duration::from_secs(2)).await;
            result
        }

        Command::Config(ConfigCommand::Validate) => {
            let issues = config.validate();
            for issue in &issues {
                println!("{issue}");
            }
            let errors = issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count();
            if errors > 0 {
                anyhow::bail!("config validation failed with {errors} error(s)");
            }
            println!("config ok");
            Ok(())
        }

        Command::Config(ConfigCommand::Show) => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }

        Command::Version => {
            println!("chatsg {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_config(path: &PathBuf) -> anyhow::Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

fn start_engine(config: Config) -> anyhow::Result<Arc<Engine>> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!("config validation failed");
    }

    let llm = sg_llm::create_provider(&config.llm)?;
    Ok(Engine::start(config, llm)?)
}

async fn run_sessions_command(engine: &Arc<Engine>, cmd: SessionsCommand) -> anyhow::Result<()> {
    match cmd {
        SessionsCommand::List => {
            for meta in engine.sessions.list_sessions() {
                println!(
                    "{}  messages={}  unread={}  agent={}  \"{}\"",
                    meta.session_id,
                    meta.message_count,
                    meta.unread_count,
                    meta.active_agent.as_deref().unwrap_or("-"),
                    meta.title,
                );
            }
            Ok(())
        }
        SessionsCommand::Read {
            session,
            offset,
            limit,
        } => {
            let page = engine.sessions.read_messages(&session, offset, limit)?;
            for msg in &page.messages {
                println!("{}", serde_json::to_string(msg)?);
            }
            if page.has_more {
                println!("# more messages remain ({} total)", page.total);
            }
            Ok(())
        }
        SessionsCommand::MarkRead { session } => {
            let meta = engine.sessions.mark_read(&session)?;
            println!("{} unread={}", meta.session_id, meta.unread_count);
            Ok(())
        }
        SessionsCommand::Delete { session } => {
            engine.delete_session(&session).await?;
            println!("deleted {session}");
            Ok(())
        }
    }
}
