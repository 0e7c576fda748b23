//! Cyberdesk - Chat with Local Security Models
//!
//! Command-line surface over `cyberdesk-core`. Every prompt is sent through a
//! tab template to a local Ollama or LM Studio server and recorded in the
//! conversation database.
//!
//! # Usage
//!
//! ```bash
//! # Which models does the server offer?
//! cyberdesk models
//!
//! # One question on a tab
//! cyberdesk ask --tab "YARA Patterns" "Rule for a dropper that writes to %TEMP%"
//!
//! # Same question to three models side by side
//! cyberdesk ask --compare llama3 --compare qwen2.5 --compare mistral "Triage: ..."
//!
//! # Interactive session from stdin
//! cyberdesk chat --tab "Incident Summarization"
//!
//! # LM Studio on another machine, verbose logging
//! RUST_LOG=debug cyberdesk --backend lmstudio --host 10.0.0.5 status
//! ```
//!
//! # Environment Variables
//!
//! - `CYBERDESK_CONFIG`: Config file path
//! - `CYBERDESK_BACKEND`, `CYBERDESK_HOST`, `CYBERDESK_PORT`, `CYBERDESK_MODEL`,
//!   `CYBERDESK_DB`: Override the config file
//! - `OLLAMA_HOST` / `OLLAMA_PORT`: Fallbacks for host and port
//! - `RUST_LOG`: Log filter; logs go to stderr

mod output;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use cyberdesk_core::{
    AppConfig, Backend, ChatContext, Conductor, ConfigOverrides, ConversationStore, ExportFormat,
    OllamaBackend, PromptTemplate, StoreError, DEFAULT_HISTORY_LIMIT,
};

/// Cyberdesk - chat with locally hosted models through security prompt templates
#[derive(Parser, Debug)]
#[command(name = "cyberdesk")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "CYBERDESK_CONFIG", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Backend protocol (ollama, lmstudio)
    #[arg(short = 'b', long, global = true)]
    backend: Option<Backend>,

    /// Server hostname
    #[arg(long, global = true)]
    host: Option<String>,

    /// Server port
    #[arg(short = 'p', long, global = true)]
    port: Option<u16>,

    /// Model identifier
    #[arg(short = 'm', long, global = true)]
    model: Option<String>,

    /// Conversation database file
    #[arg(long, value_name = "PATH", global = true)]
    db: Option<PathBuf>,

    /// Sampling temperature (0.0 - 1.0)
    #[arg(short = 't', long, global = true)]
    temperature: Option<f32>,

    /// Completion token budget
    #[arg(long, global = true)]
    max_tokens: Option<u32>,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "CYBERDESK_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            backend: self.backend,
            host: self.host.clone(),
            port: self.port,
            model: self.model.clone(),
            database_path: self.db.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List models offered by the backend
    Models,

    /// Check that the backend answers
    Ping,

    /// Backend health with response time and models
    Health,

    /// Download a model (Ollama only)
    Pull {
        /// Model to pull, e.g. llama3:8b
        model: String,
    },

    /// List prompt templates, or show one
    Templates {
        /// Tab name or key to show in full
        #[arg(long, value_name = "TAB")]
        show: Option<String>,
    },

    /// Ask one question and record the answer
    Ask {
        /// The question
        prompt: String,

        /// Tab (template) to use
        #[arg(long, default_value = "General Cybersecurity")]
        tab: String,

        /// Print the answer as it is generated
        #[arg(long, conflicts_with = "compare")]
        stream: bool,

        /// Compare up to three models (repeat the flag)
        #[arg(long, value_name = "MODEL")]
        compare: Vec<String>,

        /// Ad-hoc persona instead of the tab template: DOMAIN:EXPERTISE:TASK
        #[arg(long, value_name = "SPEC")]
        custom: Option<String>,
    },

    /// Interactive chat, one prompt per line (/tab NAME, /clear, /quit)
    Chat {
        /// Tab (template) to start on
        #[arg(long, default_value = "General Cybersecurity")]
        tab: String,
    },

    /// Show recorded exchanges, newest first
    History {
        /// Only this tab
        #[arg(long)]
        tab: Option<String>,

        /// Maximum records
        #[arg(short = 'n', long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
    },

    /// Find exchanges containing text (case-sensitive)
    Search {
        /// Text to look for
        query: String,

        /// Only this tab
        #[arg(long)]
        tab: Option<String>,
    },

    /// Export every exchange to a file
    Export {
        /// json or csv
        #[arg(short = 'f', long, default_value = "json")]
        format: ExportFormat,

        /// Directory for the export file
        #[arg(short = 'o', long, value_name = "DIR")]
        out: Option<PathBuf>,
    },

    /// Conversation and session statistics
    Status,

    /// Delete recorded exchanges
    Clear {
        /// Only this tab
        #[arg(long)]
        tab: Option<String>,

        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },

    /// Delete exchanges older than a number of days
    Cleanup {
        /// Age threshold in days
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout carries only command output
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().or_else(|_| {
        tracing_subscriber::EnvFilter::try_new(format!(
            "cyberdesk={level},cyberdesk_core={level}",
            level = args.log_level
        ))
    })?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let mut config =
        AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    config.apply_overrides(args.overrides());
    debug!(?config, "Configuration loaded");

    run(args.command, &config).await
}

/// Open the store and connect to the configured backend
fn open(config: &AppConfig) -> Result<(Conductor, ChatContext)> {
    let store = open_store(config)?;
    let ctx = ChatContext::from_config(config);
    let conductor = Conductor::for_selection(&ctx.selection, config.backend_settings(), store);
    Ok((conductor, ctx))
}

fn address(ctx: &ChatContext) -> String {
    format!("{}:{}", ctx.selection.host, ctx.selection.port)
}

async fn run(command: Command, config: &AppConfig) -> Result<()> {
    match command {
        Command::Templates { show } => match show {
            Some(name) => {
                let template = PromptTemplate::find(&name)
                    .with_context(|| format!("No template named '{name}'"))?;
                print!("{}", output::template_detail(template));
            }
            None => print!("{}", output::template_list(PromptTemplate::all())),
        },
        Command::Pull { model } => {
            if config.backend.kind != Backend::Ollama {
                bail!("Pulling models is only supported by Ollama");
            }
            info!(model = %model, "Pulling model");
            let backend = OllamaBackend::new(config.backend_settings());
            if !backend.pull_model(&model).await {
                bail!("Failed to pull {model}");
            }
            println!("Pulled {model}");
        }
        Command::Models => {
            let (conductor, mut ctx) = open(config)?;
            let models = conductor.refresh_models(&mut ctx).await;
            if models.is_empty() {
                bail!(
                    "No models available from {} at {}",
                    conductor.backend().name(),
                    address(&ctx)
                );
            }
            for model in models {
                println!("{model}");
            }
        }
        Command::Ping => {
            let (conductor, ctx) = open(config)?;
            let name = conductor.backend().name();
            if !conductor.backend().test_connection().await {
                bail!("{name} is not reachable at {}", address(&ctx));
            }
            println!("{name} is reachable at {}", address(&ctx));
        }
        Command::Health => {
            let (conductor, _) = open(config)?;
            let health = conductor.check_backend().await;
            print!("{}", output::health(conductor.backend().name(), &health));
        }
        Command::Ask {
            prompt,
            tab,
            stream,
            compare,
            custom,
        } => {
            let (conductor, mut ctx) = open(config)?;
            ctx.set_tab(tab);
            if let Some(spec) = custom {
                ctx.set_system_override(Some(parse_custom(&spec)?));
            }

            if !compare.is_empty() {
                let replies = conductor.compare(&mut ctx, &prompt, &compare).await?;
                print!("{}", output::comparison(&replies));
                return Ok(());
            }

            conductor.refresh_models(&mut ctx).await;
            if stream {
                let text = stream_reply(&conductor, &ctx, &prompt).await?;
                conductor.record(&mut ctx, &prompt, &text).await?;
            } else {
                let result = conductor.submit(&mut ctx, &prompt).await?;
                println!("{}", output::wrap(&result.response_text));
                debug!(
                    prompt_tokens = result.prompt_tokens,
                    completion_tokens = result.completion_tokens,
                    "Token usage"
                );
            }
        }
        Command::Chat { tab } => {
            let (conductor, mut ctx) = open(config)?;
            ctx.set_tab(tab);
            conductor.refresh_models(&mut ctx).await;
            chat(&conductor, &mut ctx).await?;
        }
        Command::History { tab, limit } => {
            let store = open_store(config)?;
            let records = tokio::task::spawn_blocking(move || match tab {
                Some(tab) => store.get_history(&PromptTemplate::canonical_tab(&tab), limit),
                None => store.recent(limit),
            })
            .await??;
            for rec in &records {
                println!("{}", output::record(rec));
            }
        }
        Command::Search { query, tab } => {
            let store = open_store(config)?;
            let tab = tab.map(|t| PromptTemplate::canonical_tab(&t));
            let records =
                tokio::task::spawn_blocking(move || store.search(&query, tab.as_deref())).await??;
            println!("{} match(es)", records.len());
            for rec in &records {
                println!("{}", output::record(rec));
            }
        }
        Command::Export { format, out } => {
            let store = open_store(config)?;
            let dir = out.unwrap_or_else(|| config.export_dir());
            let path =
                tokio::task::spawn_blocking(move || store.export_to_file(dir, format)).await??;
            println!("Exported to {}", path.display());
        }
        Command::Status => {
            let store = open_store(config)?;
            let (status, sessions) = tokio::task::spawn_blocking(move || {
                Ok::<_, StoreError>((store.status()?, store.session_statistics()?))
            })
            .await??;
            print!("{}", output::status(&status, &sessions));
        }
        Command::Clear { tab, yes } => {
            if !yes {
                bail!("Refusing to delete history without --yes");
            }
            let store = open_store(config)?;
            let deleted = tokio::task::spawn_blocking(move || match tab {
                Some(tab) => store.clear_tab(&PromptTemplate::canonical_tab(&tab)),
                None => store.clear_all(),
            })
            .await??;
            println!("Deleted {deleted} conversation(s)");
        }
        Command::Cleanup { days } => {
            let store = open_store(config)?;
            let deleted = tokio::task::spawn_blocking(move || store.cleanup(days)).await??;
            println!("Deleted {deleted} conversation(s) older than {days} days");
        }
    }
    Ok(())
}

fn open_store(config: &AppConfig) -> Result<ConversationStore> {
    ConversationStore::open(config.database_path()).context("Failed to open conversation database")
}

/// Print fragments as they arrive and return the full text
async fn stream_reply(conductor: &Conductor, ctx: &ChatContext, prompt: &str) -> Result<String> {
    let mut fragments = conductor.stream(ctx, prompt).await?;
    let mut text = String::new();
    let mut stdout = std::io::stdout();

    while let Some(fragment) = fragments.next().await {
        stdout.write_all(fragment.as_bytes())?;
        stdout.flush()?;
        text.push_str(&fragment);
    }
    writeln!(stdout)?;
    Ok(text)
}

async fn chat(conductor: &Conductor, ctx: &mut ChatContext) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprintln!("Tab: {} | model: {} | /quit to exit", ctx.current_tab(), ctx.selection.model);

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit" | "/exit", _) => break,
            ("/clear", _) => {
                let tab = ctx.current_tab().to_string();
                ctx.clear_transcript(&tab);
                eprintln!("Transcript cleared");
            }
            ("/tab", name) if !name.trim().is_empty() => {
                ctx.set_tab(name.trim());
                eprintln!("Tab: {}", ctx.current_tab());
            }
            _ => {
                let text = stream_reply(conductor, ctx, line).await?;
                conductor.record(ctx, line, &text).await?;
            }
        }
    }
    Ok(())
}

/// Parse `DOMAIN:EXPERTISE:TASK` into a custom system prompt
fn parse_custom(spec: &str) -> Result<String> {
    let mut parts = spec.splitn(3, ':').map(str::trim);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(domain), Some(expertise), Some(task))
            if !domain.is_empty() && !expertise.is_empty() && !task.is_empty() =>
        {
            Ok(cyberdesk_core::custom_prompt(domain, expertise, task))
        }
        _ => bail!("--custom expects DOMAIN:EXPERTISE:TASK"),
    }
}
