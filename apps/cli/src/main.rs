use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use client_core::{
    load_settings, AdminSession, ConnectionState, ConsoleEvent, HttpAgentApi, RunController,
    Settings, StartRunError,
};
use shared::domain::{RunConfig, SelectorField, SelectorSet};
use tokio::{
    io::AsyncReadExt,
    sync::broadcast::{self, error::RecvError},
};
use tracing_subscriber::EnvFilter;

mod render;

#[derive(Parser, Debug)]
#[command(name = "agent-console", about = "Control panel for the LinkedIn automation agent")]
struct Cli {
    /// Overrides the configured backend HTTP origin.
    #[arg(long, global = true)]
    backend_url: Option<String>,
    /// Overrides the configured run stream URL.
    #[arg(long, global = true)]
    stream_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start an agent run and follow its log until it finishes.
    Run(RunArgs),
    /// Follow the run stream without starting anything.
    Watch,
    /// Inspect or edit the selectors used by the agent.
    Selectors {
        #[command(subcommand)]
        action: SelectorsCommand,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Exported cookie JSON file, or `-` to read it from stdin.
    #[arg(long)]
    cookies: PathBuf,
    /// Posts to process; clamped to 1..=20.
    #[arg(long, default_value = "5")]
    max_posts: String,
    #[arg(long)]
    no_auto_like: bool,
    #[arg(long)]
    no_auto_comment: bool,
}

#[derive(Args, Debug)]
struct AdminArgs {
    #[arg(long, env = "AGENT_ADMIN_API_KEY", hide_env_values = true)]
    api_key: String,
}

#[derive(Subcommand, Debug)]
enum SelectorsCommand {
    Show {
        #[command(flatten)]
        admin: AdminArgs,
        /// Print the selector set as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Apply `field=value` edits and save them.
    Set {
        #[command(flatten)]
        admin: AdminArgs,
        #[arg(required = true, value_parser = parse_assignment)]
        assignments: Vec<(SelectorField, String)>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = resolve_settings(cli.backend_url, cli.stream_url)?;
    let api = Arc::new(HttpAgentApi::from_settings(&settings)?);

    match cli.command {
        Command::Run(args) => start_and_follow(api, &settings, args).await,
        Command::Watch => watch(api, &settings).await,
        Command::Selectors { action } => selectors(api, action).await,
    }
}

fn resolve_settings(backend_url: Option<String>, stream_url: Option<String>) -> Result<Settings> {
    let mut settings = load_settings()?;
    if let Some(v) = backend_url {
        settings.backend_url = v;
    }
    if let Some(v) = stream_url {
        settings.stream_url = v;
    }
    Ok(settings.validated()?)
}

async fn start_and_follow(api: Arc<HttpAgentApi>, settings: &Settings, args: RunArgs) -> Result<()> {
    let cookie_json = read_cookies(&args.cookies).await?;
    let config = RunConfig {
        auto_comment: !args.no_auto_comment,
        auto_like: !args.no_auto_like,
        cookie_json,
        ..RunConfig::default()
    }
    .with_max_posts_input(&args.max_posts);
    config.validate()?;

    let controller = RunController::new(api);
    let mut events = controller.subscribe();
    controller.mount(&settings.stream_url).await?;
    // The mount's own Idle transition must not end the follow loop below.
    drain_pending(&mut events);

    if let Err(err) = controller.start_run(config).await {
        drain_pending(&mut events);
        controller.unmount().await;
        return Err(match err {
            StartRunError::Rejected(detail) => {
                anyhow!("backend refused to start the run: {detail}")
            }
            other => other.into(),
        });
    }

    follow(&controller, &mut events, |event| {
        matches!(
            event,
            ConsoleEvent::StateChanged(ConnectionState::Idle | ConnectionState::Disconnected)
        )
    })
    .await;
    // The finishing status line is published right after the Idle transition.
    drain_pending(&mut events);
    controller.unmount().await;
    Ok(())
}

async fn watch(api: Arc<HttpAgentApi>, settings: &Settings) -> Result<()> {
    let controller = RunController::new(api);
    let mut events = controller.subscribe();
    controller.mount(&settings.stream_url).await?;

    follow(&controller, &mut events, |event| {
        matches!(
            event,
            ConsoleEvent::StateChanged(ConnectionState::Disconnected)
        )
    })
    .await;
    controller.unmount().await;
    drain_pending(&mut events);
    Ok(())
}

/// Prints console events until `done` matches one or the operator hits Ctrl-C.
async fn follow(
    controller: &RunController,
    events: &mut broadcast::Receiver<ConsoleEvent>,
    done: impl Fn(&ConsoleEvent) -> bool,
) {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    print_event(&event);
                    if done(&event) {
                        return;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "console output fell behind the run stream");
                }
                Err(RecvError::Closed) => return,
            },
            _ = tokio::signal::ctrl_c() => {
                eprintln!("interrupted; closing run stream (the remote run keeps going)");
                controller.unmount().await;
                return;
            }
        }
    }
}

fn drain_pending(events: &mut broadcast::Receiver<ConsoleEvent>) {
    while let Ok(event) = events.try_recv() {
        print_event(&event);
    }
}

fn print_event(event: &ConsoleEvent) {
    match event {
        ConsoleEvent::LogAppended(entry) => println!("{}", render::render_entry(entry)),
        ConsoleEvent::StatusChanged(status) => eprintln!("status: {status}"),
        ConsoleEvent::StateChanged(state) => tracing::debug!(?state, "run state changed"),
        ConsoleEvent::LogsCleared => {}
    }
}

async fn read_cookies(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut raw = String::new();
        tokio::io::stdin()
            .read_to_string(&mut raw)
            .await
            .context("failed to read cookie JSON from stdin")?;
        return Ok(raw);
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read cookie JSON from {}", path.display()))
}

async fn selectors(api: Arc<HttpAgentApi>, action: SelectorsCommand) -> Result<()> {
    let mut session = AdminSession::new(api);
    match action {
        SelectorsCommand::Show { admin, json } => {
            session.unlock(admin.api_key).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(session.selectors())?);
            } else {
                print_selectors(session.selectors());
            }
        }
        SelectorsCommand::Set { admin, assignments } => {
            session.unlock(admin.api_key).await?;
            for (field, value) in assignments {
                session.set_field(field, value);
            }
            session.save().await?;
            eprintln!("{}", session.form().message);
            print_selectors(session.selectors());
        }
    }
    Ok(())
}

fn print_selectors(selectors: &SelectorSet) {
    if let Some(id) = &selectors.id {
        println!("id: {id}");
    }
    for field in SelectorField::ALL {
        println!("{}: {}", field.label(), selectors.get(field));
    }
}

fn parse_assignment(raw: &str) -> Result<(SelectorField, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got '{raw}'"))?;
    let field = SelectorField::from_key(key.trim()).ok_or_else(|| {
        let known: Vec<&str> = SelectorField::ALL.iter().map(|f| f.key()).collect();
        format!("unknown selector '{key}'; expected one of {}", known.join(", "))
    })?;
    Ok((field, value.to_string()))
}
