use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossterm::style::Stylize;
use thinktank_core::{
    AgentBoard, AgentState, Config, MessageKind, SendOutcome, Session, Simulation, WorkflowApi,
    WorkflowClient,
};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "thinktank")]
#[command(about = "Chat with the AI Think Tank workflow service")]
#[command(version)]
struct Cli {
    /// Workflow service base URL (overrides THINKTANK_API_URL and the config file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Tui,
    /// Send one message and print the reply
    Send {
        /// Message for the think tank
        message: String,
    },
    /// Show the status of a project
    Status {
        /// Project id returned by a previous reply
        project_id: String,
    },
    /// Check that the workflow service is reachable
    Ping,
    /// Walk the agent board through the demo sequence
    Simulate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().context("failed to load config")?;
    let command = cli.command.unwrap_or(Commands::Tui);

    // The TUI owns the terminal, so its logs go to a file
    let _log_guard = init_logging(&config, cli.verbose, matches!(command, Commands::Tui))?;

    let api_url = cli.api_url.unwrap_or_else(|| config.api_base_url());
    let client = match config.request_timeout() {
        Some(timeout) => WorkflowClient::with_timeout(&api_url, timeout)?,
        None => WorkflowClient::new(&api_url),
    };
    let session = Session::with_matcher(config.key_matcher()?);
    info!(api_url = %client.base_url(), "starting");

    match command {
        Commands::Tui => run_tui(session, Arc::new(client), api_url).await,
        Commands::Send { message } => send_once(session, &client, &message).await,
        Commands::Status { project_id } => show_status(&client, &project_id).await,
        Commands::Ping => ping(&client).await,
        Commands::Simulate => simulate().await,
    }
}

fn init_logging(config: &Config, verbose: bool, to_file: bool) -> Result<Option<WorkerGuard>> {
    let default_level = if verbose {
        "info,thinktank_core=debug,thinktank_tui=debug".to_string()
    } else {
        config.log_level.clone().unwrap_or_else(|| "warn".to_string())
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_level));

    if !to_file {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    }

    let log_dir = dirs::data_local_dir()
        .context("Could not determine data directory")?
        .join("thinktank")
        .join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let appender = tracing_appender::rolling::daily(log_dir, "thinktank.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

async fn run_tui(session: Session, api: Arc<dyn WorkflowApi>, api_url: String) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut events = EventHandler::new();
    let mut app = App::new(session, api, api_url, events.sender());

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event),
                None => break,
            }
        }
        Ok::<_, anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    result
}

async fn send_once(mut session: Session, client: &WorkflowClient, message: &str) -> Result<()> {
    println!("{} {}", "You:".bold().green(), message.trim());

    let outcome = session.send_message(client, message).await;
    if outcome == SendOutcome::Ignored {
        bail!("message is empty");
    }

    if let Some(reply) = session.messages().last() {
        match reply.kind {
            MessageKind::Normal => println!("\n{}\n{}", "AI:".bold().blue(), reply.content),
            MessageKind::Error => println!("\n{}\n{}", "AI:".bold().red(), reply.content.as_str().red()),
        }
    }

    println!();
    print_board(session.board());
    if let Some(id) = session.current_project_id() {
        println!("Project: {}", format!("#{}", id).bold());
    }

    if outcome == SendOutcome::Failed {
        bail!("workflow request to {} failed", client.base_url());
    }
    Ok(())
}

async fn show_status(client: &WorkflowClient, project_id: &str) -> Result<()> {
    let status = client.project_status(project_id).await?;

    println!("{}", format!("Project #{}", status.project_id).bold().cyan());
    println!("  Name:    {}", status.name);
    println!("  Status:  {}", status.status.as_str().yellow());
    if let Some(created_at) = &status.created_at {
        println!("  Created: {}", created_at);
    }
    Ok(())
}

async fn ping(client: &WorkflowClient) -> Result<()> {
    if client.ping().await? {
        println!("{} {}", "ok".bold().green(), client.base_url());
        Ok(())
    } else {
        bail!("{} answered but did not report ok", client.base_url())
    }
}

async fn simulate() -> Result<()> {
    let mut board = AgentBoard::new();
    print_board(&board);
    Simulation::new()
        .run(&mut board, |b| {
            println!();
            print_board(b);
        })
        .await;
    Ok(())
}

fn print_board(board: &AgentBoard) {
    println!("{}", "Agents".bold().magenta());
    for status in board.statuses() {
        let label = status.state.label();
        let label = match status.state {
            AgentState::Pending => label.dark_grey(),
            AgentState::Active => label.blue(),
            AgentState::Completed => label.green(),
        };
        println!("  • {:<12} {}", status.agent.display_name(), label);
    }
}
