//! charla entry point: flag parsing, config resolution, mode dispatch.

mod commands;
mod config;
mod plain;
mod ui;

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use charla_client::ChatClient;
use charla_session::{HttpTransport, Session};

use config::{BACKEND_ENV, FileConfig, Overrides, Settings};

/// Terminal chat for a self-hosted backend
#[derive(Parser, Debug)]
#[command(name = "charla", author, version, about)]
struct Args {
    /// Backend base URL (default: http://127.0.0.1:8000)
    #[arg(short, long)]
    backend_url: Option<String>,

    /// Conversation id sent with every message
    #[arg(long)]
    conversation_id: Option<String>,

    /// Seconds to wait for the backend to answer a request
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Milliseconds between revealed reply characters (0 disables pacing)
    #[arg(long)]
    typing_delay_ms: Option<u64>,

    /// Send a single message and exit
    #[arg(short = 'c', long, value_name = "MESSAGE")]
    command: Option<String>,

    /// Color theme (dark, light)
    #[arg(long)]
    theme: Option<String>,

    /// Plain stdin/stdout instead of the full-screen UI
    #[arg(long)]
    no_tui: bool,

    /// Check backend health and exit
    #[arg(long)]
    check: bool,

    /// Write a starter config file and exit
    #[arg(long)]
    init_config: bool,

    /// Verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            backend_url: self.backend_url.clone(),
            conversation_id: self.conversation_id.clone(),
            timeout_secs: self.timeout_secs,
            typing_delay_ms: self.typing_delay_ms,
            no_tui: self.no_tui,
            theme: self.theme.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("charla=debug")
            .with_writer(std::io::stderr)
            .init();
    }

    if args.init_config {
        let path = FileConfig::init()?;
        println!("Config file at {}", path.display());
        return Ok(());
    }

    let file = FileConfig::load();
    let env_backend = std::env::var(BACKEND_ENV).ok();
    let settings = Settings::resolve(&args.overrides(), env_backend, &file);

    let client = ChatClient::new(settings.client_config())?;

    if args.check {
        return check_backend(&client, &settings.backend_url).await;
    }

    let transport = Arc::new(HttpTransport::new(client));
    let mut session = Session::new(settings.session_config(), transport);

    if let Some(message) = &args.command {
        return plain::run_once(&mut session, message).await;
    }
    if settings.tui && std::io::stdout().is_terminal() {
        return ui::run(&mut session, &settings).await;
    }
    plain::run_repl(&mut session, &settings).await
}

async fn check_backend(client: &ChatClient, backend_url: &str) -> Result<()> {
    match client.health().await {
        Ok(health) => {
            if health.service.is_empty() {
                println!("Backend at {backend_url} reports: {}", health.status);
            } else {
                println!(
                    "Backend at {backend_url} reports: {} ({})",
                    health.status, health.service
                );
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Backend at {backend_url} is not reachable: {e}");
            std::process::exit(1);
        }
    }
}
