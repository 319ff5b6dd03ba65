use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    ClaimAttempt, ClaimSession, ClipboardSink, HttpDistributionService, MissingClipboard,
    SessionEvent, CLIPBOARD_COPY_DELAY,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::{self, error::RecvError},
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod clipboard;
mod config;
mod render;

use clipboard::SystemClipboard;
use config::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(about = "Claim a coupon from the round-robin distribution service")]
struct Args {
    /// Base URL of the distribution service.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Never touch the system clipboard.
    #[arg(long)]
    no_clipboard: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Show the current claim and exit.
    Status,
    /// Claim a coupon if one is currently offered, then exit.
    Claim,
    /// Read commands from stdin (default).
    Interactive,
}

impl Args {
    fn apply(&self, settings: &mut Settings) {
        if let Some(url) = &self.server_url {
            settings.server_url = url.clone();
        }
        if let Some(secs) = self.timeout_secs {
            settings.request_timeout_secs = secs.max(1);
        }
        if self.no_clipboard {
            settings.use_system_clipboard = false;
        }
    }
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_clipboard(settings: &Settings) -> Arc<dyn ClipboardSink> {
    if !settings.use_system_clipboard {
        return Arc::new(MissingClipboard);
    }
    match SystemClipboard::probe() {
        Ok(clipboard) => Arc::new(clipboard),
        Err(err) => {
            warn!(error = %err, "clipboard: falling back to no clipboard");
            Arc::new(MissingClipboard)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (mut settings, warnings) = load_settings();
    args.apply(&mut settings);
    init_tracing(&settings.log_filter);
    for warning in warnings {
        warn!("settings: {warning}");
    }

    let service = HttpDistributionService::new(
        &settings.server_url,
        Duration::from_secs(settings.request_timeout_secs),
    )
    .context("failed to configure distribution service client")?;
    info!(server_url = service.server_url(), "starting coupon client");

    let session = ClaimSession::new(Arc::new(service), open_clipboard(&settings));
    let mut events = session.subscribe_events();
    session.reconcile().await;

    let result = match args.command.unwrap_or(Command::Interactive) {
        Command::Status => {
            println!("{}", render::render_snapshot(&session.snapshot().await));
            Ok(())
        }
        Command::Claim => run_claim(&session, &mut events).await,
        Command::Interactive => run_interactive(&session, &mut events).await,
    };

    session.shutdown().await;
    result
}

fn print_pending(events: &mut broadcast::Receiver<SessionEvent>) {
    loop {
        match events.try_recv() {
            Ok(event) => {
                if let Some(line) = render::render_event(&event) {
                    println!("{line}");
                }
            }
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                debug!(skipped, "ui: dropped session events");
            }
            Err(_) => break,
        }
    }
}

async fn run_claim(
    session: &Arc<ClaimSession>,
    events: &mut broadcast::Receiver<SessionEvent>,
) -> Result<()> {
    let snapshot = session.snapshot().await;
    if !snapshot.claim_offered() {
        println!("{}", render::render_snapshot(&snapshot));
        return Ok(());
    }

    let attempt = session.claim().await;
    print_pending(events);

    match attempt {
        ClaimAttempt::Granted(_) => {
            let copied = tokio::time::timeout(CLIPBOARD_COPY_DELAY * 2, async {
                loop {
                    match events.recv().await {
                        Ok(SessionEvent::Notice(notice)) => {
                            println!("{}", render::render_notice(&notice));
                            break;
                        }
                        Ok(_) | Err(RecvError::Lagged(_)) => {}
                        Err(RecvError::Closed) => break,
                    }
                }
            })
            .await;
            if copied.is_err() {
                warn!("claim: clipboard copy did not finish before exit");
            }
            println!("{}", render::render_snapshot(&session.snapshot().await));
            Ok(())
        }
        ClaimAttempt::AdoptedExisting(_) => {
            println!("{}", render::render_snapshot(&session.snapshot().await));
            Ok(())
        }
        ClaimAttempt::Rejected(message) => Err(anyhow!("claim rejected: {message}")),
        ClaimAttempt::Unreachable => Err(anyhow!("distribution service unreachable")),
        ClaimAttempt::NotOffered => Err(anyhow!("claiming is not available right now")),
    }
}

async fn run_interactive(
    session: &Arc<ClaimSession>,
    events: &mut broadcast::Receiver<SessionEvent>,
) -> Result<()> {
    print_pending(events);
    println!("{}", render::render_snapshot(&session.snapshot().await));
    println!("{}", render::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read from stdin")? else {
                    break;
                };
                match line.trim() {
                    "" => {}
                    "claim" => {
                        let snapshot = session.snapshot().await;
                        if snapshot.claim_offered() {
                            session.claim().await;
                        } else {
                            println!("{}", render::render_snapshot(&snapshot));
                        }
                    }
                    "copy" => {
                        if session.snapshot().await.state.coupon().is_some() {
                            session.copy_coupon().await;
                        } else {
                            println!("No coupon to copy yet.");
                        }
                    }
                    "status" => println!("{}", render::render_snapshot(&session.snapshot().await)),
                    "help" => println!("{}", render::HELP),
                    "quit" | "exit" => break,
                    other => println!("Unknown command '{other}'. Type 'help' for the list."),
                }
            }
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(line) = render::render_event(&event) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "ui: dropped session events"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted; closing session");
                break;
            }
        }
    }

    Ok(())
}
