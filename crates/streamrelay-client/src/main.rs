mod cli;

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use cli::Cli;
use colored::Colorize;
use streamrelay_client::{
    ChannelSink, Conversation, ConversationStore, DisplaySnapshot, InMemoryStore, Phase,
    RelayClient, Smoother, TokenSink, TurnOutcome,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.verbose)?;

    let marker = if cli.no_interrupted_marker {
        None
    } else {
        Some(streamrelay_client::DEFAULT_INTERRUPTED_MARKER.to_string())
    };
    let client = RelayClient::new(&cli.endpoint)?.with_interrupted_marker(marker);
    let tick = (!cli.no_smooth).then(|| Duration::from_millis(cli.tick_ms));

    let store = InMemoryStore::new();
    let mut conversation = Conversation::new();
    tracing::info!(
        endpoint = %client.endpoint(),
        conversation = %conversation.id,
        "Session started"
    );

    println!(
        "{} {}",
        "StreamRelay".bold(),
        format!("({})", client.endpoint()).dimmed()
    );
    println!("{}", "Type a message, /quit to exit. Ctrl-C stops a reply.".dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", ">".green().bold());
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text == "/quit" {
            break;
        }

        let outcome = run_turn(&client, &store, &mut conversation, text, tick).await?;
        report(&outcome);
    }

    println!();
    tracing::info!(
        conversation = %conversation.id,
        title = %conversation.title,
        messages = conversation.messages.len(),
        "Session ended"
    );
    Ok(())
}

fn init_logging(verbose: bool) -> Result<WorkerGuard> {
    // Log to a file so the terminal only shows the conversation
    let log_dir = dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("streamrelay")
        .join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(log_dir, "streamrelay.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .init();

    Ok(guard)
}

async fn run_turn(
    client: &RelayClient,
    store: &dyn ConversationStore,
    conversation: &mut Conversation,
    text: &str,
    tick: Option<Duration>,
) -> Result<TurnOutcome> {
    let cancel = CancellationToken::new();
    let ctrl_c = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let outcome = match tick {
        None => {
            let mut sink = PrintSink;
            client
                .send_turn(conversation, text, store, &mut sink, &cancel)
                .await
        }
        Some(tick) => {
            let (tx, rx) = mpsc::channel(256);
            let (smoother, snapshots) = Smoother::new(tick, rx);
            let smoothing = tokio::spawn(smoother.run());
            let rendering = tokio::spawn(render(snapshots));

            let mut sink = ChannelSink::new(tx);
            let outcome = client
                .send_turn(conversation, text, store, &mut sink, &cancel)
                .await;
            drop(sink);

            smoothing.await.context("Smoother task failed")?;
            rendering.await.context("Render task failed")??;
            outcome
        }
    };

    ctrl_c.abort();
    println!();
    Ok(outcome)
}

/// Print each newly displayed suffix until the smoother completes
async fn render(mut snapshots: watch::Receiver<DisplaySnapshot>) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    let mut printed = 0;

    while snapshots.changed().await.is_ok() {
        let snapshot = snapshots.borrow_and_update().clone();
        if snapshot.displayed.len() > printed {
            write!(stdout, "{}", &snapshot.displayed[printed..])?;
            stdout.flush()?;
            printed = snapshot.displayed.len();
        }
        if snapshot.phase == Phase::Complete {
            break;
        }
    }

    Ok(())
}

struct PrintSink;

#[async_trait]
impl TokenSink for PrintSink {
    async fn on_token(&mut self, token: &str) {
        print!("{token}");
        let _ = std::io::stdout().flush();
    }

    async fn on_finish(&mut self) {}
}

fn report(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Completed => {}
        TurnOutcome::Interrupted => {
            eprintln!("{}", "Reply stopped before it completed.".yellow());
        }
        TurnOutcome::Cancelled => {
            eprintln!("{}", "Cancelled.".yellow());
        }
        TurnOutcome::UpstreamError { message, detail } => {
            eprintln!("{} {}", "Error:".red().bold(), message);
            if let Some(detail) = detail {
                eprintln!("  {}", detail.dimmed());
            }
        }
        TurnOutcome::RequestFailed(reason) => {
            eprintln!("{} {}", "Request failed:".red().bold(), reason);
            if reason.to_lowercase().contains("connect") {
                eprintln!("\n{}", "Suggestion:".yellow().bold());
                eprintln!("  Check that streamrelay-server is running and --endpoint is correct.");
            }
        }
    }
}
