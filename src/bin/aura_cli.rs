//! Terminal client for Aura.
//!
//! Logs go to stderr so stdout carries only conversation output.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use aura::config::AuraConfig;
use aura::session::{Sender, SubmitOutcome};
use aura::speech::NullSpeechBackend;
use aura::{
    ConnectivityDispatcher, ConversationSession, HttpGateway, ProfileHolder, SessionContext,
    SpeechCoordinator, open_store,
};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Aura: your inclusive travel assistant.
#[derive(Parser)]
#[command(name = "aura-cli", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check whether the backend is reachable.
    Ping,

    /// Chat with the assistant, one line per message.
    Chat {
        /// Name for a new profile when none is remembered.
        #[arg(long)]
        name: Option<String>,

        /// Email for a new profile when none is remembered.
        #[arg(long)]
        email: Option<String>,
    },

    /// Print the active profile as JSON.
    Profile,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("aura=info")),
        )
        .init();

    let cli = Cli::parse();

    let config =
        AuraConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    let store = open_store(&config.storage)?;
    let gateway = Arc::new(HttpGateway::new(&config.backend)?);
    let dispatcher = Arc::new(ConnectivityDispatcher::new(
        gateway,
        store,
        config.connectivity.mode,
        config.profile_defaults.clone(),
    ));

    match cli.command {
        Command::Ping => {
            let reachable = dispatcher.probe().await;
            println!(
                "{}: {}",
                config.backend.base_url,
                if reachable { "reachable" } else { "unreachable" }
            );
            Ok(())
        }
        Command::Profile => {
            let mut holder = ProfileHolder::new(dispatcher);
            match holder.resume().await? {
                Some(profile) => println!("{}", serde_json::to_string_pretty(profile)?),
                None => println!("No active profile."),
            }
            Ok(())
        }
        Command::Chat { name, email } => run_chat(config, dispatcher, name, email).await,
    }
}

async fn run_chat(
    config: AuraConfig,
    dispatcher: Arc<ConnectivityDispatcher>,
    name: Option<String>,
    email: Option<String>,
) -> anyhow::Result<()> {
    let mut holder = ProfileHolder::new(dispatcher.clone());
    if holder.resume().await?.is_none() {
        let (Some(name), Some(email)) = (name, email) else {
            bail!("no active profile; pass --name and --email to create one");
        };
        holder.create_profile(&name, &email).await?;
    }
    let Some(profile) = holder.profile() else {
        bail!("no active profile");
    };
    if holder.is_unsynced() {
        eprintln!("(offline: your profile is stored on this device only)");
    }

    let (speech, _speech_events) =
        SpeechCoordinator::new(Box::new(NullSpeechBackend), &config.speech);
    let context = SessionContext::new(Some(profile.into()));
    let mut session =
        ConversationSession::new(context, dispatcher, speech, config.speech.auto_speak_replies);

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down...");
            cancel_clone.cancel();
        }
    });

    println!("{}\n", session.greeting());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            () = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };

        match session.submit(&line).await {
            SubmitOutcome::Replied | SubmitOutcome::Failed => {
                if let Some(reply) = session.messages().last()
                    && reply.sender == Sender::Agent
                {
                    println!("Aura: {}\n", reply.text);
                }
                if let Some(error) = session.error() {
                    eprintln!("{error}");
                }
            }
            SubmitOutcome::Rejected(_) => {}
        }
    }

    session.end();
    Ok(())
}
