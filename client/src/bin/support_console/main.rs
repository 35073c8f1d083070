use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use colored::*;
use events::Id;
use std::sync::Arc;
use support_client::api::HttpSupportApi;
use support_client::staleness::spawn_staleness_watch;
use support_client::{Dispatcher, SupportStore, Transport};

mod output;

#[derive(Parser)]
#[command(name = "support-console")]
#[command(about = "Terminal client for the support desk push stream")]
struct Cli {
    /// Base URL of the backend
    #[arg(long, default_value = "http://localhost:4000")]
    base_url: String,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream events for a user until interrupted
    Watch {
        #[arg(long)]
        user_id: Id,
        /// Only print these categories (livechat, notifications, contacts, general)
        #[arg(long = "category")]
        categories: Vec<String>,
    },
    /// Print a user's room and ticket queues
    Queue {
        #[arg(long)]
        user_id: Id,
    },
    /// Have two agents claim the same waiting room at once
    ClaimRace {
        #[arg(long)]
        room_id: Id,
        #[arg(long)]
        agent_a: Id,
        #[arg(long)]
        agent_b: Id,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    let client = reqwest::Client::new();
    let api = Arc::new(HttpSupportApi::new(client, cli.base_url.clone()));

    match cli.command {
        Command::Watch {
            user_id,
            categories,
        } => {
            let dispatcher = Dispatcher::new();
            let store = Arc::new(SupportStore::new(user_id, api));
            let _store_subscriptions = store.attach(&dispatcher);

            let mut printers = Vec::new();
            if categories.is_empty() {
                for category in events::Category::ALL {
                    printers.push(dispatcher.subscribe(category, output::print_event));
                }
            } else {
                for name in &categories {
                    printers.push(dispatcher.subscribe_named(name, output::print_event)?);
                }
            }

            if let Err(e) = store.refresh().await {
                println!("{} Initial fetch failed: {e}", "✗".red());
            }

            let transport = Transport::new(cli.base_url, dispatcher);
            let mut state_rx = transport.watch_state();
            let _staleness = spawn_staleness_watch(store.clone(), transport.watch_state());
            transport.connect(user_id);

            loop {
                tokio::select! {
                    changed = state_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = *state_rx.borrow_and_update();
                        output::print_state(&state);
                    }
                    _ = tokio::signal::ctrl_c() => {
                        println!("\n{} Disconnecting", "→".blue());
                        break;
                    }
                }
            }
            transport.disconnect();

            if let Some(reason) = store.read(|state| state.session_revoked.clone()) {
                println!("{} Session ended by the server: {reason}", "!".yellow());
            }
        }

        Command::Queue { user_id } => {
            let store = SupportStore::new(user_id, api);
            store.refresh().await?;
            output::print_queue(&store);
        }

        Command::ClaimRace {
            room_id,
            agent_a,
            agent_b,
        } => {
            let store_a = SupportStore::new(agent_a, api.clone());
            let store_b = SupportStore::new(agent_b, api);
            tokio::try_join!(store_a.refresh(), store_b.refresh())?;

            println!("{} Both agents claim room {room_id}", "→".blue());
            let (a, b) = tokio::join!(store_a.claim_room(room_id), store_b.claim_room(room_id));

            output::print_outcome(&format!("Agent A ({agent_a})"), a.success, a.message.as_deref());
            output::print_outcome(&format!("Agent B ({agent_b})"), b.success, b.message.as_deref());

            if a.success == b.success {
                bail!("expected exactly one agent to win the claim");
            }
            println!("\n{}", "Exactly one claim succeeded ✓".bright_green().bold());
        }
    }

    Ok(())
}
