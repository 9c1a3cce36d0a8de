mod cli;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use jobtrack::clock::SystemClock;
use jobtrack::config::Config;
use jobtrack::errors::AppError;
use jobtrack::services::UsageReport;
use jobtrack::state::AppState;
use jobtrack::storage::FileStore;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(store) = &cli.store {
        config.store_path = store.clone();
    }

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "jobtrack v{} using store {}",
        env!("CARGO_PKG_VERSION"),
        config.store_path.display()
    );

    let store = Arc::new(FileStore::new(config.store_path.clone()));
    let state = AppState::build(config, store, Arc::new(SystemClock))?;
    state.start();

    let outcome = run(cli.command, &state).await;
    state.shutdown();

    if let Err(e) = outcome {
        error!(code = e.code(), "{e}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Command, state: &AppState) -> Result<(), AppError> {
    match command {
        Command::Search(args) => {
            let listings = state
                .search
                .search(args.user.as_deref(), args.pro, &args.params())
                .await?;
            for listing in &listings {
                println!(
                    "{}\t{}\t{}",
                    listing.key,
                    listing.title,
                    listing.employer_name().unwrap_or("-")
                );
            }
            info!(results = listings.len(), "search finished");
        }
        Command::Usage(args) => match UsageReport::collect(&state.guard, &args.user, args.pro) {
            Some(report) => println!("{}", report.render(state.clock.now_millis())),
            None => println!("No usage data"),
        },
        Command::CacheStats => match state.search_cache.stats() {
            Some(stats) => println!(
                "{} cached searches, oldest {}m, newest {}m",
                stats.total_entries,
                stats.oldest_age / 60_000,
                stats.newest_age / 60_000
            ),
            None => println!("Job search cache is empty"),
        },
        Command::CacheClear => {
            state.search_cache.clear();
            println!("Job search cache cleared");
        }
        Command::Profile { user } => match state.profiles.load(&user).await? {
            Some(profile) => match serde_json::to_string_pretty(&profile) {
                Ok(json) => println!("{json}"),
                Err(e) => error!("Could not render profile: {e}"),
            },
            None => return Err(AppError::NotFound(format!("profile for {user}"))),
        },
        Command::ForgetUser { user } => {
            state.user_cache.clear_user(&user);
            println!("Cached data for {user} removed");
        }
    }
    Ok(())
}
