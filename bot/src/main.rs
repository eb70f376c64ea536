use anyhow::{Context, Result};
use clap::Parser;
use dropplay_bot::{drive, Config, SessionLoop, SystemClock};
use dropplay_client::Client;
use futures::future::join_all;
use std::{path::PathBuf, str::FromStr};
use tracing::{error, info, info_span, Instrument, Level};

#[derive(Parser, Debug)]
#[command(author, version, about = "Play the minigame rounds of every configured account.")]
struct Args {
    /// Path to the YAML config file.
    #[arg(short, long)]
    config: PathBuf,

    /// Run a single session per account and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load from config file
    let config = Config::load(&args.config)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;

    // Setup logging
    let level = Level::from_str(&config.log_level).context("invalid log level")?;
    tracing_subscriber::fmt().with_max_level(level).init();
    let blackout: Vec<u8> = config.blackout_hours.iter().collect();
    info!(
        accounts = config.accounts.len(),
        base_url = config.base_url,
        ?blackout,
        once = args.once,
        "Starting dropplay"
    );

    let offset = config.reference_offset()?;
    let solver = config.solver.build();
    let mut tasks = Vec::with_capacity(config.accounts.len());
    for account in &config.accounts {
        let mut client = Client::new(&config.base_url, account.token.clone())
            .context("invalid base url")?
            .with_request_timeout(config.request_timeout());
        if let Some(path) = &config.profile_path {
            client = client.with_profile_path(path.clone());
        }

        let sessions = SessionLoop::new(
            client.clone(),
            client,
            solver.clone(),
            SystemClock::new(offset),
            config.session_config(),
        );
        let span = info_span!("account", name = %account.name);
        tasks.push(tokio::spawn(
            drive(sessions, account.play_passes, config.idle(), args.once).instrument(span),
        ));
    }

    // Accounts never share state, so one panicking task does not stop the others
    for result in join_all(tasks).await {
        match result {
            Ok(outcome) => info!(?outcome, "Account finished"),
            Err(err) => error!(%err, "Account task failed"),
        }
    }
    Ok(())
}
