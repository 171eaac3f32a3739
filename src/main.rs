//! Binary entrypoint for the Echoes CLI.
//!
//! Commands:
//! - `init` - write a starter `echoes.toml`
//! - `spawn [--identity <addr>]` - spawn a player for the connected account
//! - `start` - create a game run and mark the game view as pending
//! - `play` - interactive loop: one token per line (`w a s d`, space or `p` to pulse,
//!   `c` to retry completion, `r` to restart, `q` to quit)
//! - `status` - print the persisted player and run state
//! - `reset` - forget the persisted store
//!
//! See the library crate docs for module-level details: `echoes::`.
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

use echoes::config::{Config, RemoteMode};
use echoes::game::session::{GameSession, SessionEvent, SessionSettings};
use echoes::game::{ActionKind, TxPhase};
use echoes::indexer::ChamberSource;
use echoes::remote::local::LocalChain;
use echoes::remote::RemoteExecutor;
use echoes::storage::{GameStore, StoreCommand};
use echoes::validation::validate_identity;

#[derive(Parser)]
#[command(name = "echoes")]
#[command(about = "Client for Echoes of the Void: explore dark chambers one pulse at a time")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "echoes.toml", global = true)]
    config: String,

    /// Account identity; overrides `account.identity` from the config
    #[arg(short, long, global = true)]
    identity: Option<String>,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Spawn a player for the connected account
    Spawn,
    /// Create a game run
    Start,
    /// Play interactively
    Play,
    /// Show the persisted player and run state
    Status,
    /// Delete the persisted store
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        Config::create_default(&cli.config).await?;
        println!("Wrote default configuration to {}", cli.config);
        return Ok(());
    }

    let config = match Config::load(&cli.config).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} (using defaults; run `echoes init` to create one)", e);
            Config::default()
        }
    };
    init_logging(&Some(config.clone()), cli.verbose);
    config.validate()?;

    let identity = match cli.identity.as_deref().or(config.account.identity.as_deref()) {
        Some(raw) => Some(validate_identity(raw).map_err(|e| anyhow!("identity: {}", e))?),
        None => None,
    };

    match config.remote.mode {
        RemoteMode::Local => {
            let latency = Duration::from_millis(config.remote.local_latency_ms);
            let chain = Arc::new(LocalChain::new().with_latency(latency));
            run(chain.clone(), chain, &config, identity, cli.command).await
        }
        #[cfg(feature = "net")]
        RemoteMode::Relay => {
            use echoes::indexer::torii::ToriiIndexer;
            use echoes::remote::relay::RelayExecutor;
            info!("Relaying calls to {}", config.remote.relay_url);
            let remote = Arc::new(RelayExecutor::new(&config.remote));
            let indexer = Arc::new(ToriiIndexer::new(config.indexer.clone()));
            run(remote, indexer, &config, identity, cli.command).await
        }
        #[cfg(not(feature = "net"))]
        RemoteMode::Relay => Err(anyhow!("relay mode requires the `net` feature")),
    }
}

async fn run<R: RemoteExecutor, I: ChamberSource>(
    remote: Arc<R>,
    indexer: Arc<I>,
    config: &Config,
    identity: Option<String>,
    command: Commands,
) -> Result<()> {
    let store = GameStore::open(&config.storage.data_dir, &config.storage.store_name)?;
    if let Commands::Status = command {
        print_status(&store);
        return Ok(());
    }
    if let Commands::Reset { yes } = command {
        return reset_store(store, yes).await;
    }

    let (mut session, mut events) =
        GameSession::new(remote, indexer, store, SessionSettings::from_config(config));
    if let Some(id) = &identity {
        session.connect(id);
    }

    match command {
        Commands::Spawn => {
            if let Err(e) = session.spawn_player(Instant::now()) {
                println!("{}", e);
                return Ok(());
            }
            settle(&mut session, &mut events).await;
            report(&session, ActionKind::Spawn);
        }
        Commands::Start => {
            if let Err(e) = session.start_game(Instant::now()) {
                println!("{}", e);
                return Ok(());
            }
            settle(&mut session, &mut events).await;
            report(&session, ActionKind::StartGame);
            session.acknowledge(ActionKind::StartGame);
        }
        Commands::Play => play(&mut session, &mut events, config).await?,
        Commands::Init | Commands::Status | Commands::Reset { .. } => {}
    }
    Ok(())
}

/// Wait until every outstanding remote task has reported back.
async fn settle<R: RemoteExecutor, I: ChamberSource>(
    session: &mut GameSession<R, I>,
    events: &mut UnboundedReceiver<SessionEvent>,
) {
    while session.in_flight() > 0 {
        match events.recv().await {
            Some(event) => session.handle_event(event, Instant::now()),
            None => break,
        }
    }
}

fn report<R: RemoteExecutor, I: ChamberSource>(session: &GameSession<R, I>, kind: ActionKind) {
    let tx = session.tx_status(kind);
    match tx.phase {
        TxPhase::Success => println!(
            "{} accepted{}",
            kind.title(),
            tx.hash.map(|h| format!(" ({})", h)).unwrap_or_default()
        ),
        TxPhase::Rejected => println!("{}", tx.error.unwrap_or_else(|| "Rejected".to_string())),
        TxPhase::None | TxPhase::Pending => {}
    }
}

async fn play<R: RemoteExecutor, I: ChamberSource>(
    session: &mut GameSession<R, I>,
    events: &mut UnboundedReceiver<SessionEvent>,
    config: &Config,
) -> Result<()> {
    if session.store().player().is_none() {
        println!("No player. Run `echoes spawn` first.");
        return Ok(());
    }
    if session.identity().is_none() {
        println!("Please connect your controller (set account.identity or pass --identity)");
        return Ok(());
    }
    if session.take_pending_transition() {
        println!("The void awaits...");
    }
    // Runs are not persisted; every play session scores into a fresh one.
    if session.store().game_run().is_none() {
        if let Err(e) = session.start_game(Instant::now()) {
            println!("{}", e);
            return Ok(());
        }
        settle(session, events).await;
        session.acknowledge(ActionKind::StartGame);
        session.take_pending_transition();
    }
    if let Err(e) = session.start(Instant::now()) {
        println!("{}", e);
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(config.timing.tick());
    let mut last_frame = String::new();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let token = line.trim_end_matches(['\r', '\n']);
                if matches!(token.trim(), "q" | "quit" | "exit") {
                    break;
                }
                if !session.handle_input(token, Instant::now()) {
                    info!("Ignored input {:?}", token);
                }
            }
            Some(event) = events.recv() => {
                session.handle_event(event, Instant::now());
            }
            _ = ticker.tick() => {
                session.tick(Instant::now());
            }
        }
        let frame = session.render();
        if frame != last_frame {
            println!("{}", frame);
            last_frame = frame;
        }
    }

    if let Err(e) = session.store().flush() {
        warn!("Failed to flush store: {}", e);
    }
    let snap = echoes::metrics::snapshot();
    info!(
        "Session over: {} completions, {} deaths",
        snap.completions, snap.deaths
    );
    for (action, c) in snap.actions {
        info!(
            "  {}: submitted={} succeeded={} rejected={} blocked={}",
            action, c.submitted, c.succeeded, c.rejected, c.blocked
        );
    }
    Ok(())
}

fn print_status(store: &GameStore) {
    println!("Echoes v{}", env!("CARGO_PKG_VERSION"));
    match store.player() {
        Some(p) => {
            println!("Player:     {}", p.player);
            println!("Chamber:    {}", p.chamber_id);
            println!("Position:   ({}, {})", p.x, p.y);
            println!("Pulses:     {}", p.pulses_used);
            println!("Deaths:     {}", p.deaths);
        }
        None => println!("Player:     (none)"),
    }
    println!("Started:    {}", store.game_started());
}

async fn reset_store(mut store: GameStore, yes: bool) -> Result<()> {
    if !yes {
        println!("This forgets the local player snapshot. Type 'yes' to continue:");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let answer = lines.next_line().await?.unwrap_or_default();
        if answer.trim() != "yes" {
            println!("Aborted.");
            return Ok(());
        }
    }
    store.apply(StoreCommand::Reset);
    store.flush()?;
    store.take_pending_transition();
    println!("Store reset.");
    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // Base level from CLI verbosity overrides config
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    let file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });
    if let Some(f) = file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // stdout belongs to the map; the console only sees warnings and errors.
        let is_tty = atty::is(atty::Stream::Stderr);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty && record.level() <= log::Level::Warn {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
