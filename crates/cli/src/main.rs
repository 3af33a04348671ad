//! StressCraft CLI
//!
//! Drives a swarm of simulated clients against one game server and shows
//! progress until interrupted.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser};
use serde::Serialize;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;
use stresscraft_core::config::{ServerAddress, SwarmConfig, DEFAULT_PORT};
use stresscraft_core::protocol::{Connector, Script, ScriptedConnector, TcpConnector};
use stresscraft_core::report::{LogPane, LogReporter, Reporter, TerminalReporter};
use stresscraft_core::swarm::{SwarmController, SwarmSnapshot};
use tracing_subscriber::EnvFilter;

/// How long sessions get to hang up politely after shutdown
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Stress-test a game server with a swarm of simulated clients
#[derive(Parser, Debug)]
#[command(name = "stresscraft", version, about)]
struct Cli {
    /// The IP address or the hostname of the server
    host: String,
    /// The port of the server
    #[arg(default_value_t = DEFAULT_PORT)]
    port: u16,
    /// The amount of bots
    #[arg(short, long, default_value_t = 500)]
    count: u32,
    /// Delay between connections, in ms
    #[arg(short, long, default_value_t = 20)]
    delay: u64,
    /// Buffer between connections and players
    #[arg(short, long, default_value_t = 20)]
    buffer: u32,
    /// Player name prefix
    #[arg(short, long, default_value = "Player")]
    prefix: String,
    /// Use player simulation (not implemented)
    #[arg(short, long, default_value_t = true, action = ArgAction::Set)]
    simulate: bool,
    /// Stop automatically after this many seconds
    #[arg(long)]
    duration: Option<u64>,
    /// Transport connect timeout, in ms
    #[arg(long, default_value_t = 5000)]
    connect_timeout: u64,
    /// Play scripted clients instead of connecting to the server
    #[arg(long)]
    dry_run: bool,
    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn swarm_config(&self) -> SwarmConfig {
        SwarmConfig {
            target_count: self.count,
            delay_ms: self.delay,
            buffer: self.buffer,
            prefix: self.prefix.clone(),
            simulate: self.simulate,
        }
    }
}

/// What a run amounted to
#[derive(Debug, Serialize)]
struct RunSummary {
    target: ServerAddress,
    started_at: DateTime<Utc>,
    stopped_at: DateTime<Utc>,
    config: SwarmConfig,
    snapshot: SwarmSnapshot,
}

impl RunSummary {
    fn print(&self) {
        let elapsed = self.stopped_at - self.started_at;
        println!();
        println!("Run against {} finished after {}s", self.target, elapsed.num_seconds());
        println!(
            "  sessions: {} created, {} active, {} failed (target {})",
            self.snapshot.sessions_created,
            self.snapshot.sessions_active,
            self.snapshot.sessions_failed,
            self.snapshot.target_count
        );
        println!("  chunks loaded: {}", self.snapshot.world_units_loaded);
    }
}

/// Install the log subscriber. With a pane, log lines are printed above
/// the progress display instead of through it.
fn init_tracing(pane: Option<LogPane>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match pane {
        Some(pane) => subscriber
            .with_ansi(false)
            .with_writer(move || pane.writer())
            .init(),
        None => subscriber.with_writer(std::io::stderr).init(),
    }
}

/// Scripted clients that join after a short handshake and stream a view
/// distance worth of chunks
fn dry_run_connector() -> ScriptedConnector {
    ScriptedConnector::uniform(
        Script::join()
            .with_delays(Duration::from_millis(30), Duration::from_millis(120))
            .with_world(vec![1; 49], Duration::from_millis(15)),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let interactive = std::io::stdout().is_terminal() && !cli.json;
    let pane = interactive.then(LogPane::new);
    init_tracing(pane.clone());

    if cli.dry_run {
        run(cli, dry_run_connector(), pane).await
    } else {
        let connector = TcpConnector::new(Duration::from_millis(cli.connect_timeout));
        run(cli, connector, pane).await
    }
}

async fn run<C: Connector>(cli: Cli, connector: C, pane: Option<LogPane>) -> Result<()> {
    let target = ServerAddress::new(cli.host.clone(), cli.port);
    let config = cli.swarm_config();

    let swarm = Arc::new(
        SwarmController::new(target.clone(), config.clone(), connector)
            .context("Failed to configure swarm")?,
    );

    let reporter: Box<dyn Reporter> = match pane {
        Some(pane) => Box::new(TerminalReporter::stdout(target.clone()).with_log_pane(pane)),
        None => Box::new(LogReporter::default()),
    };

    let started_at = Utc::now();
    swarm.start(reporter).context("Failed to start swarm")?;
    let signal_handler = swarm
        .arm_termination_handler()
        .context("Failed to install termination handler")?;

    match cli.duration {
        Some(secs) => {
            tokio::select! {
                _ = signal_handler => {}
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    tracing::info!(secs, "run duration elapsed");
                }
            }
        }
        None => {
            signal_handler
                .await
                .context("Termination handler task failed")?;
        }
    }

    swarm.shutdown().await;
    if tokio::time::timeout(DRAIN_GRACE, swarm.wait_sessions())
        .await
        .is_err()
    {
        tracing::warn!(
            remaining = swarm.live_sessions(),
            "sessions still disconnecting at exit"
        );
    }

    let summary = RunSummary {
        target,
        started_at,
        stopped_at: Utc::now(),
        config,
        snapshot: swarm.snapshot(),
    };
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialize run summary")?
        );
    } else {
        summary.print();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["stresscraft", "localhost"]);
        assert_eq!(cli.port, 25565);
        assert_eq!(cli.swarm_config(), SwarmConfig::default());
        assert!(!cli.dry_run);
        assert_eq!(cli.duration, None);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "stresscraft", "mc.local", "25566", "-c", "3", "-d", "10", "-b", "1", "-p", "Bot",
            "-s", "false",
        ]);
        let config = cli.swarm_config();
        assert_eq!(cli.port, 25566);
        assert_eq!(config.target_count, 3);
        assert_eq!(config.delay_ms, 10);
        assert_eq!(config.buffer, 1);
        assert_eq!(config.prefix, "Bot");
        assert!(!config.simulate);
    }

    #[test]
    fn test_summary_serializes() {
        let summary = RunSummary {
            target: ServerAddress::new("localhost", 25565),
            started_at: Utc::now(),
            stopped_at: Utc::now(),
            config: SwarmConfig::default(),
            snapshot: SwarmSnapshot::default(),
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"target_count\":500"));
        assert!(json.contains("\"host\":\"localhost\""));
    }
}
