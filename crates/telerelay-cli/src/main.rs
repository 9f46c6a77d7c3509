//! `telerelay` – command line entry point.
//!
//! One binary, one subcommand per machine of a teleoperation setup:
//!
//! * `leader`   – publishes (simulated) leader joints.
//! * `master`   – validates leader joints against the follower's limits and
//!   forwards only the safe ones.
//! * `follower` – receives validated commands and drives a (simulated) arm.
//! * `demo`     – all three in one process over the in-process bus.
//! * `schema`   – prints the JSON schemas of the wire messages.
//!
//! **Ctrl-C** flips the shared shutdown flag; every loop drains and exits,
//! and the master prints its final statistics.

mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::sync::watch;
use tracing::warn;

use telerelay_hal::{SimFollowerArm, SineSweepLeader};
use telerelay_kernel::{RelayGate, StatisticsSnapshot};
use telerelay_middleware::{FrameBus, WsFramePublisher, WsFrameSubscriber};
use telerelay_runtime::{FollowerSink, LeaderSource, MasterRelay};
use telerelay_types::{FollowerCommand, LeaderMessage};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "telerelay")]
#[command(about = "Safety-validated joint relay between a leader and a follower arm")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate leader joints and forward safe commands to the follower
    Master,
    /// Publish simulated leader joints
    Leader,
    /// Receive follower commands and drive a simulated arm
    Follower,
    /// Run leader, master, and follower in one process
    Demo {
        /// Stop after this many seconds
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
    /// Print the JSON schemas of the wire messages
    Schema,
}

fn main() {
    let cli = Cli::parse();

    if let Commands::Schema = cli.command {
        if let Err(e) = print_schemas() {
            eprintln!("{}: {}", "Error".red().bold(), e);
            std::process::exit(1);
        }
        return;
    }

    // Set TELERELAY_LOG_FORMAT=json for newline-delimited JSON logs.
    let _guard = telerelay_runtime::init_tracing("telerelay");

    print_banner();

    let config_path = config::resolve_path(cli.config.as_deref());
    let cfg = match load_config(&cli.command, &config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {}", "Config error".red().bold(), e);
            std::process::exit(1);
        }
    };

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let (stop_tx, _) = watch::channel(false);
    let stop = Arc::new(stop_tx);

    let stop_ctrlc = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        stop_ctrlc.send_replace(true);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: failed to start async runtime: {}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(async move {
        match cli.command {
            Commands::Master => run_master(cfg, stop).await,
            Commands::Leader => run_leader(cfg, stop).await,
            Commands::Follower => run_follower(cfg, stop).await,
            Commands::Demo { seconds } => run_demo(cfg, stop, Duration::from_secs(seconds)).await,
            Commands::Schema => Ok(()),
        }
    });

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

/// `master` refuses to start without a config file: it needs the limits.
fn load_config(command: &Commands, path: &std::path::Path) -> Result<Config, String> {
    match command {
        Commands::Master => {
            let cfg = config::load_from(path)?
                .ok_or_else(|| format!("no config file at {}", path.display()))?;
            println!("  Config loaded from {}", path.display().to_string().bold());
            Ok(cfg)
        }
        _ => {
            let cfg = config::load_or_default(path)?;
            if path.exists() {
                println!("  Config loaded from {}", path.display().to_string().bold());
            } else {
                println!("  {}", "No config file found, using defaults.".dimmed());
            }
            Ok(cfg)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Subcommands
// ─────────────────────────────────────────────────────────────────────────────

async fn run_master(cfg: Config, stop: Arc<watch::Sender<bool>>) -> Result<(), String> {
    let gate = RelayGate::from_config(cfg.require_relay()?).map_err(|e| e.to_string())?;
    if !gate.limits_enforced() {
        print_limits_disabled_warning();
    }
    let relay = MasterRelay::new(gate)
        .with_topics(&cfg.transport.leader_topic, &cfg.transport.follower_topic);

    let publisher = WsFramePublisher::bind(parse_addr(&cfg.transport.follower_bind)?)
        .await
        .map_err(|e| e.to_string())?;
    let mut subscriber = WsFrameSubscriber::connect_with_backoff(
        cfg.transport.leader_url.as_str(),
        cfg.transport.leader_topic.as_str(),
        Duration::from_millis(cfg.transport.reconnect_ms),
    );

    println!(
        "  Master relaying {} → {}",
        cfg.transport.leader_url.bold(),
        publisher.local_addr().to_string().bold()
    );
    let stats = relay.run(&mut subscriber, &publisher, stop.subscribe()).await;
    print_statistics(&stats);
    Ok(())
}

async fn run_leader(cfg: Config, stop: Arc<watch::Sender<bool>>) -> Result<(), String> {
    let publisher = WsFramePublisher::bind(parse_addr(&cfg.transport.leader_bind)?)
        .await
        .map_err(|e| e.to_string())?;
    let mut source = LeaderSource::new(cfg.leader.rate_hz)
        .map_err(|e| e.to_string())?
        .with_topic(cfg.transport.leader_topic.as_str());
    let mut reader = sim_leader(&cfg, cfg.leader.sim_joints);

    println!(
        "  Leader publishing {} joints at {} Hz on {}",
        cfg.leader.sim_joints,
        source.rate_hz(),
        publisher.local_addr().to_string().bold()
    );
    let published = source.run(&mut reader, &publisher, stop.subscribe()).await;
    println!("  Published {} messages.", published);
    Ok(())
}

async fn run_follower(cfg: Config, stop: Arc<watch::Sender<bool>>) -> Result<(), String> {
    let joints = cfg
        .relay
        .as_ref()
        .map_or(cfg.leader.sim_joints, |r| r.limits.len());
    let arm = SimFollowerArm::new(joints);
    let subscriber = WsFrameSubscriber::connect_with_backoff(
        cfg.transport.follower_url.as_str(),
        cfg.transport.follower_topic.as_str(),
        Duration::from_millis(cfg.transport.reconnect_ms),
    );
    let sink = FollowerSink::spawn(Box::new(subscriber), Some(Box::new(arm.clone())), stop.subscribe());

    println!("  Follower subscribed to {}", cfg.transport.follower_url.bold());
    let mut stopped = stop.subscribe();
    let _ = stopped.wait_for(|s| *s).await;
    let decode_errors = sink.decode_errors();
    sink.join().await;
    println!(
        "  Applied {} commands ({} undecodable frames).",
        arm.command_count(),
        decode_errors
    );
    Ok(())
}

async fn run_demo(
    cfg: Config,
    stop: Arc<watch::Sender<bool>>,
    duration: Duration,
) -> Result<(), String> {
    let gate = RelayGate::from_config(&cfg.demo_relay()).map_err(|e| e.to_string())?;
    if !gate.limits_enforced() {
        print_limits_disabled_warning();
    }
    let source_joints = gate.source_joints();
    let arm = SimFollowerArm::new(gate.destination_joints());
    let relay = Arc::new(MasterRelay::new(gate));
    let bus = FrameBus::default();

    let sink = FollowerSink::spawn(
        Box::new(bus.subscribe(cfg.transport.follower_topic.as_str())),
        Some(Box::new(arm.clone())),
        stop.subscribe(),
    );

    let master = {
        let relay = Arc::clone(&relay);
        let bus = bus.clone();
        let mut leader_rx = bus.subscribe(cfg.transport.leader_topic.as_str());
        let shutdown = stop.subscribe();
        tokio::spawn(async move { relay.run(&mut leader_rx, &bus, shutdown).await })
    };

    let leader = {
        let mut source = LeaderSource::new(cfg.leader.rate_hz).map_err(|e| e.to_string())?;
        let mut reader = sim_leader(&cfg, source_joints);
        let bus = bus.clone();
        let shutdown = stop.subscribe();
        tokio::spawn(async move { source.run(&mut reader, &bus, shutdown).await })
    };

    println!(
        "  Demo running for {}s ({} joints, sweep ±{} rad). Press Ctrl-C to stop early.",
        duration.as_secs(),
        source_joints,
        cfg.leader.sim_amplitude
    );

    let mut ctrl_c = stop.subscribe();
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = async { let _ = ctrl_c.wait_for(|stopped| *stopped).await; } => {}
    }
    stop.send_replace(true);

    let published = leader.await.map_err(|e| e.to_string())?;
    let stats = master.await.map_err(|e| e.to_string())?;
    sink.join().await;

    println!("  Leader published {} messages; follower applied {}.", published, arm.command_count());
    print_statistics(&stats);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn sim_leader(cfg: &Config, joints: usize) -> SineSweepLeader {
    SineSweepLeader::new(joints)
        .amplitude(cfg.leader.sim_amplitude)
        .frequency_hz(cfg.leader.sim_frequency_hz)
}

fn parse_addr(addr: &str) -> Result<SocketAddr, String> {
    addr.parse()
        .map_err(|e| format!("invalid socket address {addr:?}: {e}"))
}

fn print_schemas() -> Result<(), String> {
    for (name, schema) in [
        ("LeaderMessage", schemars::schema_for!(LeaderMessage)),
        ("FollowerCommand", schemars::schema_for!(FollowerCommand)),
    ] {
        let json = serde_json::to_string_pretty(&schema).map_err(|e| e.to_string())?;
        println!("// {name}\n{json}");
    }
    Ok(())
}

fn print_statistics(s: &StatisticsSnapshot) {
    println!();
    println!("{}", "  Relay statistics".bold());
    println!("    received          {}", s.total);
    println!("    forwarded         {}", s.allowed.to_string().green());
    println!("    blocked           {}", s.blocked.to_string().red());
    println!("    block percentage  {:.1}%", s.block_percentage());
    if s.overridden > 0 {
        println!("    overridden        {}", s.overridden.to_string().yellow());
    }
    println!("    decode errors     {}", s.decode_errors);
    println!("    stale drops       {}", s.stale_drops);
    println!("    publish failures  {}", s.publish_failures);
    if let Some(v) = &s.last_violation {
        let joints: Vec<String> = v.violations.iter().map(|j| j.to_string()).collect();
        println!("    last violation    {} ({})", v.timestamp.to_rfc3339(), joints.join(", "));
    }
    println!();
}

fn print_limits_disabled_warning() {
    println!();
    println!("{}", "  ╔══════════════════════════════════════════════════╗".red().bold());
    println!("{}", "  ║  JOINT LIMITS DISABLED – unsafe commands will    ║".red().bold());
    println!("{}", "  ║  be forwarded to the follower.                   ║".red().bold());
    println!("{}", "  ╚══════════════════════════════════════════════════╝".red().bold());
    println!();
}

fn print_banner() {
    println!();
    println!("  {} {}",
        "telerelay".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Leader → master → follower joint relay");
    println!();
}
