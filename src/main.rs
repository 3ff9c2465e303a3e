//! sctp-ap CLI - drive the probing controllers on a virtual clock.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::sync::broadcast::error::TryRecvError;

use sctp_ap::association::{Association, AssociationEvent, AssociationStats, DataChunk, Outbound, PathStats};
use sctp_ap::cli::*;
use sctp_ap::config::{init_logging, Config, LoggingConfig};
use sctp_ap::error::{Error, Result};
use sctp_ap::types::{AssociationId, AssociationState, PathId, Tsn};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_config = LoggingConfig {
        level: cli.log_level.clone(),
        color: !cli.no_color,
        ..Default::default()
    };
    init_logging(&log_config)?;

    // Load config if specified
    let config = if let Some(ref path) = cli.config {
        Config::load(path)?
    } else {
        Config::example()
    };

    match cli.command {
        Commands::Simulate(args) => run_simulate(args, config, cli.format),
        Commands::Config(args) => run_config(&args),
    }
}

/// One line of the simulation timeline.
#[derive(Debug, Serialize)]
struct TimelineEntry {
    #[serde(with = "humantime_serde")]
    at: Duration,
    what: String,
}

#[derive(Debug, Serialize)]
struct PathReport {
    id: PathId,
    addr: SocketAddr,
    active: bool,
    primary: bool,
    outstanding_bytes: u32,
    stats: PathStats,
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    state: AssociationState,
    timeline: Vec<TimelineEntry>,
    paths: Vec<PathReport>,
    stats: AssociationStats,
}

/// Run a probing scenario.
fn run_simulate(args: SimulateArgs, mut config: Config, format: OutputFormat) -> Result<()> {
    if let Some(period) = args.period {
        config.probing.period = period;
    }
    if let Some(give_up) = args.give_up {
        config.probing.give_up_timeout = give_up;
    }
    if args.burst.is_some() {
        config.probing.burst_limit = args.burst;
    }
    config.validate()?;

    if args.paths == 0 {
        return Err(Error::InvalidConfig("at least one path is required".into()));
    }
    if args.tick.is_zero() {
        return Err(Error::InvalidConfig("tick must be non-zero".into()));
    }
    if !(0.0..=1.0).contains(&args.ack_loss) {
        return Err(Error::InvalidConfig("ack_loss must be within 0..=1".into()));
    }

    let mut assoc = Association::simulated(AssociationId(1), config.association.clone(), config.probing.clone());
    let mut events = assoc.subscribe();
    let mut rng = SmallRng::seed_from_u64(args.seed);

    let mut ids = Vec::with_capacity(usize::from(args.paths));
    for n in 0..args.paths {
        let host = u32::from(n) + 1;
        let addr = SocketAddr::from(([10, 0, (host >> 8) as u8, (host & 0xff) as u8], 9899));
        ids.push(assoc.add_path(addr)?);
    }

    for i in 0..args.chunks {
        let path = ids[i as usize % ids.len()];
        assoc.enqueue_chunk(DataChunk::new(Tsn(i).next(), path, args.chunk_size))?;
    }

    let unresponsive: HashSet<PathId> = args.unresponsive.iter().map(|&n| PathId(n)).collect();
    let suspects: Vec<PathId> = if args.suspect.is_empty() {
        ids.clone()
    } else {
        args.suspect.iter().map(|&n| PathId(n)).collect()
    };

    let mut timeline = Vec::new();
    for path in suspects {
        let activated = assoc.activate_probing(path)?;
        timeline.push(TimelineEntry {
            at: assoc.now(),
            what: format!("suspect {path}: probing {}", if activated { "on" } else { "refused" }),
        });
    }

    while assoc.now() < args.until && !assoc.state().is_terminal() {
        let mut acked = Vec::new();
        for out in assoc.drain_outbound() {
            match out {
                Outbound::Heartbeat { path, at } => {
                    timeline.push(TimelineEntry { at, what: format!("heartbeat on {path}") });
                    if !unresponsive.contains(&path) && !rng.gen_bool(args.ack_loss) {
                        acked.push(path);
                    }
                }
                Outbound::Retransmission { path, tsn, at } => {
                    timeline.push(TimelineEntry { at, what: format!("retransmit {tsn} on {path}") });
                }
            }
        }

        for path in acked {
            assoc.on_heartbeat_ack(path)?;
            timeline.push(TimelineEntry { at: assoc.now(), what: format!("heartbeat-ack on {path}") });
        }

        assoc.advance_by(args.tick);
        drain_events(&mut events, assoc.now(), &mut timeline);
    }

    // Anything emitted by the last step.
    for out in assoc.drain_outbound() {
        if let Outbound::Retransmission { path, tsn, at } = out {
            timeline.push(TimelineEntry { at, what: format!("retransmit {tsn} on {path}") });
        }
    }
    drain_events(&mut events, assoc.now(), &mut timeline);

    let report = SimulationReport {
        state: assoc.state(),
        paths: assoc
            .paths()
            .map(|p| PathReport {
                id: p.id(),
                addr: p.remote_addr(),
                active: p.is_active(),
                primary: p.is_primary(),
                outstanding_bytes: p.outstanding_bytes(),
                stats: p.stats(),
            })
            .collect(),
        stats: assoc.stats(),
        timeline,
    };

    print_report(&report, format)
}

fn drain_events(
    events: &mut tokio::sync::broadcast::Receiver<AssociationEvent>,
    now: Duration,
    timeline: &mut Vec<TimelineEntry>,
) {
    loop {
        let what = match events.try_recv() {
            Ok(AssociationEvent::PathStatusChanged { path, active }) => {
                format!("path {path} {}", if active { "active" } else { "INACTIVE" })
            }
            Ok(AssociationEvent::PrimaryPathChanged { from, to }) => match from {
                Some(from) => format!("primary {from} -> {to}"),
                None => format!("primary {to}"),
            },
            Ok(AssociationEvent::ConnectionLost) => "CONNECTION LOST".to_string(),
            Err(TryRecvError::Lagged(n)) => format!("({n} events dropped)"),
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        };
        timeline.push(TimelineEntry { at: now, what });
    }
}

fn print_report(report: &SimulationReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        let json = serde_json::to_string_pretty(report)
            .map_err(|e| Error::Other(anyhow::anyhow!("Failed to encode report: {e}")))?;
        println!("{json}");
        return Ok(());
    }

    println!("Timeline");
    println!("────────");
    for entry in &report.timeline {
        println!("{:>8.1}s  {}", entry.at.as_secs_f64(), entry.what);
    }

    println!();
    println!("Paths");
    println!("─────");
    for path in &report.paths {
        println!(
            "{:<4} {:<18} {:<8} {:<7} hb={:<3} rtx-moved={:<3} rtx-sent={:<3} osb={}",
            path.id.to_string(),
            path.addr.to_string(),
            if path.active { "active" } else { "inactive" },
            if path.primary { "primary" } else { "" },
            path.stats.heartbeats_sent,
            path.stats.timer_based_retransmissions,
            path.stats.retransmissions_sent,
            path.outstanding_bytes,
        );
    }

    println!();
    println!("Association: {}", report.state);
    println!(
        "  heartbeats={} rtx_timeouts={} retransmissions={} failovers={}",
        report.stats.heartbeats_sent,
        report.stats.rtx_timeouts,
        report.stats.retransmissions_sent,
        report.stats.failovers,
    );

    Ok(())
}

/// Print or write the example configuration.
fn run_config(args: &ConfigArgs) -> Result<()> {
    let config = Config::example();

    if let Some(ref path) = args.output {
        config.save(path)?;
        println!("Configuration written to {}", path.display());
    } else {
        let output = toml::to_string_pretty(&config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;
        println!("{output}");
    }

    Ok(())
}
