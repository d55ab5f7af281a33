//! Seqprobe Harness
//!
//! Measurement harness wrapped around an external transport binary.
//!
//! - Feeds a paced, sequence-stamped unit stream into the transport's
//!   console on the send side
//! - Taps the peer transport's console on the receive side and
//!   classifies every unit as in-order, reordered, or duplicate
//! - Reports loss, reordering, and discontinuity figures when the run
//!   stops
//! - Supports single-path and redundancy-group transport topologies

mod process;
mod receiver;
mod sender;
mod transport;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use seqprobe_core::config::{
    count_for_duration, interval_for_bitrate, RunPlan, DEFAULT_INTERVAL, DEFAULT_ORIGIN,
};
use seqprobe_core::monitor::DEFAULT_GRACE;
use seqprobe_core::payload::{PayloadSpec, DEFAULT_PAYLOAD_SIZE, DEFAULT_PREFIX_WIDTH};
use seqprobe_core::report::arrival_table;

use crate::process::DEFAULT_SETTLE;
use crate::receiver::{ReceiveOptions, ReceiveSummary};
use crate::transport::TransportCmd;

const DEFAULT_PORT: u16 = 4200;

/// Reordering, loss, and duplication probe for transport relays.
#[derive(Parser, Debug)]
#[command(name = "seqprobe", about = "Reordering and loss probe for transport relays", version)]
struct Cli {
    /// Default to debug-level logging (RUST_LOG still wins).
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Feed a paced, sequence-stamped stream into a transport sender.
    Sender {
        #[command(flatten)]
        stream: StreamArgs,

        /// Address of the receiving transport.
        #[arg(long, default_value = "127.0.0.1")]
        ip: String,

        /// Port the transport connects to.
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Seconds to hold the transport open after the last unit.
        #[arg(long, default_value_t = 0.0)]
        drain_wait: f64,
    },
    /// Listen with a transport receiver and classify every arriving unit.
    Receiver {
        #[command(flatten)]
        stream: StreamArgs,

        /// Port the transport listens on.
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,

        #[command(flatten)]
        receive: ReceiveArgs,
    },
    /// Feed one stream into a redundancy group spanning several nodes.
    RedundantSender {
        #[command(flatten)]
        stream: StreamArgs,

        /// Group member as ip:port; repeat once per node.
        #[arg(long = "node", required = true)]
        nodes: Vec<String>,

        /// Seconds to hold the transport open after the last unit.
        #[arg(long, default_value_t = 0.0)]
        drain_wait: f64,
    },
    /// Listen for a redundancy group and classify the merged stream.
    RedundantReceiver {
        #[command(flatten)]
        stream: StreamArgs,

        /// Port the transport listens on.
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,

        #[command(flatten)]
        receive: ReceiveArgs,
    },
}

/// Stream shape shared by every mode.
#[derive(Args, Debug)]
struct StreamArgs {
    /// Path to the transport binary under test.
    transport: PathBuf,

    /// Planned stream length in seconds.
    #[arg(long, default_value_t = 60.0)]
    duration: f64,

    /// Exact unit count; overrides --duration.
    #[arg(short = 'n', long)]
    count: Option<u64>,

    /// Stream bitrate in Mbit/s; sets the send interval.
    #[arg(long)]
    bitrate: Option<f64>,

    /// Bytes per unit.
    #[arg(long, default_value_t = DEFAULT_PAYLOAD_SIZE)]
    payload_size: usize,

    /// Sequence prefix width in bytes.
    #[arg(long, default_value_t = DEFAULT_PREFIX_WIDTH)]
    prefix_width: usize,

    /// First sequence number of the run.
    #[arg(long, default_value_t = DEFAULT_ORIGIN)]
    origin: u64,

    /// Extra transport URI attributes, appended to the query string.
    #[arg(long)]
    attrs: Option<String>,

    /// Seconds to let the transport settle after spawning it.
    #[arg(long, default_value_t = DEFAULT_SETTLE.as_secs_f64())]
    settle: f64,
}

/// Receive-side knobs.
#[derive(Args, Debug)]
struct ReceiveArgs {
    /// Extra percentage of units to accept beyond the plan before the
    /// run counts as complete.
    #[arg(long, default_value_t = 0.0)]
    slack_percent: f64,

    /// Seconds past the expected duration to keep waiting for units.
    #[arg(long, default_value_t = DEFAULT_GRACE.as_secs_f64())]
    grace: f64,

    /// Emit the report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Print the per-arrival log after the report.
    #[arg(long)]
    show_arrivals: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .init();

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::Relaxed);
    })?;

    match cli.mode {
        Mode::Sender {
            stream,
            ip,
            port,
            drain_wait,
        } => {
            let cmd = TransportCmd::sender(&stream.transport, &ip, port, stream.attrs.as_deref());
            run_send(&stream, drain_wait, &cmd, running)?;
        }
        Mode::RedundantSender {
            stream,
            nodes,
            drain_wait,
        } => {
            let cmd =
                TransportCmd::redundant_sender(&stream.transport, &nodes, stream.attrs.as_deref());
            run_send(&stream, drain_wait, &cmd, running)?;
        }
        Mode::Receiver {
            stream,
            port,
            receive,
        } => {
            let cmd = TransportCmd::receiver(&stream.transport, port, stream.attrs.as_deref());
            run_receive(&stream, &receive, cmd, running)?;
        }
        Mode::RedundantReceiver {
            stream,
            port,
            receive,
        } => {
            let cmd =
                TransportCmd::redundant_receiver(&stream.transport, port, stream.attrs.as_deref());
            run_receive(&stream, &receive, cmd, running)?;
        }
    }

    Ok(())
}

fn run_send(
    stream: &StreamArgs,
    drain_wait: f64,
    cmd: &TransportCmd,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let plan = build_plan(stream)?;
    let settle = settle_duration(stream)?;
    anyhow::ensure!(
        drain_wait >= 0.0 && drain_wait.is_finite(),
        "drain-wait must be non-negative, got {drain_wait}"
    );
    let drain = Duration::from_secs_f64(drain_wait);

    let summary = sender::run(cmd, &plan, settle, drain, running)?;
    println!(
        "sent {} of {} units in {:.2} s",
        summary.sent,
        plan.count,
        summary.elapsed.as_secs_f64()
    );
    if summary.interrupted {
        std::process::exit(1);
    }
    Ok(())
}

fn run_receive(
    stream: &StreamArgs,
    receive: &ReceiveArgs,
    cmd: TransportCmd,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let plan = build_plan(stream)?;
    let settle = settle_duration(stream)?;
    anyhow::ensure!(
        receive.grace >= 0.0 && receive.grace.is_finite(),
        "grace must be non-negative, got {}",
        receive.grace
    );
    let options = ReceiveOptions {
        slack_percent: receive.slack_percent,
        grace: Duration::from_secs_f64(receive.grace),
    };

    let summary = receiver::run(&cmd, &plan, settle, options, running)?;
    print_report(&summary, receive)?;
    if summary.report.is_premature() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_report(summary: &ReceiveSummary, receive: &ReceiveArgs) -> anyhow::Result<()> {
    if receive.json {
        println!("{}", serde_json::to_string_pretty(&summary.report)?);
    } else {
        println!("{}", summary.report);
    }
    if receive.show_arrivals {
        print!("{}", arrival_table(&summary.records));
    }
    Ok(())
}

/// Turn the CLI stream shape into a validated run plan.
fn build_plan(stream: &StreamArgs) -> anyhow::Result<RunPlan> {
    let payload = PayloadSpec::new(stream.payload_size, stream.prefix_width)?;
    let interval = match stream.bitrate {
        Some(mbps) => interval_for_bitrate(mbps, payload.payload_size())?,
        None => DEFAULT_INTERVAL,
    };
    let count = match stream.count {
        Some(count) => count,
        None => {
            anyhow::ensure!(
                stream.duration > 0.0 && stream.duration.is_finite(),
                "duration must be positive, got {}",
                stream.duration
            );
            count_for_duration(Duration::from_secs_f64(stream.duration), interval)?
        }
    };
    Ok(RunPlan::new(payload, stream.origin, count, interval)?)
}

fn settle_duration(stream: &StreamArgs) -> anyhow::Result<Duration> {
    anyhow::ensure!(
        stream.settle >= 0.0 && stream.settle.is_finite(),
        "settle must be non-negative, got {}",
        stream.settle
    );
    Ok(Duration::from_secs_f64(stream.settle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("argv should parse")
    }

    #[test]
    fn sender_defaults() {
        let cli = parse(&["seqprobe", "sender", "/usr/bin/transport"]);
        let Mode::Sender {
            stream,
            ip,
            port,
            drain_wait,
        } = cli.mode
        else {
            panic!("expected sender mode");
        };
        assert_eq!(ip, "127.0.0.1");
        assert_eq!(port, DEFAULT_PORT);
        assert_eq!(drain_wait, 0.0);
        let plan = build_plan(&stream).unwrap();
        assert_eq!(plan.count, 6_001);
        assert_eq!(plan.interval, DEFAULT_INTERVAL);
        assert_eq!(plan.payload.payload_size(), DEFAULT_PAYLOAD_SIZE);
    }

    #[test]
    fn bitrate_sets_interval() {
        let cli = parse(&[
            "seqprobe",
            "sender",
            "/usr/bin/transport",
            "--bitrate",
            "10",
            "--duration",
            "1",
        ]);
        let Mode::Sender { stream, .. } = cli.mode else {
            panic!("expected sender mode");
        };
        let plan = build_plan(&stream).unwrap();
        // 1316 B at 10 Mbit/s is 1053 us per unit.
        assert_eq!(plan.interval, Duration::from_micros(1_053));
        assert_eq!(plan.count, 1_000_000 / 1_053 + 1);
    }

    #[test]
    fn count_overrides_duration() {
        let cli = parse(&[
            "seqprobe",
            "sender",
            "/usr/bin/transport",
            "-n",
            "42",
            "--duration",
            "3600",
        ]);
        let Mode::Sender { stream, .. } = cli.mode else {
            panic!("expected sender mode");
        };
        assert_eq!(build_plan(&stream).unwrap().count, 42);
    }

    #[test]
    fn redundant_sender_requires_nodes() {
        assert!(
            Cli::try_parse_from(["seqprobe", "redundant-sender", "/usr/bin/transport"]).is_err()
        );
        let cli = parse(&[
            "seqprobe",
            "redundant-sender",
            "/usr/bin/transport",
            "--node",
            "10.0.0.1:4200",
            "--node",
            "10.0.0.2:4200",
        ]);
        let Mode::RedundantSender { nodes, .. } = cli.mode else {
            panic!("expected redundant-sender mode");
        };
        assert_eq!(nodes, vec!["10.0.0.1:4200", "10.0.0.2:4200"]);
    }

    #[test]
    fn receiver_knobs_parse() {
        let cli = parse(&[
            "seqprobe",
            "receiver",
            "/usr/bin/transport",
            "--port",
            "9000",
            "--slack-percent",
            "5",
            "--grace",
            "2.5",
            "--json",
        ]);
        let Mode::Receiver { port, receive, .. } = cli.mode else {
            panic!("expected receiver mode");
        };
        assert_eq!(port, 9_000);
        assert_eq!(receive.slack_percent, 5.0);
        assert_eq!(receive.grace, 2.5);
        assert!(receive.json);
        assert!(!receive.show_arrivals);
    }

    #[test]
    fn invalid_shapes_are_rejected() {
        let cli = parse(&[
            "seqprobe",
            "sender",
            "/usr/bin/transport",
            "--duration",
            "0",
        ]);
        let Mode::Sender { stream, .. } = cli.mode else {
            panic!("expected sender mode");
        };
        assert!(build_plan(&stream).is_err());

        let cli = parse(&[
            "seqprobe",
            "sender",
            "/usr/bin/transport",
            "--prefix-width",
            "9",
        ]);
        let Mode::Sender { stream, .. } = cli.mode else {
            panic!("expected sender mode");
        };
        assert!(build_plan(&stream).is_err());
    }
}
