//! Two-host smoke rig: build the virtual network, run the pathcast node
//! on each host, print what it wrote, and check connectivity.
//!
//! **Requirements:**
//! - Linux with `ip netns` support (plus `tc netem` when shaping)
//! - Root / passwordless sudo
//! - `pathcast-node` binary (see `--node-bin` / `PATHCAST_NODE_BIN`)
//!
//! Run:
//! ```bash
//! cargo build -p pathcast-node
//! sudo -E cargo run -p pathcast-sim --bin two_host
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use pathcast_sim::runner::{locate_node_binary, print_numbered, spawn_captured};
use pathcast_sim::shaping::{apply_shape, LinkShape};
use pathcast_sim::topology::TwoHostNet;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "two_host")]
struct Args {
    /// pathcast-node binary (default: next to this binary, then
    /// target/debug).
    #[arg(long)]
    node_bin: Option<PathBuf>,

    /// Seconds each node runs before its output is read.
    #[arg(long, default_value_t = 1)]
    run_secs: u64,

    /// Directory the per-host capture files are written to.
    #[arg(long, default_value = "/tmp")]
    capture_dir: PathBuf,

    /// One-way link delay in milliseconds.
    #[arg(long)]
    delay_ms: Option<u32>,

    /// Link loss percentage.
    #[arg(long)]
    loss_percent: Option<f32>,

    /// Link rate limit in kbit/s.
    #[arg(long)]
    rate_kbit: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();

    let args = Args::parse();
    let node_bin = match &args.node_bin {
        Some(p) => p.clone(),
        None => locate_node_binary().context("locating pathcast-node")?,
    };
    let node_bin = node_bin
        .to_str()
        .context("non-UTF8 node binary path")?
        .to_string();

    let net = TwoHostNet::start("pc_lab").context("starting virtual network")?;
    tracing::info!(node_bin = %node_bin, "virtual network up");

    let shape = LinkShape {
        delay_ms: args.delay_ms,
        jitter_ms: None,
        loss_percent: args.loss_percent,
        rate_kbit: args.rate_kbit,
    };
    if !shape.is_unshaped() {
        tracing::info!(?shape, "shaping link");
        apply_shape(&net.h1.ns, &net.h1.iface, &shape)?;
        apply_shape(&net.h2.ns, &net.h2.iface, &shape)?;
    }

    for host in net.hosts() {
        println!("Starting test...");
        let mut run = spawn_captured(
            &host.ns,
            &node_bin,
            &[],
            &args.capture_dir,
            &format!("pathcast-{}", host.name),
        )
        .with_context(|| format!("spawning node on {}", host.name))?;

        thread::sleep(Duration::from_secs(args.run_secs));
        println!("Stopping test");
        run.stop()?;

        println!("Reading output");
        print_numbered(&run.read_stdout()?);
    }

    println!("Dumping host connections");
    net.dump_connections();

    println!("Testing network connectivity");
    let (sent, received) = net.ping_all()?;
    if received < sent {
        bail!("connectivity check failed: {received}/{sent} pings received");
    }

    Ok(())
}
