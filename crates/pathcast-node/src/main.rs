use anyhow::Result;
use clap::Parser;
use pathcast_node::{ifscan, Node, GOSSIP_PORT};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// pathcast route gossip node.
#[derive(Parser, Debug)]
#[command(name = "pathcast-node")]
struct Args {
    /// UDP port updates are sent to and received on.
    #[arg(long, default_value_t = GOSSIP_PORT)]
    port: u16,

    /// Keep loopback interfaces when scanning.
    #[arg(long)]
    accept_loopback: bool,

    /// Fixed host id (random when omitted).
    #[arg(long)]
    id: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the interface report and the
    // command prompt, which the test rig captures separately.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .init();

    let args = Args::parse();
    let host_id = args.id.unwrap_or_else(rand::random);
    info!(host_id, "starting node");

    let ifaces = ifscan::scan(args.accept_loopback)?;
    if ifaces.is_empty() {
        anyhow::bail!("no usable interfaces found");
    }
    ifscan::print_report(&ifaces);

    let node = Node::new(host_id, args.port, ifaces);
    node.announce_self().await;

    let mut recv_task = {
        let node = node.clone();
        tokio::spawn(async move { node.run().await })
    };

    let (quit_tx, mut quit_rx) = mpsc::channel::<()>(1);
    tokio::spawn(command_loop(node, quit_tx));

    let quit = async move {
        if quit_rx.recv().await.is_none() {
            // stdin closed without a quit command; stay up until signalled
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = signal::ctrl_c() => info!("interrupted, shutting down"),
        _ = quit => info!("quit requested"),
        res = &mut recv_task => res??,
    }
    recv_task.abort();

    Ok(())
}

/// Interactive commands: `b` re-announce, `r` dump the table, `q` quit.
async fn command_loop(node: Node, quit: mpsc::Sender<()>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("cli host-{} > ", node.host_id);
        let _ = std::io::stdout().flush();

        match lines.next_line().await {
            Ok(Some(line)) => match line.trim() {
                "b" => node.announce_self().await,
                "r" => node.log_table(),
                "q" => {
                    let _ = quit.send(()).await;
                    return;
                }
                "" => {}
                other => error!(command = other, "unknown command"),
            },
            Ok(None) => {
                info!("stdin closed, command loop disabled");
                return;
            }
            Err(e) => {
                warn!(error = %e, "stdin read failed");
                return;
            }
        }
    }
}
