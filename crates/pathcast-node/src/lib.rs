//! # pathcast-node
//!
//! The gossip node: announces its own interface addresses as routes over
//! UDP broadcast, learns routes announced by peers, and forwards what it
//! learns with itself appended to the hop path.

pub mod ifscan;

use anyhow::{Context, Result};
use ifscan::NetInterface;
use pathcast_wire::message::MAX_MESSAGE_SIZE;
use pathcast_wire::{AddOutcome, RouteEntry, RoutingTable, UpdateKind, UpdateMessage, WithdrawOutcome};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// UDP port updates are broadcast to.
pub const GOSSIP_PORT: u16 = 5151;

/// Attempts per interface before an update send is given up on.
pub const SEND_RETRIES: u32 = 3;

/// Pause between forwarding a learned route and re-announcing our own.
const SETTLE: Duration = Duration::from_millis(20);

/// Shared gossip state. Cheap to clone; clones share the routing table.
#[derive(Clone)]
pub struct Node {
    pub host_id: u64,
    pub port: u16,
    ifaces: Arc<Vec<NetInterface>>,
    table: Arc<Mutex<RoutingTable>>,
}

impl Node {
    pub fn new(host_id: u64, port: u16, ifaces: Vec<NetInterface>) -> Self {
        Self {
            host_id,
            port,
            ifaces: Arc::new(ifaces),
            table: Arc::new(Mutex::new(RoutingTable::new())),
        }
    }

    pub fn log_table(&self) {
        self.table.lock().unwrap().log();
    }

    /// Snapshot of the learned routes.
    pub fn routes(&self) -> Vec<RouteEntry> {
        self.table.lock().unwrap().iter().cloned().collect()
    }

    /// Broadcast an Add update for each of our own interface addresses.
    pub async fn announce_self(&self) {
        info!("announcing own routes");
        let mut failed = false;
        for iface in self.ifaces.iter() {
            let msg = UpdateMessage::announce(iface.addr, self.host_id);
            if let Err(e) = self.send_on(iface, &msg).await {
                warn!(iface = %iface.name, error = %e, "announcement failed");
                failed = true;
            }
        }
        if failed {
            warn!("announcement failed on some interfaces");
        } else {
            info!("announcement sent");
        }
    }

    /// Forward an update out of every interface.
    pub async fn broadcast_update(&self, msg: &UpdateMessage) {
        let mut failed = false;
        for iface in self.ifaces.iter() {
            if let Err(e) = self.send_on(iface, msg).await {
                warn!(iface = %iface.name, error = %e, "forward failed");
                failed = true;
            }
        }
        if failed {
            warn!("update forwarding failed on some interfaces");
        }
    }

    async fn send_on(&self, iface: &NetInterface, msg: &UpdateMessage) -> Result<()> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .context("bind send socket")?;
        socket.set_broadcast(true).context("enable broadcast")?;

        let dest = SocketAddr::from((iface.dest_addr(), self.port));
        let bytes = msg.to_bytes();
        for attempt in 1..=SEND_RETRIES {
            match socket.send_to(&bytes, dest).await {
                Ok(_) => {
                    debug!(iface = %iface.name, %dest, "update sent");
                    return Ok(());
                }
                Err(e) if attempt == SEND_RETRIES => {
                    return Err(e).context("all send attempts failed");
                }
                Err(e) => {
                    warn!(iface = %iface.name, attempt, error = %e, "send failed, retrying");
                }
            }
        }
        unreachable!()
    }

    /// Receive loop: one spawned decision task per datagram.
    pub async fn run(&self) -> Result<()> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, self.port))
            .await
            .with_context(|| format!("bind udp port {}", self.port))?;
        info!(port = self.port, "listening for updates");

        let mut buf = [0u8; MAX_MESSAGE_SIZE];
        loop {
            let (n, from) = match socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    warn!(error = %e, "receive failed, continuing");
                    continue;
                }
            };
            let datagram = buf[..n].to_vec();
            let node = self.clone();
            tokio::spawn(async move { node.decide(datagram, from).await });
        }
    }

    /// Decide what a received update means for the table, and who else
    /// should hear about it.
    async fn decide(self, datagram: Vec<u8>, from: SocketAddr) {
        let SocketAddr::V4(from) = from else {
            debug!(%from, "non-IPv4 sender, dropping");
            return;
        };
        let msg = match UpdateMessage::decode(&datagram) {
            Ok(m) => m,
            Err(e) => {
                warn!(%from, error = %e, "undecodable update, dropping");
                return;
            }
        };
        let Some(iface) = ifscan::find_source_iface(&self.ifaces, *from.ip()) else {
            warn!(%from, "update from unknown source, dropping");
            return;
        };
        if msg.contains_hop(self.host_id) {
            debug!(iface = %iface.name, "own id on hop path, dropping");
            return;
        }

        let entry = RouteEntry::from_update(&msg, &iface.name);
        match msg.kind {
            UpdateKind::Withdraw => {
                info!(prefix = %msg.prefix, iface = %iface.name, "withdraw update received");
                let outcome = self.table.lock().unwrap().withdraw(entry.base);
                if outcome == WithdrawOutcome::Withdrawn {
                    info!(prefix = %msg.prefix, "route withdrawn, forwarding to peers");
                    self.broadcast_update(&msg).await;
                } else {
                    debug!("nothing to withdraw");
                }
            }
            UpdateKind::Add => {
                info!(prefix = %msg.prefix, weight = msg.weight, iface = %iface.name, "add update received");
                let outcome = self.table.lock().unwrap().add(entry);
                if outcome == AddOutcome::New {
                    info!(prefix = %msg.prefix, "route added, forwarding to peers");
                    let mut fwd = msg.clone();
                    fwd.push_hop(self.host_id);
                    fwd.weight += 1;
                    self.broadcast_update(&fwd).await;

                    sleep(SETTLE).await;
                    self.announce_self().await;
                    self.log_table();
                } else {
                    debug!("no new update");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifscan::LinkKind;

    async fn free_port() -> u16 {
        let probe = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        probe.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn receive_loop_survives_bad_datagrams() {
        let ifaces = ifscan::scan(true).expect("getifaddrs");
        let lo: Vec<_> = ifaces
            .into_iter()
            .filter(|i| i.kind == LinkKind::Loopback)
            .collect();
        assert!(!lo.is_empty(), "no loopback interface");

        let port = free_port().await;
        let node = Node::new(1, port, lo);
        let recv_task = {
            let node = node.clone();
            tokio::spawn(async move { node.run().await })
        };
        // let the loop bind before sending
        sleep(Duration::from_millis(50)).await;

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let dest = format!("127.0.0.1:{port}");
        // garbage first; the loop must keep receiving afterwards
        sender.send_to(&[0xFF; 8], &dest).await.unwrap();
        let msg = UpdateMessage::announce(Ipv4Addr::new(10, 9, 9, 9), 2);
        sender.send_to(&msg.to_bytes(), &dest).await.unwrap();

        sleep(Duration::from_millis(200)).await;
        let routes = node.routes();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].base, Ipv4Addr::new(10, 9, 9, 9));
        recv_task.abort();
    }
}
