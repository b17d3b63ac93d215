//! Namespaces, links, and the two-host topology.

use std::io;
use std::net::Ipv4Addr;
use std::process::{Command, Output};

/// Address of the first host's end of the link.
pub const H1_ADDR: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
/// Address of the second host's end of the link.
pub const H2_ADDR: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

const PREFIX_LEN: u8 = 24;

/// Run a host-side command via sudo and fail on non-zero exit.
fn sudo(args: &[&str]) -> io::Result<Output> {
    let output = Command::new("sudo").args(args).output()?;
    if !output.status.success() {
        return Err(io::Error::other(format!(
            "`{}` failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(output)
}

/// A Linux network namespace managed via `ip netns`.
///
/// Creates the namespace on construction, initializes loopback, and
/// deletes the namespace on drop. Supports executing commands inside
/// the namespace and creating veth links to other namespaces.
pub struct Namespace {
    pub name: String,
}

impl Namespace {
    pub fn new(name: &str) -> io::Result<Self> {
        // cleanup any leftover namespace with the same name
        let _ = Command::new("sudo")
            .args(["ip", "netns", "del", name])
            .output();

        sudo(&["ip", "netns", "add", name])?;

        // Initialize loopback
        let _ = Command::new("sudo")
            .args(["ip", "netns", "exec", name, "ip", "link", "set", "lo", "up"])
            .output();

        Ok(Self {
            name: name.to_string(),
        })
    }

    pub fn exec(&self, cmd: &str, args: &[&str]) -> io::Result<Output> {
        Command::new("sudo")
            .args(["ip", "netns", "exec", &self.name, cmd])
            .args(args)
            .output()
    }

    fn exec_checked(&self, cmd: &str, args: &[&str]) -> io::Result<Output> {
        let output = self.exec(cmd, args)?;
        if !output.status.success() {
            return Err(io::Error::other(format!(
                "`{cmd} {}` in {} failed: {}",
                args.join(" "),
                self.name,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(output)
    }

    /// Wire a veth pair between this namespace and `other`, with one
    /// CIDR address per end, both ends up.
    pub fn add_veth_link(
        &self,
        other: &Namespace,
        local: &str,
        peer: &str,
        cidr_local: &str,
        cidr_peer: &str,
    ) -> io::Result<()> {
        // leftover host-side veth from a crashed run
        let _ = Command::new("sudo")
            .args(["ip", "link", "del", local])
            .output();

        sudo(&["ip", "link", "add", local, "type", "veth", "peer", "name", peer])?;
        sudo(&["ip", "link", "set", local, "netns", &self.name])?;
        sudo(&["ip", "link", "set", peer, "netns", &other.name])?;

        // brd + so broadcast senders inside the namespace have a real
        // broadcast address to aim at
        self.exec_checked("ip", &["addr", "add", cidr_local, "brd", "+", "dev", local])?;
        self.exec_checked("ip", &["link", "set", local, "up"])?;
        other.exec_checked("ip", &["addr", "add", cidr_peer, "brd", "+", "dev", peer])?;
        other.exec_checked("ip", &["link", "set", peer, "up"])?;

        Ok(())
    }
}

impl Drop for Namespace {
    fn drop(&mut self) {
        let _ = Command::new("sudo")
            .args(["ip", "netns", "del", &self.name])
            .status();
    }
}

/// One emulated host: a namespace plus its end of the link.
pub struct Host {
    pub name: String,
    pub ns: Namespace,
    pub iface: String,
    pub addr: Ipv4Addr,
}

/// The two-host, one-link virtual network.
///
/// The link connects exactly the two hosts. Both namespaces are deleted
/// when the value is dropped, so the network survives no longer than
/// the rig that built it.
pub struct TwoHostNet {
    pub h1: Host,
    pub h2: Host,
}

impl TwoHostNet {
    /// Stand the network up. `tag` keeps namespace and interface names
    /// unique across concurrent rigs; keep it short, interface names
    /// must stay within the kernel's 15-char limit.
    pub fn start(tag: &str) -> io::Result<Self> {
        let ns1 = Namespace::new(&format!("{tag}_h1"))?;
        let ns2 = Namespace::new(&format!("{tag}_h2"))?;
        let if1 = format!("{tag}_e1");
        let if2 = format!("{tag}_e2");

        ns1.add_veth_link(
            &ns2,
            &if1,
            &if2,
            &format!("{H1_ADDR}/{PREFIX_LEN}"),
            &format!("{H2_ADDR}/{PREFIX_LEN}"),
        )?;

        Ok(Self {
            h1: Host {
                name: "h1".to_string(),
                ns: ns1,
                iface: if1,
                addr: H1_ADDR,
            },
            h2: Host {
                name: "h2".to_string(),
                ns: ns2,
                iface: if2,
                addr: H2_ADDR,
            },
        })
    }

    pub fn hosts(&self) -> [&Host; 2] {
        [&self.h1, &self.h2]
    }

    /// Print each host and the interface wiring of its link end.
    pub fn dump_connections(&self) {
        println!("{} {}:{}", self.h1.name, self.h1.iface, self.h2.iface);
        println!("{} {}:{}", self.h2.name, self.h2.iface, self.h1.iface);
    }

    /// Ping every ordered host pair once, printing a per-pair line and a
    /// summary. Returns `(sent, received)`.
    pub fn ping_all(&self) -> io::Result<(usize, usize)> {
        let pairs = [(&self.h1, &self.h2), (&self.h2, &self.h1)];
        let mut sent = 0;
        let mut received = 0;

        for (from, to) in pairs {
            sent += 1;
            let out = from
                .ns
                .exec("ping", &["-c", "1", "-W", "1", &to.addr.to_string()])?;
            if out.status.success() {
                received += 1;
                println!("{} -> {}", from.name, to.name);
            } else {
                println!("{} -> X ({})", from.name, to.name);
            }
        }

        let dropped = 100.0 * (sent - received) as f64 / sent as f64;
        println!("*** Results: {dropped:.0}% dropped ({received}/{sent} received)");
        Ok((sent, received))
    }
}
