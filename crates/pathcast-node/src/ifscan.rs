//! IPv4 interface discovery.
//!
//! Walks `getifaddrs` and keeps the interfaces a gossip node can speak
//! on: IPv4, broadcast-capable or point-to-point. Loopback is opt-in;
//! anything else (no address, other family, other link type) is skipped.

use std::ffi::CStr;
use std::io;
use std::net::Ipv4Addr;
use tracing::debug;

/// Link type of a kept interface, with the address updates are sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    Broadcast { bcast: Ipv4Addr },
    PointToPoint { peer: Ipv4Addr },
    Loopback,
}

/// One usable IPv4 interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetInterface {
    pub name: String,
    pub addr: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub kind: LinkKind,
}

impl NetInterface {
    /// Where updates sent out of this interface go.
    pub fn dest_addr(&self) -> Ipv4Addr {
        match &self.kind {
            LinkKind::Broadcast { bcast } => *bcast,
            LinkKind::PointToPoint { peer } => *peer,
            LinkKind::Loopback => self.addr,
        }
    }

    /// True if `addr` falls inside this interface's subnet.
    pub fn owns(&self, addr: Ipv4Addr) -> bool {
        let mask = u32::from(self.netmask);
        (u32::from(addr) & mask) == (u32::from(self.addr) & mask)
    }

    fn kind_label(&self) -> &'static str {
        match self.kind {
            LinkKind::Broadcast { .. } => "broadcast",
            LinkKind::PointToPoint { .. } => "point to point",
            LinkKind::Loopback => "loopback",
        }
    }
}

fn sockaddr_ipv4(sa: *const libc::sockaddr) -> Option<Ipv4Addr> {
    if sa.is_null() {
        return None;
    }
    unsafe {
        if (*sa).sa_family != libc::AF_INET as u16 {
            return None;
        }
        let sin = &*(sa as *const libc::sockaddr_in);
        Some(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr)))
    }
}

/// Enumerate the interfaces a node can gossip on.
pub fn scan(accept_loopback: bool) -> io::Result<Vec<NetInterface>> {
    let mut kept = Vec::new();

    unsafe {
        let mut ifaddrs: *mut libc::ifaddrs = std::ptr::null_mut();
        if libc::getifaddrs(&mut ifaddrs) != 0 {
            return Err(io::Error::last_os_error());
        }

        let mut current = ifaddrs;
        while !current.is_null() {
            let ifa = &*current;
            current = ifa.ifa_next;

            let name = CStr::from_ptr(ifa.ifa_name).to_string_lossy().into_owned();
            let Some(addr) = sockaddr_ipv4(ifa.ifa_addr) else {
                debug!(iface = %name, "skipping: no IPv4 address");
                continue;
            };
            let netmask = sockaddr_ipv4(ifa.ifa_netmask).unwrap_or(Ipv4Addr::BROADCAST);

            // ifa_ifu holds the broadcast address for broadcast links and
            // the peer address for point-to-point links.
            let kind = if ifa.ifa_flags & libc::IFF_BROADCAST as u32 != 0 {
                match sockaddr_ipv4(ifa.ifa_ifu) {
                    Some(bcast) => LinkKind::Broadcast { bcast },
                    None => {
                        debug!(iface = %name, "skipping: no broadcast address");
                        continue;
                    }
                }
            } else if ifa.ifa_flags & libc::IFF_POINTOPOINT as u32 != 0 {
                match sockaddr_ipv4(ifa.ifa_ifu) {
                    Some(peer) => LinkKind::PointToPoint { peer },
                    None => {
                        debug!(iface = %name, "skipping: no peer address");
                        continue;
                    }
                }
            } else if ifa.ifa_flags & libc::IFF_LOOPBACK as u32 != 0 {
                if !accept_loopback {
                    debug!(iface = %name, "skipping loopback");
                    continue;
                }
                LinkKind::Loopback
            } else {
                debug!(iface = %name, "skipping: unsupported link type");
                continue;
            };

            debug!(iface = %name, %addr, "keeping interface");
            kept.push(NetInterface {
                name,
                addr,
                netmask,
                kind,
            });
        }

        libc::freeifaddrs(ifaddrs);
    }

    Ok(kept)
}

/// Print a per-interface report to stdout.
pub fn print_report(ifaces: &[NetInterface]) {
    for iface in ifaces {
        println!("name of the interface: {}", iface.name);
        println!("ip address: {}", iface.addr);
        println!("interface type: {}", iface.kind_label());
        match &iface.kind {
            LinkKind::Broadcast { bcast } => println!("broadcast address: {}", bcast),
            LinkKind::PointToPoint { peer } => println!("peer address: {}", peer),
            LinkKind::Loopback => {}
        }
        println!();
    }
}

/// Find the interface a datagram from `sender` arrived on.
pub fn find_source_iface(ifaces: &[NetInterface], sender: Ipv4Addr) -> Option<&NetInterface> {
    ifaces.iter().find(|i| i.owns(sender))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface(addr: [u8; 4], mask: [u8; 4], name: &str) -> NetInterface {
        NetInterface {
            name: name.to_string(),
            addr: Ipv4Addr::from(addr),
            netmask: Ipv4Addr::from(mask),
            kind: LinkKind::Broadcast {
                bcast: Ipv4Addr::new(10, 0, 0, 255),
            },
        }
    }

    #[test]
    fn owns_respects_netmask() {
        let eth = iface([10, 0, 0, 1], [255, 255, 255, 0], "eth0");
        assert!(eth.owns(Ipv4Addr::new(10, 0, 0, 2)));
        assert!(eth.owns(Ipv4Addr::new(10, 0, 0, 254)));
        assert!(!eth.owns(Ipv4Addr::new(10, 0, 1, 2)));
    }

    #[test]
    fn source_lookup_picks_matching_subnet() {
        let ifaces = vec![
            iface([10, 0, 0, 1], [255, 255, 255, 0], "eth0"),
            iface([10, 0, 1, 1], [255, 255, 255, 0], "eth1"),
        ];
        let hit = find_source_iface(&ifaces, Ipv4Addr::new(10, 0, 1, 7)).unwrap();
        assert_eq!(hit.name, "eth1");
        assert!(find_source_iface(&ifaces, Ipv4Addr::new(192, 168, 0, 1)).is_none());
    }

    #[test]
    fn scan_with_loopback_sees_lo() {
        let ifaces = scan(true).expect("getifaddrs");
        assert!(ifaces
            .iter()
            .any(|i| i.kind == LinkKind::Loopback && i.addr == Ipv4Addr::LOCALHOST));
    }
}
