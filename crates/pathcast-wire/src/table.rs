//! Per-node routing table.
//!
//! Learned routes are host routes (/32) keyed by prefix base and the
//! interface they were learned on. A lower-weight update for a known
//! base/interface pair replaces the existing entry in place; a
//! higher-weight one coexists as a separate candidate.

use crate::message::UpdateMessage;
use std::net::Ipv4Addr;
use tracing::info;

/// One learned route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub base: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub weight: u32,
    /// Name of the interface the update arrived on.
    pub iface: String,
}

impl RouteEntry {
    /// Build the entry an update message describes, as learned on `iface`.
    pub fn from_update(msg: &UpdateMessage, iface: &str) -> Self {
        Self {
            base: msg.prefix,
            mask: Ipv4Addr::BROADCAST,
            gateway: msg.gateway,
            weight: msg.weight,
            iface: iface.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    New,
    Existed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawOutcome {
    Withdrawn,
    NoMatch,
}

#[derive(Debug, Default)]
pub struct RoutingTable {
    entries: Vec<RouteEntry>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.iter()
    }

    /// Insert a learned route.
    ///
    /// An identical entry is a no-op. An entry for the same base and
    /// interface with a higher weight is replaced in place. Anything else
    /// is appended as a new entry.
    pub fn add(&mut self, new: RouteEntry) -> AddOutcome {
        for current in &mut self.entries {
            if *current == new {
                return AddOutcome::Existed;
            }
            if current.base == new.base
                && current.iface == new.iface
                && new.weight < current.weight
            {
                *current = new;
                return AddOutcome::Existed;
            }
        }
        self.entries.push(new);
        AddOutcome::New
    }

    /// Remove the most recently learned entry matching `base`, if any.
    pub fn withdraw(&mut self, base: Ipv4Addr) -> WithdrawOutcome {
        match self.entries.iter().rposition(|e| e.base == base) {
            Some(pos) => {
                self.entries.remove(pos);
                WithdrawOutcome::Withdrawn
            }
            None => WithdrawOutcome::NoMatch,
        }
    }

    /// Dump every entry through the log.
    pub fn log(&self) {
        info!(entries = self.entries.len(), "routing table");
        for e in &self.entries {
            info!(
                base = %e.base,
                gateway = %e.gateway,
                weight = e.weight,
                iface = %e.iface,
                "route",
            );
        }
    }
}
