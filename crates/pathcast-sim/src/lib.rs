//! Two-host network emulation rig for pathcast.
//!
//! Provides Linux network namespace management, veth topology wiring,
//! `tc netem` link shaping, and per-host process capture for running
//! the pathcast node under controlled network conditions.

pub mod runner;
pub mod shaping;
pub mod topology;

pub mod test_util;
