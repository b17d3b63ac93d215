//! Privileged integration tests for the two-host rig.
//!
//! These require root/sudo and `ip netns` support; without them the
//! tests print a skip notice and pass.

use pathcast_sim::runner::{locate_node_binary, spawn_captured};
use pathcast_sim::shaping::{apply_shape, LinkShape};
use pathcast_sim::test_util::{check_privileges, unique_tag};
use pathcast_sim::topology::{Namespace, TwoHostNet};
use std::process::Command;
use std::thread;
use std::time::Duration;

/// Extract the RTT in milliseconds from ping output.
fn ping_time_ms(output: &str) -> Option<f64> {
    let start = output.find("time=")? + "time=".len();
    let rest = &output[start..];
    let end = rest.find(" ms")?;
    rest[..end].trim().parse().ok()
}

#[test]
fn two_hosts_reach_each_other() {
    if !check_privileges() {
        eprintln!("Skipping: requires root/sudo and ip netns support");
        return;
    }

    let net = TwoHostNet::start(&unique_tag("pct")).expect("network should start");
    let (sent, received) = net.ping_all().expect("ping_all should run");
    assert_eq!((sent, received), (2, 2), "all pings should succeed");
}

#[test]
fn namespaces_are_deleted_on_drop() {
    if !check_privileges() {
        eprintln!("Skipping: requires root/sudo and ip netns support");
        return;
    }

    let tag = unique_tag("pcr");
    let (ns1, ns2) = {
        let net = TwoHostNet::start(&tag).expect("network should start");
        (net.h1.ns.name.clone(), net.h2.ns.name.clone())
    };

    let out = Command::new("ip")
        .args(["netns", "list"])
        .output()
        .expect("ip netns list should run");
    let listing = String::from_utf8_lossy(&out.stdout).to_string();
    assert!(!listing.contains(&ns1), "{ns1} still listed: {listing}");
    assert!(!listing.contains(&ns2), "{ns2} still listed: {listing}");
}

#[test]
fn leftover_namespace_is_replaced_on_create() {
    if !check_privileges() {
        eprintln!("Skipping: requires root/sudo and ip netns support");
        return;
    }

    let name = format!("{}_h1", unique_tag("pcl"));
    let first = Namespace::new(&name).expect("first create should succeed");
    // a crashed run never reaches its Drop, leaving the namespace behind
    std::mem::forget(first);

    let second = Namespace::new(&name).expect("create over a leftover should succeed");
    let out = second
        .exec("ip", &["link", "show", "lo"])
        .expect("exec in recreated namespace");
    assert!(out.status.success(), "recreated namespace not usable");
}

#[test]
fn shaped_link_adds_delay() {
    if !check_privileges() {
        eprintln!("Skipping: requires root/sudo and ip netns support");
        return;
    }

    let net = TwoHostNet::start(&unique_tag("pcd")).expect("network should start");

    let shape = LinkShape {
        delay_ms: Some(100),
        ..Default::default()
    };
    if let Err(e) = apply_shape(&net.h1.ns, &net.h1.iface, &shape) {
        let msg = e.to_string();
        if msg.contains("qdisc kind is unknown") {
            eprintln!("Skipping: netem not available in this kernel");
            return;
        }
        panic!("apply_shape failed: {msg}");
    }

    let out = net
        .h1
        .ns
        .exec("ping", &["-c", "1", "-W", "2", &net.h2.addr.to_string()])
        .expect("ping should run");
    assert!(out.status.success(), "ping through shaped link failed");

    let stdout = String::from_utf8_lossy(&out.stdout);
    let rtt = ping_time_ms(&stdout).expect("ping output should carry a time");
    assert!(rtt >= 95.0, "expected >=95ms RTT through shaped link, got {rtt}ms");
}

#[test]
fn nodes_gossip_routes_across_the_link() {
    if !check_privileges() {
        eprintln!("Skipping: requires root/sudo and ip netns support");
        return;
    }

    let node_bin = match locate_node_binary() {
        Ok(p) => p,
        Err(_) => {
            eprintln!("Skipping: pathcast-node binary not built");
            return;
        }
    };
    let node_bin = node_bin.to_str().expect("binary path should be UTF-8");

    let net = TwoHostNet::start(&unique_tag("pcg")).expect("network should start");
    let capture_dir = std::env::temp_dir();

    let mut runs = Vec::new();
    for host in net.hosts() {
        let run = spawn_captured(
            &host.ns,
            node_bin,
            &[],
            &capture_dir,
            &unique_tag(&format!("pcg{}", host.name)),
        )
        .expect("node should spawn");
        runs.push(run);
    }

    // announce, receive, re-announce
    thread::sleep(Duration::from_secs(3));

    for run in &mut runs {
        run.stop().expect("node should stop");
    }

    for run in &runs {
        let stdout = run.read_stdout().expect("stdout capture should be readable");
        assert!(
            stdout.contains("name of the interface:"),
            "node should report its interfaces, got: {stdout}"
        );
        let stderr = run.read_stderr().expect("stderr capture should be readable");
        assert!(
            stderr.contains("route added"),
            "node should learn a route from its peer, got: {stderr}"
        );
    }
}
