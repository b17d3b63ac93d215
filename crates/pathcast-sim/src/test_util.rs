use std::process::Command;
use std::sync::atomic::{AtomicU32, Ordering};

/// Monotonically increasing counter for generating unique rig names.
static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// True when this environment can drive `ip netns`: the tool is on the
/// path and we are privileged enough to query namespaces. Rig tests
/// skip quietly when this returns `false`.
pub fn check_privileges() -> bool {
    Command::new("ip")
        .arg("netns")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Generates a unique rig tag with the given prefix.
///
/// Combines the prefix, process ID, and an atomic counter to avoid
/// collisions when tests run in parallel. Tags are truncated to 11
/// characters so the rig's `_e1`/`_h2` suffixes still fit the Linux
/// 15-char interface name limit.
pub fn unique_tag(prefix: &str) -> String {
    let seq = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();
    let tag = format!("{}{:x}{}", prefix, pid % 0xFFF, seq);
    if tag.len() > 11 {
        tag[..11].to_string()
    } else {
        tag
    }
}
