//! Running a binary inside a host namespace with captured output.

use crate::topology::Namespace;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

/// A process running inside a namespace with stdout and stderr captured
/// to files. The capture files are left in place after the run.
pub struct CapturedRun {
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
    child: Child,
}

/// Spawn `cmd` inside `ns`, writing its stdout and stderr under
/// `capture_dir` as `<tag>.out` and `<tag>.err`.
pub fn spawn_captured(
    ns: &Namespace,
    cmd: &str,
    args: &[&str],
    capture_dir: &Path,
    tag: &str,
) -> io::Result<CapturedRun> {
    let stdout_path = capture_dir.join(format!("{tag}.out"));
    let stderr_path = capture_dir.join(format!("{tag}.err"));

    let child = Command::new("sudo")
        .args(["ip", "netns", "exec", &ns.name, cmd])
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(File::create(&stdout_path)?))
        .stderr(Stdio::from(File::create(&stderr_path)?))
        .spawn()?;

    Ok(CapturedRun {
        stdout_path,
        stderr_path,
        child,
    })
}

impl CapturedRun {
    /// Terminate the process and wait it out.
    pub fn stop(&mut self) -> io::Result<()> {
        self.child.kill()?;
        self.child.wait()?;
        Ok(())
    }

    pub fn read_stdout(&self) -> io::Result<String> {
        std::fs::read_to_string(&self.stdout_path)
    }

    pub fn read_stderr(&self) -> io::Result<String> {
        std::fs::read_to_string(&self.stderr_path)
    }
}

/// Print captured output line-numbered, one tab-indented line per line.
pub fn print_numbered(output: &str) {
    for (idx, line) in output.lines().enumerate() {
        println!("\t{}:\t {}", idx + 1, line.trim());
    }
}

/// Locate the pathcast-node binary: the `PATHCAST_NODE_BIN` override
/// first, then next to the current executable, then the workspace
/// target directory.
pub fn locate_node_binary() -> io::Result<PathBuf> {
    if let Ok(p) = std::env::var("PATHCAST_NODE_BIN") {
        let path = PathBuf::from(p);
        if path.exists() {
            return Ok(path);
        }
    }

    let mut path = std::env::current_exe()?;
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.push("pathcast-node");
    if path.exists() {
        return Ok(path);
    }

    for candidate in [
        "target/debug/pathcast-node",
        "../../target/debug/pathcast-node",
    ] {
        let p = std::env::current_dir()?.join(candidate);
        if p.exists() {
            return Ok(p);
        }
    }

    Err(io::Error::other(
        "pathcast-node binary not found; build it or set PATHCAST_NODE_BIN",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_output_is_stable() {
        // smoke only: print_numbered writes to stdout, so just make sure
        // it copes with empty and trailing-newline input
        print_numbered("");
        print_numbered("one\ntwo\n");
    }
}
