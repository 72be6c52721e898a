use std::fs;

use nix::sys::signal::kill;
use nix::unistd::Pid;

/// Direct children of `pid`, oldest first.
///
/// Reads `/proc/<pid>/task/<pid>/children`; returns an empty list if the
/// kernel does not expose it or the process is gone.
pub fn children(pid: Pid) -> Vec<Pid> {
    let path = format!("/proc/{pid}/task/{pid}/children");
    match fs::read_to_string(&path) {
        Ok(contents) => parse_pids(&contents),
        Err(_) => Vec::new(),
    }
}

fn parse_pids(contents: &str) -> Vec<Pid> {
    contents
        .split_whitespace()
        .filter_map(|p| p.parse::<i32>().ok())
        .filter(|p| *p > 0)
        .map(Pid::from_raw)
        .collect()
}

/// Check whether a process exists, by sending it signal 0.
pub fn pid_alive(pid: Pid) -> bool {
    if pid.as_raw() <= 0 {
        return false;
    }
    // EPERM still means the process exists.
    matches!(kill(pid, None), Ok(()) | Err(nix::errno::Errno::EPERM))
}
