use nix::unistd::Pid;
use tracing::debug;

use super::iproute::IP;
use super::process::ExternalCommand;
use crate::core::backend::NamespaceAnchor;
use crate::core::error::{NetnsError, Result};
use crate::util::proc;

/// The session manager holding anchor processes.
pub const TMUX: &str = "tmux";

/// Anchors namespaces in detached tmux sessions named after them.
///
/// Each session runs `ip netns exec <ns> unshare --fork --pid --mount-proc
/// <shell>`, so the shell is PID 1 of a fresh PID namespace inside the
/// network namespace.
#[derive(Debug, Default, Clone, Copy)]
pub struct TmuxAnchor;

/// tmux target matching session `name` exactly rather than by prefix.
fn exact(name: &str) -> String {
    format!("={name}")
}

pub(crate) fn spawn_command(name: &str, shell: &str) -> ExternalCommand {
    ExternalCommand::new(TMUX)
        .args(["new-session", "-d", "-s", name])
        .args([IP, "netns", "exec", name])
        .args(["unshare", "--fork", "--pid", "--mount-proc", shell])
}

fn parse_pane_pid(out: &str) -> Option<Pid> {
    out.lines()
        .next()
        .and_then(|line| line.trim().parse::<i32>().ok())
        .filter(|pid| *pid > 0)
        .map(Pid::from_raw)
}

impl NamespaceAnchor for TmuxAnchor {
    fn spawn(&self, name: &str, shell: &str) -> Result<()> {
        spawn_command(name, shell).check()
    }

    /// The pane's first child when it has one (the shell under `unshare
    /// --fork`), else the pane process itself.
    fn resolve(&self, name: &str) -> Result<Pid> {
        let out = ExternalCommand::new(TMUX)
            .args(["list-panes", "-s", "-t", exact(name).as_str(), "-F", "#{pane_pid}"])
            .stdout()
            .map_err(|e| {
                debug!("{e}");
                NetnsError::AnchorNotFound(name.to_string())
            })?;

        let pane = parse_pane_pid(&out)
            .filter(|pid| proc::pid_alive(*pid))
            .ok_or_else(|| NetnsError::AnchorNotFound(name.to_string()))?;
        let leader = proc::children(pane).into_iter().next().unwrap_or(pane);
        debug!(namespace = name, %pane, %leader, "resolved anchor");
        Ok(leader)
    }

    fn terminate(&self, name: &str) -> Result<()> {
        ExternalCommand::new(TMUX)
            .args(["kill-session", "-t", exact(name).as_str()])
            .check()
    }
}
