use nix::unistd::Pid;

use super::process::ExternalCommand;
use crate::core::backend::NamespaceEntry;
use crate::core::error::Result;

/// The namespace-entry tool.
pub const NSENTER: &str = "nsenter";

/// Facets joined when running a user command inside a namespace.
pub const EXEC_FACETS: &[&str] = &["--mount", "--uts", "--ipc", "--net", "--pid"];

/// Facets joined for network configuration.
///
/// Only the network namespace is entered so that a PID such as `1` in an `ip`
/// argument still refers to the host's init.
pub const NET_FACETS: &[&str] = &["--net"];

/// Build `nsenter --target <pid> <facets> -- <argv...>`.
pub fn enter(pid: Pid, facets: &[&str], argv: &[String]) -> ExternalCommand {
    ExternalCommand::new(NSENTER)
        .arg("--target")
        .arg(pid.to_string())
        .args(facets.iter().copied())
        .arg("--")
        .args(argv.iter().cloned())
}

/// [`NamespaceEntry`] backed by `nsenter(1)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NsEnter;

impl NamespaceEntry for NsEnter {
    fn exec(&self, pid: Pid, cmd: &[String]) -> Result<i32> {
        enter(pid, EXEC_FACETS, cmd).status()
    }
}
